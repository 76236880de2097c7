use std::ops::{Deref, DerefMut};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

#[cfg(feature = "accelerator")]
use crate::device::DeviceMirror;

// Storage — the buffer behind a tensor
//
// A storage block holds the host elements and, with the `accelerator`
// feature, the device mirror with its residency flag. Blocks are shared
// behind Arc<RwLock<..>> so that a shadow tensor can alias another tensor's
// elements without a lifetime tie: the block lives as long as any tensor
// still refers to it.
//
// Ownership is an explicit tag. An `Owned` tensor allocated its block and may
// replace it (resize, release). A `Shadow` tensor merely refers to a block
// some other tensor owns and must never reallocate it.

/// Element type of every tensor.
pub type Datum = f32;

#[derive(Debug, Clone, Default)]
pub(crate) struct Storage {
    pub(crate) host: Vec<Datum>,
    #[cfg(feature = "accelerator")]
    pub(crate) mirror: DeviceMirror,
}

impl Storage {
    pub(crate) fn zeroed(len: usize) -> Self {
        Storage::from_vec(vec![0.0; len])
    }

    pub(crate) fn from_vec(host: Vec<Datum>) -> Self {
        Storage {
            host,
            #[cfg(feature = "accelerator")]
            mirror: DeviceMirror::default(),
        }
    }
}

pub(crate) type SharedStorage = Arc<RwLock<Storage>>;

/// How a tensor holds its storage block.
#[derive(Debug)]
pub(crate) enum Ownership {
    Owned(SharedStorage),
    Shadow(SharedStorage),
}

impl Ownership {
    pub(crate) fn owned(storage: Storage) -> Self {
        Ownership::Owned(Arc::new(RwLock::new(storage)))
    }

    pub(crate) fn handle(&self) -> &SharedStorage {
        match self {
            Ownership::Owned(handle) | Ownership::Shadow(handle) => handle,
        }
    }

    pub(crate) fn is_shadow(&self) -> bool {
        matches!(self, Ownership::Shadow(_))
    }

    /// Read lock. Panics if the block is already mutably borrowed, which
    /// with a single thread of control can only be a re-entrant access.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Storage> {
        match self.handle().try_read() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                panic!("tensor storage is already mutably borrowed")
            }
            Err(TryLockError::Poisoned(_)) => panic!("storage lock poisoned"),
        }
    }

    /// Write lock. Panics if the block is already borrowed.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Storage> {
        match self.handle().try_write() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => panic!("tensor storage is already borrowed"),
            Err(TryLockError::Poisoned(_)) => panic!("storage lock poisoned"),
        }
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Ownership::owned(Storage::default())
    }
}

/// Shared view of a tensor's host elements.
pub struct DataRef<'a> {
    guard: RwLockReadGuard<'a, Storage>,
}

impl<'a> DataRef<'a> {
    pub(crate) fn new(guard: RwLockReadGuard<'a, Storage>) -> Self {
        DataRef { guard }
    }
}

impl Deref for DataRef<'_> {
    type Target = [Datum];

    fn deref(&self) -> &[Datum] {
        &self.guard.host
    }
}

/// Exclusive view of a tensor's host elements.
pub struct DataMut<'a> {
    guard: RwLockWriteGuard<'a, Storage>,
}

impl<'a> DataMut<'a> {
    pub(crate) fn new(guard: RwLockWriteGuard<'a, Storage>) -> Self {
        DataMut { guard }
    }
}

impl Deref for DataMut<'_> {
    type Target = [Datum];

    fn deref(&self) -> &[Datum] {
        &self.guard.host
    }
}

impl DerefMut for DataMut<'_> {
    fn deref_mut(&mut self) -> &mut [Datum] {
        &mut self.guard.host
    }
}

/// Shared view of the device mirror.
#[cfg(feature = "accelerator")]
pub struct DeviceRef<'a> {
    guard: RwLockReadGuard<'a, Storage>,
}

#[cfg(feature = "accelerator")]
impl<'a> DeviceRef<'a> {
    pub(crate) fn new(guard: RwLockReadGuard<'a, Storage>) -> Self {
        DeviceRef { guard }
    }
}

#[cfg(feature = "accelerator")]
impl Deref for DeviceRef<'_> {
    type Target = [Datum];

    fn deref(&self) -> &[Datum] {
        self.guard.mirror.buffer()
    }
}

/// Exclusive view of the device mirror, the entry point for kernel backends.
#[cfg(feature = "accelerator")]
pub struct DeviceMut<'a> {
    guard: RwLockWriteGuard<'a, Storage>,
}

#[cfg(feature = "accelerator")]
impl<'a> DeviceMut<'a> {
    pub(crate) fn new(guard: RwLockWriteGuard<'a, Storage>) -> Self {
        DeviceMut { guard }
    }
}

#[cfg(feature = "accelerator")]
impl Deref for DeviceMut<'_> {
    type Target = [Datum];

    fn deref(&self) -> &[Datum] {
        self.guard.mirror.buffer()
    }
}

#[cfg(feature = "accelerator")]
impl DerefMut for DeviceMut<'_> {
    fn deref_mut(&mut self) -> &mut [Datum] {
        self.guard.mirror.buffer_mut()
    }
}
