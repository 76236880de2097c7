use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::contract;
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::storage::{DataMut, DataRef, Datum, Ownership, Storage};

#[cfg(feature = "accelerator")]
use crate::device::Residency;
#[cfg(feature = "accelerator")]
use crate::storage::{DeviceMut, DeviceRef};

// Tensor — four-level array of numbers
//
// A Tensor stores samples → maps → lines → pixels in one contiguous block
// (see `shape.rs` for the offset formula). It is the unit of data flowing
// between layers: scores, labels, weights, activations and gradients all
// live in tensors.
//
// MEMORY MODEL:
//
//   The block sits behind Arc<RwLock<Storage>>. A tensor either owns its
//   block or shadows another tensor's block. Shadowing shares the block and
//   copies the shape; it never copies elements. Because the block is
//   reference-counted a shadow cannot dangle, but it also cannot resize:
//   only the owner may swap in a new allocation.
//
//   Element access goes through guards (`data()`, `data_mut()`), so writing
//   needs only `&self`. Layers rely on this to fill their output tensors
//   while the graph keeps shared handles to them.
//
// COPIES:
//
//   Tensor is not Clone. A deep copy is `duplicate(true)`;
//   `duplicate(false)` is treated as a mistake (fatal in strict mode).
//   Moving out of a tensor that stays in use is `take()`.
//
// LEGACY ARGUMENT ORDER:
//
//   `new`, `resize` and `reshape` take (samples, width, height, maps), which
//   differs from the storage order (samples, maps, height, width). Call sites
//   across the layer graph depend on this order, so it is kept. Use
//   `with_shape`/`resize_to` with a named `Shape` where clarity matters.

/// A four-dimensional array of [`Datum`] values.
pub struct Tensor {
    pub(crate) storage: Ownership,
    pub(crate) shape: Shape,
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor::empty()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, shadow={})",
            self.shape,
            self.storage.is_shadow()
        )
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.shape)
    }
}

impl Tensor {
    // Creation

    /// A tensor of zero size without storage.
    pub fn empty() -> Self {
        Tensor {
            storage: Ownership::default(),
            shape: Shape::default(),
        }
    }

    /// Allocate a zeroed tensor. Note the argument order: samples, width,
    /// height, maps.
    pub fn new(samples: usize, width: usize, height: usize, maps: usize) -> Self {
        Tensor::with_shape(Shape::from_legacy(samples, width, height, maps))
    }

    /// Allocate a zeroed tensor of the given shape.
    pub fn with_shape(shape: Shape) -> Self {
        Tensor {
            storage: Ownership::owned(Storage::zeroed(shape.elements())),
            shape,
        }
    }

    /// Build a tensor from values in linear-offset order.
    pub fn from_vec(shape: Shape, data: Vec<Datum>) -> Result<Self> {
        if data.len() != shape.elements() {
            return Err(Error::ElementCountMismatch {
                shape,
                expected: shape.elements(),
                got: data.len(),
            });
        }
        Ok(Tensor {
            storage: Ownership::owned(Storage::from_vec(data)),
            shape,
        })
    }

    /// Deep copy. Pass `intentional = true`; anything else is reported as a
    /// programmer error.
    pub fn duplicate(&self, intentional: bool) -> Tensor {
        if !intentional {
            contract!(false, "Unintentional copy of tensor {}", self.shape);
            warn!(shape = %self.shape, "tensor copied without being marked intentional");
        }
        let storage = self.storage.read().clone();
        Tensor {
            storage: Ownership::owned(storage),
            shape: self.shape,
        }
    }

    /// Move the contents out, leaving this tensor empty.
    pub fn take(&mut self) -> Tensor {
        std::mem::take(self)
    }

    // Accessors

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn samples(&self) -> usize {
        self.shape.samples
    }

    pub fn maps(&self) -> usize {
        self.shape.maps
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn elements(&self) -> usize {
        self.shape.elements()
    }

    /// Whether this tensor aliases another tensor's storage.
    pub fn is_shadow(&self) -> bool {
        self.storage.is_shadow()
    }

    /// Whether both tensors refer to the same storage block.
    pub fn shares_storage_with(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(self.storage.handle(), other.storage.handle())
    }

    /// Linear offset of an element.
    ///
    /// In strict mode an index outside the shape on any axis panics with the
    /// tensor's shape and all four indices.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, map: usize, sample: usize) -> usize {
        contract!(
            self.shape.contains(x, y, map, sample),
            "Out of bounds access. Tensor: {}, x: {}, y: {}, m: {}, s: {}",
            self.shape,
            x,
            y,
            map,
            sample
        );
        self.shape.offset_unchecked(x, y, map, sample)
    }

    /// Shared access to the host elements.
    pub fn data(&self) -> DataRef<'_> {
        let guard = self.storage.read();
        self.assert_host(&guard, "read");
        DataRef::new(guard)
    }

    /// Exclusive access to the host elements.
    pub fn data_mut(&self) -> DataMut<'_> {
        let guard = self.storage.write();
        self.assert_host(&guard, "write");
        DataMut::new(guard)
    }

    /// Copy of all host elements.
    pub fn to_vec(&self) -> Vec<Datum> {
        self.data().to_vec()
    }

    /// Value at a linear element index.
    pub fn get(&self, element: usize) -> Datum {
        let data = self.data();
        self.check_element(data.len(), element);
        data[element]
    }

    /// Store a value at a linear element index.
    pub fn set(&self, element: usize, value: Datum) {
        let mut data = self.data_mut();
        self.check_element(data.len(), element);
        data[element] = value;
    }

    /// Value at (x, y, map, sample).
    pub fn at(&self, x: usize, y: usize, map: usize, sample: usize) -> Datum {
        self.get(self.offset(x, y, map, sample))
    }

    /// Store a value at (x, y, map, sample).
    pub fn set_at(&self, x: usize, y: usize, map: usize, sample: usize, value: Datum) {
        self.set(self.offset(x, y, map, sample), value);
    }

    /// Raw bit pattern of an element, for tensors that carry integers (class
    /// labels) in their slots.
    pub fn bits(&self, element: usize) -> u32 {
        self.get(element).to_bits()
    }

    /// Store a raw bit pattern in an element.
    pub fn set_bits(&self, element: usize, bits: u32) {
        self.set(element, Datum::from_bits(bits));
    }

    fn check_element(&self, len: usize, element: usize) {
        contract!(len > 0, "Tried to access a null pointer Tensor");
        contract!(
            element < len,
            "Out of bounds access. Tensor: {} element {} requested.",
            self.shape,
            element
        );
    }

    #[inline]
    fn assert_host(&self, storage: &Storage, op: &str) {
        #[cfg(feature = "accelerator")]
        contract!(
            storage.mirror.residency() == Residency::Host,
            "Host {} on tensor {} while the device copy is authoritative",
            op,
            self.shape
        );
        #[cfg(not(feature = "accelerator"))]
        let _ = (storage, op);
    }

    // In-place mutation

    /// Set every element, or every element of one sample, to `value`.
    pub fn clear(&self, value: Datum, sample: Option<usize>) {
        let mut data = self.data_mut();
        match sample {
            None => data.fill(value),
            Some(sample) => {
                contract!(
                    sample < self.shape.samples,
                    "Out of bounds access. Tensor: {}, s: {}",
                    self.shape,
                    sample
                );
                let len = self.shape.sample_size();
                data[sample * len..(sample + 1) * len].fill(value);
            }
        }
    }

    /// Alias `other`'s storage and shape. Owned storage is released first.
    pub fn shadow(&mut self, other: &Tensor) {
        self.storage = Ownership::Shadow(Arc::clone(other.storage.handle()));
        self.shape = other.shape;
        trace!(shape = %self.shape, "tensor shadows storage");
    }

    /// Drop owned storage (or detach a shadow), leaving an empty tensor.
    pub fn release(&mut self) {
        self.storage = Ownership::default();
        self.shape = Shape::default();
    }

    /// Change the shape. Contents are discarded when the element count
    /// changes. Argument order: samples, width, height, maps.
    pub fn resize(&mut self, samples: usize, width: usize, height: usize, maps: usize) -> Result<()> {
        self.resize_to(Shape::from_legacy(samples, width, height, maps))
    }

    /// Resize to another tensor's shape.
    pub fn resize_like(&mut self, other: &Tensor) -> Result<()> {
        self.resize_to(other.shape)
    }

    /// Change the shape, reallocating when the element count changes.
    ///
    /// Shadows cannot reallocate and fail with [`Error::ShadowResize`] unless
    /// the shape is already the requested one.
    pub fn resize_to(&mut self, shape: Shape) -> Result<()> {
        if shape == self.shape {
            return Ok(());
        }
        if self.storage.is_shadow() {
            return Err(Error::ShadowResize { shape: self.shape });
        }
        if shape.elements() != self.shape.elements() {
            self.storage = Ownership::owned(Storage::zeroed(shape.elements()));
        }
        self.shape = shape;
        Ok(())
    }

    /// Change the shape without touching storage. Fails without mutation if
    /// the element count would change. Argument order: samples, width,
    /// height, maps.
    pub fn reshape(&mut self, samples: usize, width: usize, height: usize, maps: usize) -> Result<()> {
        let shape = Shape::from_legacy(samples, width, height, maps);
        if shape.elements() != self.shape.elements() {
            return Err(Error::ReshapeElementMismatch {
                src: self.shape.elements(),
                dst: shape.elements(),
                dst_shape: shape,
            });
        }
        self.shape = shape;
        Ok(())
    }

    /// Transpose every height × width plane in place. Width and height are
    /// swapped afterwards.
    ///
    /// A shadow can only transpose square planes: otherwise the owner's shape
    /// would stop describing the block it reads. Fails with
    /// [`Error::ShadowResize`] and leaves the block untouched.
    pub fn transpose(&mut self) -> Result<()> {
        let Shape { width, height, .. } = self.shape;
        if self.storage.is_shadow() && width != height {
            return Err(Error::ShadowResize { shape: self.shape });
        }
        let plane = width * height;
        if plane > 0 {
            let mut data = self.data_mut();
            let mut scratch = vec![0.0; plane];
            for chunk in data.chunks_exact_mut(plane) {
                for y in 0..height {
                    for x in 0..width {
                        scratch[x * height + y] = chunk[y * width + x];
                    }
                }
                chunk.copy_from_slice(&scratch);
            }
        }
        self.shape.width = height;
        self.shape.height = width;
        Ok(())
    }

    // Bulk copies

    /// Copy one whole sample between tensors with equal maps, height and
    /// width. The target is untouched on failure.
    pub fn copy_sample(
        source: &Tensor,
        source_sample: usize,
        target: &Tensor,
        target_sample: usize,
    ) -> Result<()> {
        let (s, t) = (source.shape, target.shape);
        if s.maps != t.maps || s.height != t.height || s.width != t.width {
            return Err(incompatible(s, t, "maps, height and width must match"));
        }
        if source_sample >= s.samples || target_sample >= t.samples {
            return Err(incompatible(
                s,
                t,
                format!("sample {source_sample} -> {target_sample} out of range"),
            ));
        }
        let len = s.sample_size();
        copy_range(source, source_sample * len, target, target_sample * len, len);
        Ok(())
    }

    /// Copy one (sample, map) plane between tensors with equal height and
    /// width. The target is untouched on failure.
    pub fn copy_map(
        source: &Tensor,
        source_sample: usize,
        source_map: usize,
        target: &Tensor,
        target_sample: usize,
        target_map: usize,
    ) -> Result<()> {
        let (s, t) = (source.shape, target.shape);
        if s.height != t.height || s.width != t.width {
            return Err(incompatible(s, t, "height and width must match"));
        }
        if source_sample >= s.samples
            || source_map >= s.maps
            || target_sample >= t.samples
            || target_map >= t.maps
        {
            return Err(incompatible(
                s,
                t,
                format!(
                    "plane ({source_sample}, {source_map}) -> ({target_sample}, {target_map}) out of range"
                ),
            ));
        }
        let len = s.plane_size();
        let from = source_sample * s.sample_size() + source_map * len;
        let to = target_sample * t.sample_size() + target_map * len;
        copy_range(source, from, target, to, len);
        Ok(())
    }

    // Reductions

    /// Index of the maximum within one sample, local to that sample's range.
    /// Ties resolve to the first occurrence.
    ///
    /// A sample without elements has no maximum. Strict mode treats that as
    /// a contract violation; otherwise 0 is returned.
    pub fn maximum(&self, sample: usize) -> usize {
        contract!(
            sample < self.shape.samples,
            "Out of bounds access. Tensor: {}, s: {}",
            self.shape,
            sample
        );
        let len = self.shape.sample_size();
        contract!(len > 0, "Maximum of an empty sample. Tensor: {}", self.shape);
        let data = self.data();
        first_max_index(data[sample * len..(sample + 1) * len].iter().copied())
    }

    /// Index over the whole tensor of the element with the greatest absolute
    /// value. Ties resolve to the first occurrence. An empty tensor has no
    /// maximum: strict mode panics, otherwise 0 is returned.
    pub fn abs_maximum(&self) -> usize {
        contract!(
            self.elements() > 0,
            "Maximum of an empty tensor. Tensor: {}",
            self.shape
        );
        first_max_index(self.data().iter().map(|v| v.abs()))
    }

    // Accelerator residency

    /// Which copy of the storage is authoritative.
    #[cfg(feature = "accelerator")]
    pub fn residency(&self) -> Residency {
        self.storage.read().mirror.residency()
    }

    /// Make the host copy authoritative, transferring from the device unless
    /// `no_copy` is set or the host copy already is authoritative.
    #[cfg(feature = "accelerator")]
    pub fn move_to_cpu(&self, no_copy: bool) {
        let mut guard = self.storage.write();
        let storage = &mut *guard;
        if storage.mirror.to_host(&mut storage.host, no_copy) {
            trace!(shape = %self.shape, "tensor moved to host");
        }
    }

    /// Make the device copy authoritative, transferring from the host unless
    /// `no_copy` is set or the device copy already is authoritative.
    #[cfg(feature = "accelerator")]
    pub fn move_to_gpu(&self, no_copy: bool) {
        let mut guard = self.storage.write();
        let storage = &mut *guard;
        if storage.mirror.to_device(&storage.host, no_copy) {
            trace!(shape = %self.shape, "tensor moved to device");
        }
    }

    /// Shared access to the device copy.
    #[cfg(feature = "accelerator")]
    pub fn device_data(&self) -> DeviceRef<'_> {
        let guard = self.storage.read();
        self.assert_device(&guard);
        DeviceRef::new(guard)
    }

    /// Exclusive access to the device copy.
    #[cfg(feature = "accelerator")]
    pub fn device_data_mut(&self) -> DeviceMut<'_> {
        let guard = self.storage.write();
        self.assert_device(&guard);
        DeviceMut::new(guard)
    }

    #[cfg(feature = "accelerator")]
    fn assert_device(&self, storage: &Storage) {
        contract!(
            storage.mirror.residency() == Residency::Device,
            "Device access on tensor {} while the host copy is authoritative",
            self.shape
        );
    }
}

fn incompatible(source: Shape, target: Shape, reason: impl Into<String>) -> Error {
    Error::IncompatibleCopy {
        source_shape: source,
        target_shape: target,
        reason: reason.into(),
    }
}

fn copy_range(source: &Tensor, from: usize, target: &Tensor, to: usize, len: usize) {
    if source.shares_storage_with(target) {
        let mut data = target.data_mut();
        data.copy_within(from..from + len, to);
    } else {
        let src = source.data();
        let mut dst = target.data_mut();
        dst[to..to + len].copy_from_slice(&src[from..from + len]);
    }
}

fn first_max_index(values: impl Iterator<Item = Datum>) -> usize {
    let mut best = 0;
    let mut best_value = Datum::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if i == 0 || v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
