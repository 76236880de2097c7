// Device mirror — accelerator residency bookkeeping
//
// With the `accelerator` feature every storage block carries a second buffer
// standing in for device memory plus a flag naming which copy is
// authoritative. The two copies are never assumed to agree: `to_device` and
// `to_host` are the only points where one is made valid from the other, and
// host-side compute asserts `Residency::Host` before touching data.
//
// The mirror is an emulated allocation. Kernel backends write into it
// through `Tensor::device_data_mut`; the transfer contract is the same
// whatever memory sits behind it.

use crate::storage::Datum;

/// Which copy of a storage block is authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Residency {
    #[default]
    Host,
    Device,
}

impl std::fmt::Display for Residency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Residency::Host => write!(f, "host"),
            Residency::Device => write!(f, "device"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DeviceMirror {
    buffer: Vec<Datum>,
    residency: Residency,
}

impl DeviceMirror {
    pub(crate) fn residency(&self) -> Residency {
        self.residency
    }

    pub(crate) fn buffer(&self) -> &[Datum] {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut [Datum] {
        &mut self.buffer
    }

    /// Make the device copy authoritative. Returns whether data moved.
    pub(crate) fn to_device(&mut self, host: &[Datum], no_copy: bool) -> bool {
        if self.residency == Residency::Device {
            return false;
        }
        if self.buffer.len() != host.len() {
            self.buffer = vec![0.0; host.len()];
        }
        self.residency = Residency::Device;
        if no_copy {
            return false;
        }
        self.buffer.copy_from_slice(host);
        true
    }

    /// Make the host copy authoritative. Returns whether data moved.
    pub(crate) fn to_host(&mut self, host: &mut [Datum], no_copy: bool) -> bool {
        if self.residency == Residency::Host {
            return false;
        }
        self.residency = Residency::Host;
        if no_copy {
            return false;
        }
        host.copy_from_slice(&self.buffer);
        true
    }
}
