//! # pixelnet-core
//!
//! Tensor storage and error types for pixelnet.
//!
//! This crate provides:
//! - [`Tensor`] — four-level (sample, map, line, pixel) array that owns or
//!   shadows its storage
//! - [`Shape`] — the tensor's extent and offset arithmetic
//! - [`Residency`] — host/device bookkeeping (feature `accelerator`)
//! - [`Error`] / [`Result`] — structural failures shared by every crate
//! - [`config::STRICT`] — whether contract checks are compiled in

pub mod config;
#[cfg(feature = "accelerator")]
pub mod device;
pub mod error;
pub mod logging;
pub mod serialize;
pub mod shape;
pub mod storage;
pub mod tensor;

#[cfg(feature = "accelerator")]
pub use device::Residency;
pub use error::{Error, Result};
pub use shape::Shape;
pub use storage::{DataMut, DataRef, Datum};
#[cfg(feature = "accelerator")]
pub use storage::{DeviceMut, DeviceRef};
pub use tensor::Tensor;
