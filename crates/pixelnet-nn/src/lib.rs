//! # pixelnet-nn
//!
//! Layer graph contract and concrete layers for pixelnet.
//!
//! 1. **CombinedTensor** — data + delta pair carried by every graph edge
//! 2. **Layer trait** — create outputs, connect, forward, backward
//! 3. **SimpleLayer** — one-input/one-output layers built from a kernel
//! 4. **NonLinearityLayer** — Tanh, Sigmoid, ReLU, Softmax
//! 5. **ConfusionMatrixLayer** — terminal layer accumulating weighted
//!    classification statistics

pub mod combined;
pub mod confusion;
pub mod layer;
pub mod nonlinearity;
pub mod simple;

pub use combined::{CombinedTensor, Edge};
pub use confusion::{ConfusionMatrix, ConfusionMatrixLayer};
pub use layer::Layer;
pub use nonlinearity::{NonLinearity, NonLinearityLayer};
pub use simple::{SimpleKernel, SimpleLayer};

pub use pixelnet_core::{Error, Result, Shape, Tensor};
