// CombinedTensor — the value travelling along one graph edge
//
// Every edge of the layer graph carries the forward activations (`data`) and
// the gradient flowing back along it (`delta`). Both tensors always share a
// shape. The graph builder owns edges through `Edge` handles; layers only
// keep weak references, so dropping the graph's handle disconnects them.

use std::sync::Arc;

use pixelnet_core::{Shape, Tensor};

/// Paired data and gradient tensors of identical shape.
#[derive(Debug, Default)]
pub struct CombinedTensor {
    pub data: Tensor,
    pub delta: Tensor,
}

/// Shared handle to a graph edge.
pub type Edge = Arc<CombinedTensor>;

impl CombinedTensor {
    /// Allocate data and delta. Argument order: samples, width, height, maps.
    pub fn new(samples: usize, width: usize, height: usize, maps: usize) -> Self {
        CombinedTensor::with_shape(Shape::from_legacy(samples, width, height, maps))
    }

    /// Allocate data and delta of the given shape.
    pub fn with_shape(shape: Shape) -> Self {
        CombinedTensor {
            data: Tensor::with_shape(shape),
            delta: Tensor::with_shape(shape),
        }
    }

    /// Wrap into a shared edge handle.
    pub fn into_edge(self) -> Edge {
        Arc::new(self)
    }

    pub fn shape(&self) -> Shape {
        self.data.shape()
    }

    pub fn samples(&self) -> usize {
        self.data.samples()
    }
}
