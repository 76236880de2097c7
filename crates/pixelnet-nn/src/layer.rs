// Layer trait — The contract every graph node implements
//
// A layer goes through a fixed life cycle:
//
//   Unbound ──create_outputs──▶ OutputsCreated ──connect──▶ Connected
//                                                             │
//                                       feed_forward ⇄ back_propagate
//
// 1. `create_outputs` sees only the input shapes and answers with the shapes
//    of the outputs this layer needs. It allocates nothing; the graph
//    builder materializes the CombinedTensors.
// 2. `connect` receives the materialized edges, re-validates arity and
//    shapes, and only then keeps (weak) references to them. On failure
//    nothing is bound and previous bindings stay as they were.
// 3. `feed_forward` reads the inputs' data and writes the outputs' data.
//    `back_propagate` reads the outputs' deltas and writes the inputs'
//    deltas. Both may be called any number of times once connected.
//
// Layers never own their edges. If the graph drops an edge, the next pass
// reports `Error::NotConnected`.

use std::sync::Weak;

use pixelnet_core::{Error, Result, Shape};
use tracing::error;

use crate::combined::{CombinedTensor, Edge};

/// A node of the layer graph.
pub trait Layer {
    /// Decide the number and shapes of outputs for the given input shapes.
    fn create_outputs(&self, inputs: &[Shape]) -> Result<Vec<Shape>>;

    /// Validate and bind the materialized input and output edges.
    fn connect(&mut self, inputs: &[Edge], outputs: &[Edge]) -> Result<()>;

    /// Forward pass: compute outputs from inputs.
    fn feed_forward(&mut self) -> Result<()>;

    /// Backward pass: compute input gradients from output gradients.
    fn back_propagate(&mut self) -> Result<()>;

    /// Administratively disable or enable the layer. Disabled layers skip
    /// their passes.
    fn set_disabled(&mut self, disabled: bool);

    fn is_disabled(&self) -> bool;

    /// Human-readable description, e.g. for graph dumps.
    fn description(&self) -> String;

    /// Whether the layer computes on the device copy of its tensors.
    fn is_accelerator_aware(&self) -> bool {
        false
    }
}

/// Log a validation failure and return it.
pub(crate) fn reject<T>(err: Error) -> Result<T> {
    error!("{err}");
    Err(err)
}

/// Require an exact number of inputs or outputs.
pub(crate) fn expect_arity(layer: &str, side: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return reject(Error::ArityMismatch {
            layer: layer.to_string(),
            side,
            expected,
            got,
        });
    }
    Ok(())
}

/// Require two sample counts to agree.
pub(crate) fn expect_samples(layer: &str, left: usize, right: usize) -> Result<()> {
    if left != right {
        return reject(Error::SampleCountMismatch {
            layer: layer.to_string(),
            left,
            right,
        });
    }
    Ok(())
}

/// Resolve a weak binding, failing if the graph dropped the edge.
pub(crate) fn upgrade(edge: Option<&Weak<CombinedTensor>>, layer: &str) -> Result<Edge> {
    edge.and_then(Weak::upgrade)
        .ok_or_else(|| Error::NotConnected {
            layer: layer.to_string(),
        })
}
