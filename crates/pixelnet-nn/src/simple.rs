// SimpleLayer — one input, one output
//
// Most layers consume exactly one edge and produce exactly one. SimpleLayer
// takes care of the graph-facing part of the Layer contract (arity checks,
// weak bindings, the disabled switch) and hands a concrete `SimpleKernel`
// nothing but a single (input, output) pair.
//
// Binding order in `connect`:
//   1. exactly one input and one output, else ArityMismatch
//   2. kernel.connect(input, output) for the kernel's own shape checks
//   3. only if both succeeded, the bindings are replaced

use std::sync::{Arc, Weak};

use pixelnet_core::{Result, Shape};
use tracing::debug;

use crate::combined::{CombinedTensor, Edge};
use crate::layer::{expect_arity, upgrade, Layer};

/// The computation of a one-input/one-output layer.
pub trait SimpleKernel {
    /// Short name used in logs and descriptions.
    fn name(&self) -> String;

    /// Output shape for a given input shape.
    fn create_output(&self, input: Shape) -> Result<Shape>;

    /// Validate a concrete input/output pair.
    fn connect(&mut self, input: &CombinedTensor, output: &CombinedTensor) -> Result<()>;

    fn feed_forward(&mut self, input: &CombinedTensor, output: &CombinedTensor) -> Result<()>;

    fn back_propagate(&mut self, input: &CombinedTensor, output: &CombinedTensor) -> Result<()>;

    fn is_accelerator_aware(&self) -> bool {
        false
    }
}

/// A [`Layer`] made from a [`SimpleKernel`].
pub struct SimpleLayer<K> {
    kernel: K,
    input: Option<Weak<CombinedTensor>>,
    output: Option<Weak<CombinedTensor>>,
    disabled: bool,
}

impl<K: SimpleKernel> SimpleLayer<K> {
    pub fn new(kernel: K) -> Self {
        debug!(kernel = %kernel.name(), "Instance created");
        SimpleLayer {
            kernel,
            input: None,
            output: None,
            disabled: false,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// The bound input edge, if connected and still alive.
    pub fn input(&self) -> Option<Edge> {
        self.input.as_ref().and_then(Weak::upgrade)
    }

    /// The bound output edge, if connected and still alive.
    pub fn output(&self) -> Option<Edge> {
        self.output.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_connected(&self) -> bool {
        self.input().is_some() && self.output().is_some()
    }

    fn bound(&self) -> Result<(Edge, Edge)> {
        let name = self.kernel.name();
        let input = upgrade(self.input.as_ref(), &name)?;
        let output = upgrade(self.output.as_ref(), &name)?;
        Ok((input, output))
    }
}

impl<K: SimpleKernel> Layer for SimpleLayer<K> {
    fn create_outputs(&self, inputs: &[Shape]) -> Result<Vec<Shape>> {
        expect_arity(&self.kernel.name(), "inputs", 1, inputs.len())?;
        Ok(vec![self.kernel.create_output(inputs[0])?])
    }

    fn connect(&mut self, inputs: &[Edge], outputs: &[Edge]) -> Result<()> {
        let name = self.kernel.name();
        expect_arity(&name, "inputs", 1, inputs.len())?;
        expect_arity(&name, "outputs", 1, outputs.len())?;
        self.kernel.connect(&inputs[0], &outputs[0])?;
        self.input = Some(Arc::downgrade(&inputs[0]));
        self.output = Some(Arc::downgrade(&outputs[0]));
        debug!(kernel = %name, input = %inputs[0].shape(), output = %outputs[0].shape(), "connected");
        Ok(())
    }

    fn feed_forward(&mut self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        let (input, output) = self.bound()?;
        self.kernel.feed_forward(&input, &output)
    }

    fn back_propagate(&mut self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        let (input, output) = self.bound()?;
        self.kernel.back_propagate(&input, &output)
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn description(&self) -> String {
        self.kernel.name()
    }

    fn is_accelerator_aware(&self) -> bool {
        self.kernel.is_accelerator_aware()
    }
}
