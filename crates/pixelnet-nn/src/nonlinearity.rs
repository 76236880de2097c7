// Non-linearity layers — element-wise activations as simple layers
//
// Each activation maps the input's data onto an output of identical shape and
// turns the output delta back into an input delta using the forward state:
//
//   Tanh      y = tanh(x)                δx = δy · (1 − y²)
//   Sigmoid   y = 1 / (1 + e^(−x))       δx = δy · y · (1 − y)
//   ReLU      y = max(0, x)              δx = δy · [x > 0]
//   Softmax   y = softmax over maps      δx = y · (δy − Σ δy·y)
//
// Softmax normalizes across the maps of every pixel of every sample, which
// is what a pixelwise classifier needs.
//
// Inputs are read into a scratch buffer before the output is written, so an
// output that shadows its input (in-place activation) works too.
//
// Example:
//   let mut layer = NonLinearityLayer::tanh();
//   layer.connect(&[input], &[output])?;
//   layer.feed_forward()?;

use pixelnet_core::{Datum, Error, Result, Shape};

use crate::combined::CombinedTensor;
use crate::layer::reject;
use crate::simple::{SimpleKernel, SimpleLayer};

/// Which activation a [`NonLinearityLayer`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonLinearity {
    Tanh,
    Sigmoid,
    ReLU,
    Softmax,
}

/// A simple layer applying a [`NonLinearity`].
pub type NonLinearityLayer = SimpleLayer<NonLinearity>;

impl SimpleLayer<NonLinearity> {
    pub fn tanh() -> Self {
        SimpleLayer::new(NonLinearity::Tanh)
    }

    pub fn sigmoid() -> Self {
        SimpleLayer::new(NonLinearity::Sigmoid)
    }

    pub fn relu() -> Self {
        SimpleLayer::new(NonLinearity::ReLU)
    }

    pub fn softmax() -> Self {
        SimpleLayer::new(NonLinearity::Softmax)
    }
}

impl SimpleKernel for NonLinearity {
    fn name(&self) -> String {
        format!("{self:?}")
    }

    fn create_output(&self, input: Shape) -> Result<Shape> {
        Ok(input)
    }

    fn connect(&mut self, input: &CombinedTensor, output: &CombinedTensor) -> Result<()> {
        for (expected, got) in [
            (input.data.shape(), output.data.shape()),
            (input.data.shape(), input.delta.shape()),
            (output.data.shape(), output.delta.shape()),
        ] {
            if expected != got {
                return reject(Error::ShapeMismatch { expected, got });
            }
        }
        Ok(())
    }

    fn feed_forward(&mut self, input: &CombinedTensor, output: &CombinedTensor) -> Result<()> {
        let x = input.data.to_vec();
        let mut y = output.data.data_mut();
        match self {
            NonLinearity::Tanh => map_into(&x, &mut y, Datum::tanh),
            NonLinearity::Sigmoid => map_into(&x, &mut y, |v| 1.0 / (1.0 + (-v).exp())),
            NonLinearity::ReLU => map_into(&x, &mut y, |v| v.max(0.0)),
            NonLinearity::Softmax => softmax(&x, &mut y, input.shape()),
        }
        Ok(())
    }

    fn back_propagate(&mut self, input: &CombinedTensor, output: &CombinedTensor) -> Result<()> {
        let y = output.data.to_vec();
        let dy = output.delta.to_vec();
        match self {
            NonLinearity::Tanh => {
                let mut dx = input.delta.data_mut();
                for ((dx, &y), &dy) in dx.iter_mut().zip(&y).zip(&dy) {
                    *dx = dy * (1.0 - y * y);
                }
            }
            NonLinearity::Sigmoid => {
                let mut dx = input.delta.data_mut();
                for ((dx, &y), &dy) in dx.iter_mut().zip(&y).zip(&dy) {
                    *dx = dy * y * (1.0 - y);
                }
            }
            NonLinearity::ReLU => {
                let x = input.data.to_vec();
                let mut dx = input.delta.data_mut();
                for ((dx, &x), &dy) in dx.iter_mut().zip(&x).zip(&dy) {
                    *dx = if x > 0.0 { dy } else { 0.0 };
                }
            }
            NonLinearity::Softmax => {
                let mut dx = input.delta.data_mut();
                softmax_backward(&y, &dy, &mut dx, input.shape());
            }
        }
        Ok(())
    }
}

fn map_into(x: &[Datum], y: &mut [Datum], f: impl Fn(Datum) -> Datum) {
    for (y, &x) in y.iter_mut().zip(x) {
        *y = f(x);
    }
}

/// Softmax across maps for every (sample, y, x).
fn softmax(x: &[Datum], y: &mut [Datum], shape: Shape) {
    let plane = shape.plane_size();
    for sample in 0..shape.samples {
        let base = sample * shape.sample_size();
        for pixel in 0..plane {
            let at = |map: usize| base + map * plane + pixel;
            let max = (0..shape.maps)
                .map(|m| x[at(m)])
                .fold(Datum::NEG_INFINITY, Datum::max);
            let mut sum = 0.0;
            for m in 0..shape.maps {
                let e = (x[at(m)] - max).exp();
                y[at(m)] = e;
                sum += e;
            }
            for m in 0..shape.maps {
                y[at(m)] /= sum;
            }
        }
    }
}

fn softmax_backward(y: &[Datum], dy: &[Datum], dx: &mut [Datum], shape: Shape) {
    let plane = shape.plane_size();
    for sample in 0..shape.samples {
        let base = sample * shape.sample_size();
        for pixel in 0..plane {
            let at = |map: usize| base + map * plane + pixel;
            let dot: Datum = (0..shape.maps).map(|m| dy[at(m)] * y[at(m)]).sum();
            for m in 0..shape.maps {
                dx[at(m)] = y[at(m)] * (dy[at(m)] - dot);
            }
        }
    }
}
