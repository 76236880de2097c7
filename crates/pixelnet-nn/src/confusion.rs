// Confusion matrix layer — weighted classification statistics
//
// A terminal layer: it has three inputs and no outputs.
//
//   scores   one row of class scores per sample, decoded with argmax
//   labels   one element per sample holding the true class as raw u32 bits
//   weights  one element per sample, the sample's weight
//
// Every forward pass adds each sample's weight to
//
//   matrix[predicted][actual], per_class[actual], total,
//   and right (when predicted == actual).
//
// Nothing flows backward. The statistics accumulate across passes until
// `reset`. Reports print one row per predicted class (the `vCLS` axis) and
// one column per actual class (`ACT>`).

use std::io::Write;
use std::sync::{Arc, Weak};

use pixelnet_core::{Error, Result, Shape};
use tracing::{debug, info};

use crate::combined::{CombinedTensor, Edge};
use crate::layer::{expect_arity, expect_samples, reject, upgrade, Layer};

const LAYER: &str = "ConfusionMatrixLayer";
const COLUMN: usize = 12;

/// Square matrix of weighted counts indexed `[predicted][actual]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    classes: usize,
    matrix: Vec<f64>,
    per_class: Vec<f64>,
    total: f64,
    right: f64,
}

impl ConfusionMatrix {
    /// A zeroed matrix for `classes` classes.
    pub fn new(classes: usize) -> Self {
        ConfusionMatrix {
            classes,
            matrix: vec![0.0; classes * classes],
            per_class: vec![0.0; classes],
            total: 0.0,
            right: 0.0,
        }
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Zero every accumulator.
    pub fn reset(&mut self) {
        self.matrix.fill(0.0);
        self.per_class.fill(0.0);
        self.total = 0.0;
        self.right = 0.0;
    }

    /// Add one weighted observation. Both classes must be in range.
    pub fn add(&mut self, predicted: usize, actual: usize, weight: f64) {
        self.matrix[predicted * self.classes + actual] += weight;
        self.per_class[actual] += weight;
        self.total += weight;
        if predicted == actual {
            self.right += weight;
        }
    }

    /// Weighted count of samples of class `actual` predicted as `predicted`.
    pub fn count(&self, predicted: usize, actual: usize) -> f64 {
        self.matrix[predicted * self.classes + actual]
    }

    /// Total weight of samples whose true class is `actual`.
    pub fn per_class(&self, actual: usize) -> f64 {
        self.per_class[actual]
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    /// right / total, or `None` before anything was accumulated.
    pub fn recognition_rate(&self) -> Option<f64> {
        (self.total > 0.0).then(|| self.right / self.total)
    }

    /// Mean over classes with nonzero weight of diagonal / per-class total.
    pub fn average_recognition_rate(&self) -> Option<f64> {
        let (sum, seen) = (0..self.classes)
            .filter(|&c| self.per_class[c] > 0.0)
            .fold((0.0, 0usize), |(sum, seen), c| {
                (sum + self.count(c, c) / self.per_class[c], seen + 1)
            });
        (seen > 0).then(|| sum / seen as f64)
    }
}

/// Terminal layer accumulating a [`ConfusionMatrix`].
pub struct ConfusionMatrixLayer {
    names: Vec<String>,
    classes: usize,
    inputs: Option<[Weak<CombinedTensor>; 3]>,
    matrix: Option<ConfusionMatrix>,
    disabled: bool,
}

impl ConfusionMatrixLayer {
    /// Create a layer for `classes` classes labelled by `names`.
    pub fn new<I, S>(names: I, classes: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() < classes {
            return reject(Error::NamesMismatch {
                classes,
                names: names.len(),
            });
        }
        debug!(classes, "Instance created");
        Ok(ConfusionMatrixLayer {
            names,
            classes,
            inputs: None,
            matrix: None,
            disabled: false,
        })
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn names(&self) -> &[String] {
        &self.names[..self.classes]
    }

    /// The accumulator, present once connected.
    pub fn matrix(&self) -> Option<&ConfusionMatrix> {
        self.matrix.as_ref()
    }

    /// Zero the accumulator. No-op before `connect`.
    pub fn reset(&mut self) {
        if let Some(matrix) = self.matrix.as_mut() {
            matrix.reset();
        }
    }

    fn validate(inputs: &[Shape]) -> Result<()> {
        expect_arity(LAYER, "inputs", 3, inputs.len())?;
        let (scores, labels, weights) = (inputs[0], inputs[1], inputs[2]);
        expect_samples(LAYER, scores.samples, labels.samples)?;
        expect_samples(LAYER, scores.samples, weights.samples)?;
        // Labels and weights carry exactly one value per sample.
        for shape in [labels, weights] {
            if shape.elements() != shape.samples {
                return reject(Error::ShapeMismatch {
                    expected: Shape::new(shape.samples, 1, 1, 1),
                    got: shape,
                });
            }
        }
        Ok(())
    }

    fn accumulator(&self) -> Result<&ConfusionMatrix> {
        self.matrix.as_ref().ok_or_else(|| Error::NotConnected {
            layer: LAYER.to_string(),
        })
    }

    /// Write the human-readable table and both recognition rates.
    pub fn print<W: Write>(&self, prefix: &str, training: bool, output: &mut W) -> Result<()> {
        let matrix = self.accumulator()?;
        let names = self.names();

        let mut line = format!("{:>COLUMN$}", "vCLS  ACT>");
        for name in names {
            line.push_str(&format!("{name:>COLUMN$}"));
        }
        writeln!(output, "{line}")?;

        for (row, name) in names.iter().enumerate() {
            let mut line = format!("{name:>COLUMN$}");
            for col in 0..self.classes {
                let count = matrix.count(row, col) as i64;
                line.push_str(&format!("{count:>COLUMN$}"));
            }
            writeln!(output, "{line}")?;
        }

        let overall = matrix.recognition_rate();
        let average = matrix.average_recognition_rate();
        writeln!(
            output,
            "{prefix} Overall recognition rate (not normalized): {}",
            percent(overall)
        )?;
        writeln!(
            output,
            "{prefix} Average recognition rate (normalized)    : {}",
            percent(average)
        )?;
        info!(prefix, training, ?overall, ?average, "confusion matrix reported");
        Ok(())
    }

    /// Write the matrix as CSV with a header row of class names.
    pub fn print_csv<W: Write>(&self, output: &mut W) -> Result<()> {
        let matrix = self.accumulator()?;
        let names = self.names();
        writeln!(output, "classified,{}", names.join(","))?;
        for (row, name) in names.iter().enumerate() {
            let counts: Vec<String> = (0..self.classes)
                .map(|col| (matrix.count(row, col) as i64).to_string())
                .collect();
            writeln!(output, "{name},{}", counts.join(","))?;
        }
        Ok(())
    }
}

fn percent(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", 100.0 * rate),
        None => "n/a".to_string(),
    }
}

impl Layer for ConfusionMatrixLayer {
    fn create_outputs(&self, inputs: &[Shape]) -> Result<Vec<Shape>> {
        Self::validate(inputs)?;
        Ok(Vec::new())
    }

    fn connect(&mut self, inputs: &[Edge], outputs: &[Edge]) -> Result<()> {
        expect_arity(LAYER, "outputs", 0, outputs.len())?;
        let shapes: Vec<Shape> = inputs.iter().map(|edge| edge.shape()).collect();
        Self::validate(&shapes)?;

        self.inputs = Some([
            Arc::downgrade(&inputs[0]),
            Arc::downgrade(&inputs[1]),
            Arc::downgrade(&inputs[2]),
        ]);
        self.matrix = Some(ConfusionMatrix::new(self.classes));
        debug!(classes = self.classes, samples = shapes[0].samples, "connected");
        Ok(())
    }

    fn feed_forward(&mut self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        let bindings = self.inputs.as_ref();
        let scores = upgrade(bindings.map(|b| &b[0]), LAYER)?;
        let labels = upgrade(bindings.map(|b| &b[1]), LAYER)?;
        let weights = upgrade(bindings.map(|b| &b[2]), LAYER)?;
        let classes = self.classes;

        // Decode everything first so a bad sample leaves the matrix untouched.
        let mut observations = Vec::with_capacity(scores.samples());
        for sample in 0..scores.samples() {
            let predicted = scores.data.maximum(sample);
            let actual = labels.data.bits(sample) as usize;
            for class in [predicted, actual] {
                if class >= classes {
                    return reject(Error::ClassOutOfRange {
                        class,
                        classes,
                        sample,
                    });
                }
            }
            let weight = f64::from(weights.data.get(sample));
            observations.push((predicted, actual, weight));
        }

        let matrix = self.matrix.as_mut().ok_or_else(|| Error::NotConnected {
            layer: LAYER.to_string(),
        })?;
        for (predicted, actual, weight) in observations {
            matrix.add(predicted, actual, weight);
        }
        Ok(())
    }

    fn back_propagate(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn description(&self) -> String {
        format!("Confusion Matrix Layer ({} classes)", self.classes)
    }
}
