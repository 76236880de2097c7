use crate::shape::Shape;

/// Structural errors reported by tensors and layers.
///
/// Every operation that returns one of these leaves its receiver untouched:
/// a failed `reshape` keeps the old shape, a failed copy keeps the target's
/// contents, a failed `connect` keeps the previous bindings. Contract
/// violations (out-of-bounds access, unallocated storage, unintentional
/// copies) are not represented here; they panic in strict mode.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two tensors that must agree in shape do not.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Reshape would change the number of elements.
    #[error("cannot reshape: tensor has {src} elements, target shape {dst_shape} has {dst}")]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// Element count mismatch when creating from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Sample or map copy between incompatible tensors or out-of-range indices.
    #[error("incompatible copy from {source_shape} to {target_shape}: {reason}")]
    IncompatibleCopy {
        source_shape: Shape,
        target_shape: Shape,
        reason: String,
    },

    /// A shadow tensor does not own its storage and cannot reallocate it.
    #[error("cannot resize shadow tensor {shape}")]
    ShadowResize { shape: Shape },

    /// A layer received the wrong number of inputs or outputs.
    #[error("{layer}: expected {expected} {side}, got {got}")]
    ArityMismatch {
        layer: String,
        side: &'static str,
        expected: usize,
        got: usize,
    },

    /// Inputs of a layer disagree in their sample count.
    #[error("{layer}: inputs need the same number of samples ({left} vs {right})")]
    SampleCountMismatch {
        layer: String,
        left: usize,
        right: usize,
    },

    /// Forward or backward pass on a layer without live bindings.
    #[error("{layer}: not connected")]
    NotConnected { layer: String },

    /// A predicted or labelled class index falls outside the configured classes.
    #[error("class index {class} out of range for {classes} classes (sample {sample})")]
    ClassOutOfRange {
        class: usize,
        classes: usize,
        sample: usize,
    },

    /// Fewer class names than classes.
    #[error("{classes} classes need as many names, got {names}")]
    NamesMismatch { classes: usize, names: usize },

    /// Failure of the underlying stream during (de)serialization or reporting.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout pixelnet.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::msg(format!($($arg)*)))
    };
}
