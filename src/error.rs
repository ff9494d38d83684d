//! Error type shared by every PSF, kernel and transform operation.
//!
//! Errors are local to a single evaluation call. Nothing in the crate catches
//! or retries them: evaluation is deterministic, so a retry would reproduce
//! the same failure. Callers measuring many sources are expected to record a
//! per-source failure and carry on.

/// Errors produced while evaluating, resizing or persisting a PSF model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PsfError {
    /// A position lies outside the domain of a transform or kernel basis,
    /// or the local linearization at that position is singular.
    #[error("geometry error at ({x:.3}, {y:.3}): {reason}")]
    Geometry { x: f64, y: f64, reason: String },

    /// A resize request the representation cannot honour.
    #[error("unsupported size {width}x{height}: {reason}")]
    UnsupportedSize {
        width: usize,
        height: usize,
        reason: String,
    },

    /// Image dimensions that imply an impractically large allocation.
    #[error("refusing to allocate a {width}x{height} image")]
    Allocation { width: usize, height: usize },

    /// Kernel weights summing to zero, which cannot be normalized.
    #[error("kernel weights sum to zero")]
    DegenerateKernel,

    /// The model wraps a kernel with no serialized form.
    #[error("{0} is not persistable")]
    NotPersistable(String),

    /// A persistence record could not be produced or read back.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl PsfError {
    pub(crate) fn geometry(point: crate::Point2, reason: impl Into<String>) -> Self {
        PsfError::Geometry {
            x: point.x,
            y: point.y,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_size(width: usize, height: usize, reason: impl Into<String>) -> Self {
        PsfError::UnsupportedSize {
            width,
            height,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PsfError>;
