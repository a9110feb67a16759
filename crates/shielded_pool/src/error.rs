//! Error classification.
//!
//! Every failure the pool reports falls in one of four classes, and callers
//! act on the class rather than on the concrete error: a stale submission is
//! rebuilt against fresh roots, a double spend is dropped for good.

/// The four failure classes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    /// Wrong shape, out-of-range fields, unsupported versions.
    Malformed,
    /// Built against roots or accumulators that have since moved.
    Stale,
    /// A nullifier that is already spent or pending.
    DoubleSpend,
    /// The witness does not satisfy the predicate.
    Soundness,
}

impl ErrorClass {
    /// Whether rebuilding the proof against current state can succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Stale)
    }

    /// Stable lowercase name, used as a log field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Stale => "stale",
            Self::DoubleSpend => "double_spend",
            Self::Soundness => "soundness",
        }
    }
}

/// An error that knows its [`ErrorClass`].
pub trait Classify {
    /// The failure class.
    fn class(&self) -> ErrorClass;

    /// Shorthand for `self.class().is_retryable()`.
    fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
