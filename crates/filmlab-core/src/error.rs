use thiserror::Error;

/// Errors raised while importing or combining 3D LUTs.
///
/// A failure here only ever rejects the LUT slot it was destined for;
/// the rest of the Parameter Set is left untouched by callers.
#[derive(Debug, Error, PartialEq)]
pub enum LutError {
    #[error("missing LUT_3D_SIZE header")]
    MissingSize,
    #[error("unsupported LUT size {0} (expected 2..=256)")]
    UnsupportedSize(usize),
    #[error("1D LUTs are not supported")]
    OneDimensional,
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("expected {expected} RGB triples, found {found}")]
    WrongEntryCount { expected: usize, found: usize },
    #[error("DOMAIN_MIN must be below DOMAIN_MAX on every channel")]
    InvalidDomain,
}
