use thiserror::Error;

/// Rejection reasons produced while validating request input.
///
/// Every variant maps to a stable machine-readable code (see [`ValidationError::code`])
/// so clients can branch on the reason without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The text was empty after trimming, or the slot list had no entries.
    #[error("input must not be empty")]
    EmptyInput,

    /// A character outside letters, digits, whitespace and `. , ! ? -`.
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },

    /// Input exceeds the configured size limit.
    #[error("input length {length} exceeds the maximum of {max}")]
    TooLong { length: usize, max: usize },

    /// A tree slot that is neither absent nor a finite integer.
    #[error("slot {index} is not a valid integer value")]
    InvalidValue { index: usize },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyInput => "EMPTY_INPUT",
            ValidationError::InvalidCharacter { .. } => "INVALID_CHARACTER",
            ValidationError::TooLong { .. } => "TOO_LONG",
            ValidationError::InvalidValue { .. } => "INVALID_VALUE",
        }
    }
}

/// Failures raised by the calculation engines once input passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Reconstruction produced no nodes (empty slots or an absent root).
    #[error("tree has no nodes")]
    EmptyTree,
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::EmptyTree => "EMPTY_TREE",
        }
    }
}

/// Any rejection a calculation request can end in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CalcError {
    pub fn code(&self) -> &'static str {
        match self {
            CalcError::Validation(e) => e.code(),
            CalcError::Engine(e) => e.code(),
        }
    }
}
