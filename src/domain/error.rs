//! Domain error types.

use chrono::NaiveDate;

/// Coarse classification used by the cycles to decide between degrading and
/// aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Too little input to produce a full result. Reported, not fatal.
    InputInsufficiency,
    /// An external fetch failed after retries. Reported, falls back.
    UpstreamUnavailable,
    /// A programming-contract violation. Aborts the cycle for the day.
    InvariantViolation,
    /// Configuration, storage or IO failure outside the core.
    Environment,
}

/// Top-level error type for newswatch.
#[derive(Debug, thiserror::Error)]
pub enum NewswatchError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("fetch from {source_name} failed: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("{source_name} unavailable after {attempts} attempts: {reason}")]
    UpstreamUnavailable {
        source_name: String,
        attempts: u32,
        reason: String,
    },

    #[error("insufficient digest: {found} distinct items, need {minimum}")]
    InsufficientDigest { found: usize, minimum: usize },

    #[error("no candidate reached the relevance floor {floor}")]
    EmptyCandidateSet { floor: f64 },

    #[error("no usable quote for {code} on {date}: {reason}")]
    QuoteUnavailable {
        code: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("relevance score {value} is outside [0, 1]")]
    RelevanceOutOfRange { value: f64 },

    #[error("{code} is already recommended on {date}")]
    DuplicateRecommendation { date: NaiveDate, code: String },

    #[error("paper trade for {code} on {date} already recorded")]
    DuplicateTrade { date: NaiveDate, code: String },

    #[error("invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("language model reply rejected: {reason}")]
    MalformedModelReply { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NewswatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            NewswatchError::InsufficientDigest { .. }
            | NewswatchError::EmptyCandidateSet { .. }
            | NewswatchError::QuoteUnavailable { .. } => ErrorClass::InputInsufficiency,
            NewswatchError::Fetch { .. }
            | NewswatchError::UpstreamUnavailable { .. }
            | NewswatchError::MalformedModelReply { .. } => ErrorClass::UpstreamUnavailable,
            NewswatchError::RelevanceOutOfRange { .. }
            | NewswatchError::DuplicateRecommendation { .. }
            | NewswatchError::DuplicateTrade { .. }
            | NewswatchError::InvariantViolation { .. } => ErrorClass::InvariantViolation,
            NewswatchError::Database { .. }
            | NewswatchError::DatabaseQuery { .. }
            | NewswatchError::ConfigParse { .. }
            | NewswatchError::ConfigMissing { .. }
            | NewswatchError::ConfigInvalid { .. }
            | NewswatchError::Io(_) => ErrorClass::Environment,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::InputInsufficiency | ErrorClass::UpstreamUnavailable
        )
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        NewswatchError::InvariantViolation {
            reason: reason.into(),
        }
    }
}

impl From<&NewswatchError> for std::process::ExitCode {
    fn from(err: &NewswatchError) -> Self {
        let code: u8 = match err {
            NewswatchError::Io(_) => 1,
            NewswatchError::ConfigParse { .. }
            | NewswatchError::ConfigMissing { .. }
            | NewswatchError::ConfigInvalid { .. } => 2,
            NewswatchError::Database { .. } | NewswatchError::DatabaseQuery { .. } => 3,
            _ => match err.class() {
                ErrorClass::UpstreamUnavailable => 4,
                ErrorClass::InputInsufficiency => 5,
                ErrorClass::InvariantViolation => 6,
                ErrorClass::Environment => 1,
            },
        };
        std::process::ExitCode::from(code)
    }
}
