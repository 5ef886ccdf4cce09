//! Domain error types.
//!
//! Expected non-events (no signal, rejected sizing) are not errors; they are
//! modelled as values in [`crate::domain::signal`] and [`crate::domain::risk`].

/// Top-level error type for daytrader.
#[derive(Debug, thiserror::Error)]
pub enum DaytraderError {
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

    #[error("bad bar data for {symbol}: {reason}")]
    Data { symbol: String, reason: String },

    #[error("execution gateway error for {symbol}: {reason}")]
    Execution { symbol: String, reason: String },

    #[error("connection error: {reason}")]
    Connection { reason: String },

    #[error("report sink error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DaytraderError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        DaytraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn data(symbol: &str, reason: impl Into<String>) -> Self {
        DaytraderError::Data {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

impl DaytraderError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            DaytraderError::Io(_) | DaytraderError::Json(_) => 1,
            DaytraderError::ConfigParse { .. }
            | DaytraderError::ConfigMissing { .. }
            | DaytraderError::ConfigInvalid { .. } => 2,
            DaytraderError::Data { .. } => 3,
            DaytraderError::Connection { .. } => 4,
            DaytraderError::Execution { .. } | DaytraderError::Report { .. } => 5,
        }
    }
}

impl From<&DaytraderError> for std::process::ExitCode {
    fn from(err: &DaytraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
