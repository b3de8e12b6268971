//! Domain error types.

/// Top-level error type for bottomscan.
#[derive(Debug, thiserror::Error)]
pub enum BottomscanError {
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

    #[error("provider unavailable: {reason}")]
    Provider { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("malformed bar series for {code}: {reason}")]
    MalformedSeries { code: String, reason: String },

    #[error("instrument universe unavailable after {attempts} attempts: {last_error}")]
    UniverseUnavailable { attempts: u32, last_error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BottomscanError {
    /// Failures that may clear up on their own and warrant a cooldown before
    /// the next request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BottomscanError::Provider { .. }
                | BottomscanError::Database { .. }
                | BottomscanError::DatabaseQuery { .. }
                | BottomscanError::Io(_)
        )
    }
}

impl From<&BottomscanError> for std::process::ExitCode {
    fn from(err: &BottomscanError) -> Self {
        let code: u8 = match err {
            BottomscanError::Io(_) => 1,
            BottomscanError::ConfigParse { .. }
            | BottomscanError::ConfigMissing { .. }
            | BottomscanError::ConfigInvalid { .. } => 2,
            BottomscanError::Database { .. } | BottomscanError::DatabaseQuery { .. } => 3,
            BottomscanError::Provider { .. } => 4,
            BottomscanError::NoData { .. } | BottomscanError::MalformedSeries { .. } => 5,
            BottomscanError::UniverseUnavailable { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
