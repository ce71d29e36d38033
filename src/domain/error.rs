//! Domain error types.

/// Top-level error type for leaptrader.
#[derive(Debug, thiserror::Error)]
pub enum LeaptraderError {
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

    #[error("unknown sweep parameter: {name}")]
    UnknownParameter { name: String },

    #[error("invalid table name: {name}")]
    InvalidTableName { name: String },

    #[error("no price data in table {table} for the configured date range")]
    NoData { table: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LeaptraderError> for std::process::ExitCode {
    fn from(err: &LeaptraderError) -> Self {
        let code: u8 = match err {
            LeaptraderError::Io(_) => 1,
            LeaptraderError::ConfigParse { .. }
            | LeaptraderError::ConfigMissing { .. }
            | LeaptraderError::ConfigInvalid { .. } => 2,
            LeaptraderError::Database { .. }
            | LeaptraderError::DatabaseQuery { .. }
            | LeaptraderError::InvalidTableName { .. } => 3,
            LeaptraderError::UnknownParameter { .. } => 4,
            LeaptraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
