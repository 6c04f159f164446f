use thiserror::Error;

/// Startup-time infrastructure failures: binding the listener socket,
/// opening the database pool and running migrations, installing telemetry,
/// or settings that rule out serving at all.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("listener setup failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("database unavailable: {message}")]
    Database { message: String },
    #[error("telemetry install failed: {message}")]
    Telemetry { message: String },
    #[error("invalid deployment configuration: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
