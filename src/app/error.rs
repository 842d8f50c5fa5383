use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("input unusable: {0}")]
    Input(String),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn input<E: std::fmt::Display>(error: E) -> Self {
        Self::Input(error.to_string())
    }

    pub fn output<E: std::fmt::Display>(error: E) -> Self {
        Self::Output(error.to_string())
    }
}
