use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamrecError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {details}")]
    Framing { details: String },

    #[error("Subprocess error in {stage}: {message}")]
    Subprocess { stage: String, message: String },
}

impl CamrecError {
    pub fn framing<S: Into<String>>(details: S) -> Self {
        Self::Framing {
            details: details.into(),
        }
    }

    pub fn subprocess<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self::Subprocess {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CamrecError>;
