use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(core_runtime::Error),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] core_acquisition::AcquisitionError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl From<core_runtime::Error> for CoreError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::Runtime(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_are_lifted() {
        let err: CoreError = core_runtime::Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "inject one".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::CapabilityMissing { .. }));

        let err: CoreError = core_runtime::Error::Config("bad".to_string()).into();
        assert!(matches!(err, CoreError::Runtime(_)));
    }
}
