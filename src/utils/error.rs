use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to start '{program}': {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid command: {message}")]
    InvalidCommandError { message: String },

    #[error("Command {command:?} returned non-zero exit status {returncode}")]
    CalledProcessError {
        command: Vec<String>,
        returncode: i32,
        stdout: Option<Vec<u8>>,
        stderr: Option<Vec<u8>>,
    },

    #[error("Command {command:?} timed out after {timeout:?}")]
    TimeoutError {
        command: Vec<String>,
        timeout: Duration,
    },

    #[error("Failed to resolve path for {name}")]
    ToolNotFoundError { name: String },

    #[error("Emulator error: {message}")]
    EmulatorError { message: String },

    #[error("Invalid LoRA parameter '{name}': {reason}")]
    InvalidParameterError { name: String, reason: String },

    #[error("Invalid flatbuffer: {0}")]
    FlatBufferError(#[from] flatbuffers::InvalidFlatbuffer),

    #[error("Safetensors error: {0}")]
    SafeTensorsError(#[from] safetensors::SafeTensorError),

    #[error("Unsupported format: {message}")]
    UnsupportedFormatError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Process,
    Android,
    Lora,
    Configuration,
    System,
}

impl ToolsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ToolsError::SpawnError { .. }
            | ToolsError::InvalidCommandError { .. }
            | ToolsError::CalledProcessError { .. }
            | ToolsError::TimeoutError { .. } => ErrorCategory::Process,
            ToolsError::ToolNotFoundError { .. } | ToolsError::EmulatorError { .. } => {
                ErrorCategory::Android
            }
            ToolsError::InvalidParameterError { .. }
            | ToolsError::FlatBufferError(_)
            | ToolsError::SafeTensorsError(_)
            | ToolsError::UnsupportedFormatError { .. } => ErrorCategory::Lora,
            ToolsError::ConfigError { .. }
            | ToolsError::InvalidConfigValueError { .. }
            | ToolsError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ToolsError::IoError(_) | ToolsError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ToolsError::SpawnError { .. } => "Check that the program exists and is executable",
            ToolsError::InvalidCommandError { .. } => "Pass at least the program to execute",
            ToolsError::CalledProcessError { .. } => {
                "Inspect the command output above for the failure reason"
            }
            ToolsError::TimeoutError { .. } => "Increase the timeout or check for a hung process",
            ToolsError::ToolNotFoundError { .. } => {
                "Install the Android SDK command-line tools or set ANDROID_HOME"
            }
            ToolsError::EmulatorError { .. } => {
                "Check the emulator log output and that the AVD exists"
            }
            ToolsError::InvalidParameterError { .. } => {
                "Make sure dims match the amount of raw data for the data type"
            }
            ToolsError::FlatBufferError(_) | ToolsError::UnsupportedFormatError { .. } => {
                "The file is not a supported LoRA adapter file"
            }
            ToolsError::SafeTensorsError(_) => "The input is not a valid safetensors file",
            ToolsError::ConfigError { .. }
            | ToolsError::InvalidConfigValueError { .. }
            | ToolsError::MissingConfigError { .. } => "Fix the configuration file and retry",
            ToolsError::IoError(_) | ToolsError::SerializationError(_) => {
                "Check file permissions and available disk space"
            }
        }
    }

    /// Exit code of a failed child process, if that is what this error is.
    pub fn returncode(&self) -> Option<i32> {
        match self {
            ToolsError::CalledProcessError { returncode, .. } => Some(*returncode),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_called_process_error_message() {
        let err = ToolsError::CalledProcessError {
            command: vec!["false".to_string()],
            returncode: 1,
            stdout: None,
            stderr: None,
        };
        assert_eq!(
            err.to_string(),
            "Command [\"false\"] returned non-zero exit status 1"
        );
        assert_eq!(err.category(), ErrorCategory::Process);
        assert_eq!(err.returncode(), Some(1));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ToolsError = io.into();
        assert_eq!(err.category(), ErrorCategory::System);
        assert!(err.returncode().is_none());
    }
}
