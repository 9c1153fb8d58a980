//! Centralized error handling for gsvis
//!
//! Every fallible operation in the crate returns [`VerifError`]. The variants
//! follow the job taxonomy: configuration problems, I/O problems, data
//! problems, and failures of the collaborators (NetCDF, plotting back-end,
//! external regridder).

use std::fmt;
use std::path::PathBuf;

/// Main error type for gsvis operations
#[derive(Debug)]
pub enum VerifError {
    /// A configuration value failed validation
    Config {
        field: String,
        value: String,
        reason: String,
    },

    /// A required input or output directory does not exist
    MissingDirectory { path: PathBuf },

    /// A glob pattern matched nothing
    NoMatchingFiles { pattern: String },

    /// I/O operation errors
    IoError(std::io::Error),

    /// A serialized bundle could not be read or decoded
    Bundle { path: PathBuf, message: String },

    /// Data problems: empty tables, absent columns, empty selections
    Data(String),

    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// Variable not found in NetCDF file
    VariableNotFound { var: String },

    /// Dimension not found in variable
    DimensionNotFound { var: String, dim: String },

    /// Plot back-end errors
    Plot(String),

    /// External command (regridder) failed
    Command { program: String, message: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Generic error
    Generic(String),
}

impl VerifError {
    /// Shorthand for a configuration error on `field`.
    pub fn config(field: &str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        VerifError::Config {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error must stop the job. Data problems and unreadable
    /// per-initialization bundles are reported and skipped.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, VerifError::Data(_) | VerifError::Bundle { .. })
    }

    /// Process exit code for a job that stopped on this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            VerifError::Config { .. } => 2,
            VerifError::MissingDirectory { .. } => 3,
            VerifError::NoMatchingFiles { .. } => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for VerifError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifError::Config {
                field,
                value,
                reason,
            } => write!(f, "Invalid {} '{}': {}", field, value, reason),
            VerifError::MissingDirectory { path } => {
                write!(f, "Directory '{}' does not exist", path.display())
            }
            VerifError::NoMatchingFiles { pattern } => {
                write!(f, "No files match pattern '{}'", pattern)
            }
            VerifError::IoError(e) => write!(f, "I/O error: {}", e),
            VerifError::Bundle { path, message } => {
                write!(f, "Unreadable bundle '{}': {}", path.display(), message)
            }
            VerifError::Data(msg) => write!(f, "Data error: {}", msg),
            VerifError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            VerifError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            VerifError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found in variable '{}'", dim, var)
            }
            VerifError::Plot(msg) => write!(f, "Plot error: {}", msg),
            VerifError::Command { program, message } => {
                write!(f, "Command '{}' failed: {}", program, message)
            }
            VerifError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            VerifError::ArrayError(e) => write!(f, "Array error: {}", e),
            VerifError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for VerifError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VerifError::NetCDFError(e) => Some(e),
            VerifError::IoError(e) => Some(e),
            VerifError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for VerifError {
    fn from(error: netcdf::Error) -> Self {
        VerifError::NetCDFError(error)
    }
}

impl From<std::io::Error> for VerifError {
    fn from(error: std::io::Error) -> Self {
        VerifError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for VerifError {
    fn from(error: ndarray::ShapeError) -> Self {
        VerifError::ArrayError(error)
    }
}

impl From<serde_yaml::Error> for VerifError {
    fn from(error: serde_yaml::Error) -> Self {
        VerifError::config("configuration file", "<yaml>", error.to_string())
    }
}

impl From<serde_json::Error> for VerifError {
    fn from(error: serde_json::Error) -> Self {
        VerifError::Generic(format!("JSON error: {}", error))
    }
}

impl From<glob::PatternError> for VerifError {
    fn from(error: glob::PatternError) -> Self {
        VerifError::config("glob pattern", error.msg, format!("at position {}", error.pos))
    }
}

impl From<rayon::ThreadPoolBuildError> for VerifError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        VerifError::ThreadPoolError(error.to_string())
    }
}

impl From<String> for VerifError {
    fn from(error: String) -> Self {
        VerifError::Generic(error)
    }
}

impl From<&str> for VerifError {
    fn from(error: &str) -> Self {
        VerifError::Generic(error.to_string())
    }
}

/// Result type alias for gsvis operations
pub type Result<T> = std::result::Result<T, VerifError>;
