use crate::path::TreePath;
use std::fmt;
use std::path::PathBuf;

/// Result type alias for stagecrypt operations
pub type Result<T> = std::result::Result<T, Error>;

/// One failed parameter write inside a sink batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkFailure {
    /// Full parameter name that could not be written
    pub name: String,
    /// Reason reported by the parameter store
    pub message: String,
}

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Core error type for stagecrypt operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No stage definition or override selector matches a stage name
    #[error("unknown stage '{name}'{}", location(.path))]
    UnknownStage { name: String, path: TreePath },

    /// A matched stage has no usable key reference or environment
    #[error("key resolution failed for stage '{stage}'{}: {message}", location(.path))]
    KeyResolution {
        stage: String,
        path: TreePath,
        message: String,
    },

    /// A call to the key-management service failed
    #[error("key service {operation} failed{}: {message}", location(.path))]
    KeyService {
        operation: String,
        path: TreePath,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The config tree violates a structural invariant
    #[error("malformed config tree{}: {message}", location(.path))]
    MalformedTree { path: TreePath, message: String },

    /// A single parameter store call failed
    #[error("parameter store {operation} failed: {message}")]
    ParameterStore { operation: String, message: String },

    /// One or more parameter store writes failed
    #[error("{}", format_sink_failures(.failures, .written))]
    SinkWrite {
        failures: Vec<SinkFailure>,
        written: usize,
    },

    /// A rendered value cannot be stored in the parameter store
    #[error("invalid parameter '{name}': {message}")]
    Validation { name: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML or JSON (de)serialization errors
    #[error("{format} error: {message}")]
    Serialization {
        format: &'static str,
        message: String,
    },

    /// External editor session errors
    #[error("editor session failed: {message}")]
    Editor { message: String },
}

fn location(path: &TreePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        format!(" at '{path}'")
    }
}

fn format_sink_failures(failures: &[SinkFailure], written: &usize) -> String {
    let listed = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "{} parameter write(s) failed ({written} written, not rolled back): {listed}",
        failures.len()
    )
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization {
            format: "JSON",
            message: error.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Serialization {
            format: "YAML",
            message: error.to_string(),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create an unknown stage error (path is filled in by the tree walk)
    #[must_use]
    pub fn unknown_stage(name: impl Into<String>) -> Self {
        Error::UnknownStage {
            name: name.into(),
            path: TreePath::root(),
        }
    }

    /// Create a key resolution error
    #[must_use]
    pub fn key_resolution(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::KeyResolution {
            stage: stage.into(),
            path: TreePath::root(),
            message: message.into(),
        }
    }

    /// Create a key service error
    #[must_use]
    pub fn key_service(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::KeyService {
            operation: operation.into(),
            path: TreePath::root(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a key service error with the underlying SDK error attached
    #[must_use]
    pub fn key_service_with_source(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::KeyService {
            operation: operation.into(),
            path: TreePath::root(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a parameter store error
    #[must_use]
    pub fn parameter_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ParameterStore {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a malformed tree error at a known path
    #[must_use]
    pub fn malformed(path: &TreePath, message: impl Into<String>) -> Self {
        Error::MalformedTree {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Create a parameter validation error
    #[must_use]
    pub fn validation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create an editor error
    #[must_use]
    pub fn editor(message: impl Into<String>) -> Self {
        Error::Editor {
            message: message.into(),
        }
    }

    /// Attach a tree path to an error raised below a tree walk.
    ///
    /// Errors that already carry a non-root path keep it: the innermost
    /// location is the most precise one.
    #[must_use]
    pub fn at_path(mut self, at: &TreePath) -> Self {
        match &mut self {
            Error::UnknownStage { path, .. }
            | Error::KeyResolution { path, .. }
            | Error::KeyService { path, .. }
            | Error::MalformedTree { path, .. } => {
                if path.is_root() {
                    *path = at.clone();
                }
            }
            _ => {}
        }
        self
    }

    /// The tree path carried by this error, if any
    #[must_use]
    pub fn path(&self) -> Option<&TreePath> {
        match self {
            Error::UnknownStage { path, .. }
            | Error::KeyResolution { path, .. }
            | Error::KeyService { path, .. }
            | Error::MalformedTree { path, .. } => Some(path),
            _ => None,
        }
    }
}

// Extension trait for attaching tree paths to Results
pub trait ResultExt<T> {
    /// Attach a tree path to the error, see [`Error::at_path`]
    fn at_path(self, path: &TreePath) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn at_path(self, path: &TreePath) -> Result<T> {
        self.map_err(|e| e.into().at_path(path))
    }
}
