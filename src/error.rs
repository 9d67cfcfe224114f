//! Error types for hubcache
//!
//! All modules use `HubResult<T>` as their return type. Storage backends
//! report failures as [`StorageError`], whose [`StorageErrorKind`] decides
//! whether the cache protocol retries or aborts.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hubcache operations
pub type HubResult<T> = Result<T, HubError>;

/// Classification of a storage backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// Path (or a parent of it) does not exist
    NotFound,
    /// Destination already exists
    AlreadyExists,
    /// Caller lacks permission
    PermissionDenied,
    /// Backend rejected the caller's credentials
    Unauthenticated,
    /// Out of space, quota or another backend resource
    ResourceExhausted,
    /// Backend failed internally
    Internal,
    /// Malformed path or argument
    InvalidArgument,
    /// Operation not supported by this backend
    Unimplemented,
    /// Anything else; assumed to be temporary
    Unavailable,
}

impl StorageErrorKind {
    /// Whether this failure will not go away by retrying
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::PermissionDenied
                | Self::Unauthenticated
                | Self::ResourceExhausted
                | Self::Internal
                | Self::InvalidArgument
                | Self::Unimplemented
        )
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::PermissionDenied => "permission denied",
            Self::Unauthenticated => "unauthenticated",
            Self::ResourceExhausted => "resource exhausted",
            Self::Internal => "internal error",
            Self::InvalidArgument => "invalid argument",
            Self::Unimplemented => "unimplemented",
            Self::Unavailable => "unavailable",
        };
        write!(f, "{}", name)
    }
}

/// A failed storage operation on a path
#[derive(Error, Debug)]
#[error("{op} {path}: {kind}: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub op: &'static str,
    pub path: PathBuf,
    pub message: String,
}

impl StorageError {
    pub fn new(
        kind: StorageErrorKind,
        op: &'static str,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            op,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::NotFound, op, path, "no such file or directory")
    }

    pub fn already_exists(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::AlreadyExists, op, path, "destination exists")
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == StorageErrorKind::AlreadyExists
    }

    pub fn is_permanent(&self) -> bool {
        self.kind.is_permanent()
    }
}

/// All errors that can occur in hubcache
#[derive(Error, Debug)]
pub enum HubError {
    // Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lock file name {0} has to end with .lock")]
    InvalidLockPath(PathBuf),

    // Artifact errors
    #[error("{handle} does not appear to be a valid module: {reason}")]
    InvalidArtifact { handle: String, reason: String },

    #[error("{0} does not exist")]
    HandleNotFound(String),

    #[error("No resolver supports handle: {0}")]
    UnsupportedHandle(String),

    #[error("Download of {handle} failed: {reason}")]
    Download { handle: String, reason: String },

    #[error("HTTP request for {url} failed: {reason}")]
    Http { url: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No cache directory configured")]
    NoCacheDir,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl HubError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid artifact error
    pub fn invalid_artifact(handle: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidArtifact {
            handle: handle.into(),
            reason: reason.to_string(),
        }
    }

    /// Storage failure kind, if this error came from a backend
    pub fn storage_kind(&self) -> Option<StorageErrorKind> {
        match self {
            Self::Storage(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Check if error is retryable by running the same command again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => !e.is_permanent(),
            Self::Http { .. } | Self::Download { .. } => true,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoCacheDir => Some("Set HUBCACHE_CACHE_DIR or pass --cache-dir"),
            Self::Storage(e) if e.kind == StorageErrorKind::PermissionDenied => {
                Some("Check permissions on the cache directory")
            }
            Self::Storage(e) if e.kind == StorageErrorKind::ResourceExhausted => {
                Some("Free disk space or run: hubcache cache clear")
            }
            Self::Http { .. } => Some("Set HUBCACHE_DISABLE_CERT_VALIDATION=true only for trusted hosts"),
            _ => None,
        }
    }
}
