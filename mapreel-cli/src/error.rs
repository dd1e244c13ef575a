//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use mapreel::cache::StorageError;
use mapreel::config::ConfigError;
use mapreel::coord::CoordError;
use mapreel::item::CatalogError;
use mapreel::lod::ResolveError;
use mapreel::logging::LoggingError;
use mapreel::net::FetchError;
use mapreel::worker::WorkerError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded, parsed or saved.
    Config(String),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The Tokio runtime could not be created.
    Runtime(String),

    /// The item document could not be loaded.
    Catalog(CatalogError),

    /// No item has the requested title.
    UnknownItem(String),

    /// Media resolution failed.
    Resolve(ResolveError),

    /// Invalid coordinate or zoom.
    Coord(CoordError),

    /// Pool storage failed.
    Storage(StorageError),

    /// Worker install or activation failed.
    Worker(WorkerError),

    /// A request failed.
    Fetch(FetchError),

    /// Writing command output failed.
    Io { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(msg) => write!(f, "Failed to create Tokio runtime: {}", msg),
            CliError::Catalog(e) => write!(f, "{}", e),
            CliError::UnknownItem(title) => write!(f, "No item titled '{}'", title),
            CliError::Resolve(e) => write!(f, "Resolution failed: {}", e),
            CliError::Coord(e) => write!(f, "{}", e),
            CliError::Storage(e) => write!(f, "Cache storage error: {}", e),
            CliError::Worker(e) => write!(f, "Cache worker error: {}", e),
            CliError::Fetch(e) => write!(f, "Request failed: {}", e),
            CliError::Io { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            CliError::Resolve(e) => Some(e),
            CliError::Coord(e) => Some(e),
            CliError::Storage(e) => Some(e),
            CliError::Worker(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            CliError::Io { source, .. } => Some(source),
            CliError::Config(_) | CliError::Runtime(_) | CliError::UnknownItem(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<ResolveError> for CliError {
    fn from(e: ResolveError) -> Self {
        CliError::Resolve(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coord(e)
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Storage(e)
    }
}

impl From<WorkerError> for CliError {
    fn from(e: WorkerError) -> Self {
        CliError::Worker(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}
