use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Image axis that exceeded a configured size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// Main error type for mapframe operations.
///
/// The `Display` text of every variant is meant to be shown to a player as a
/// single chat line.
#[derive(Error, Diagnostic, Debug)]
pub enum MapError {
    #[error("Could not download the image: {message}")]
    #[diagnostic(code(mapframe::fetch))]
    NetworkFetch { url: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(mapframe::source))]
    UnsupportedSource {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("The given URL is not a valid image")]
    #[diagnostic(code(mapframe::decode))]
    InvalidImage { url: String },

    #[error("{}", size_limit_message(.axis))]
    #[diagnostic(code(mapframe::size_limit))]
    SizeLimit { axis: Axis, limit: u32, actual: u32 },

    #[error(
        "A poster can be at most {max} × {max} maps, got {columns} × {rows}.",
        max = crate::types::MAX_POSTER_SIDE
    )]
    #[diagnostic(code(mapframe::poster_size))]
    PosterTooLarge { columns: u32, rows: u32 },

    #[error("You have too many maps (maximum: {limit}).")]
    #[diagnostic(code(mapframe::quota::owner))]
    OwnerQuota { limit: u32 },

    #[error("The server map limit has been reached (maximum: {limit}).")]
    #[diagnostic(code(mapframe::quota::global))]
    GlobalQuota { limit: u32 },

    #[error("Could not save map data to {path}: {message}")]
    #[diagnostic(code(mapframe::persist))]
    Persistence { path: PathBuf, message: String },

    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(mapframe::io))]
    Io { path: PathBuf, message: String },

    #[error("Parse error: {message}")]
    #[diagnostic(code(mapframe::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(mapframe::not_found))]
    NotFound { message: String },

    #[error("Invalid map data: {message}")]
    #[diagnostic(code(mapframe::invalid))]
    InvalidMap { message: String },

    #[error("The image renderer failed unexpectedly")]
    #[diagnostic(code(mapframe::worker))]
    WorkerFailed,

    #[error("The server is shutting down")]
    #[diagnostic(code(mapframe::main_thread))]
    MainThreadGone,
}

fn size_limit_message(axis: &Axis) -> &'static str {
    match axis {
        Axis::Width => "The image is too wide!",
        Axis::Height => "The image is too tall!",
    }
}

impl MapError {
    /// Whether this failure was caused by one of the quota limits.
    pub fn is_quota(&self) -> bool {
        matches!(self, MapError::OwnerQuota { .. } | MapError::GlobalQuota { .. })
    }
}

pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_messages() {
        let wide = MapError::SizeLimit {
            axis: Axis::Width,
            limit: 256,
            actual: 300,
        };
        let tall = MapError::SizeLimit {
            axis: Axis::Height,
            limit: 256,
            actual: 300,
        };
        assert_eq!(wide.to_string(), "The image is too wide!");
        assert_eq!(tall.to_string(), "The image is too tall!");
    }

    #[test]
    fn test_quota_messages_name_the_limit() {
        let owner = MapError::OwnerQuota { limit: 5 };
        let global = MapError::GlobalQuota { limit: 100 };
        assert!(owner.to_string().contains("5"));
        assert!(global.to_string().contains("server"));
        assert!(owner.is_quota());
        assert!(global.is_quota());
        assert!(!MapError::WorkerFailed.is_quota());
    }
}
