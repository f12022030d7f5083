use std::path::PathBuf;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate postId \"{post_id}\" ({first} and {second})")]
    DuplicatePostId {
        post_id: String,
        first: String,
        second: String,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Firebase(#[from] firebase_client::FirebaseError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl MigrateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }
}
