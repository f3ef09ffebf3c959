use thiserror::Error;
use tokio_rusqlite::rusqlite;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("profile not found")]
    ProfileNotFound,

    #[error("profile already exists")]
    DuplicateProfile,
}

pub type Result<T> = std::result::Result<T, DbError>;
