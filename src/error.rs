use sea_orm::DbErr;

/// Coarse classification of an [`AccessControlError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Storage,
    Cancelled,
    Config,
}

#[derive(thiserror::Error, Debug)]
pub enum AccessControlError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccessControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessControlError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AccessControlError::NotFound(_) => ErrorKind::NotFound,
            AccessControlError::Storage(_) => ErrorKind::Storage,
            AccessControlError::Cancelled => ErrorKind::Cancelled,
            AccessControlError::Config(_) | AccessControlError::Io(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        AccessControlError::Storage(format!("{}: {}", context, err))
    }
}

// Storage detail is flattened into the message; callers only see the kind.
impl From<DbErr> for AccessControlError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(what) => AccessControlError::NotFound(what),
            DbErr::ConnectionAcquire(e) => {
                AccessControlError::Storage(format!("Database connection unavailable: {}", e))
            }
            DbErr::Conn(e) => AccessControlError::Storage(format!("Database connection error: {}", e)),
            DbErr::Exec(e) => AccessControlError::Storage(format!("Statement failed: {}", e)),
            DbErr::Query(e) => AccessControlError::Storage(format!("Query failed: {}", e)),
            other => AccessControlError::Storage(format!("Database error: {}", other)),
        }
    }
}

impl From<serde_json::Error> for AccessControlError {
    fn from(err: serde_json::Error) -> Self {
        AccessControlError::Config(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AccessControlError>;
