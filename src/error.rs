use rmcp::ErrorData as RpcError;
use std::fmt;

use thiserror::Error;
use tokio::io;

use crate::storage::StorageError;

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    FromString(String),
    #[error("{0}")]
    RpcError(#[from] RpcError),
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Suggestions(#[from] regex::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Target,
    Action,
    Step,
    Task,
    Obstacle,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::User => "user",
            EntityKind::Target => "target",
            EntityKind::Action => "action",
            EntityKind::Step => "step",
            EntityKind::Task => "task",
            EntityKind::Obstacle => "obstacle",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email already registered: {0}")]
    AuthConflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("credential error: {0}")]
    Credentials(String),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
