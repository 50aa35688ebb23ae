pub mod auth;
pub mod cli;
pub mod error;
pub mod handler;
pub mod matrix;
pub mod progress;
pub mod server;
pub mod stats;
pub mod storage;
pub mod store;
pub mod suggestions;
pub mod types;

pub mod metadata {
    include!(concat!(env!("OUT_DIR"), "/pkg_info.rs"));
}

pub use error::{ServiceError, ServiceResult, StoreError, StoreResult};
pub use storage::Storage;
pub use store::{GoalStore, StoreOptions};
