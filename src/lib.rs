pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use error::{ActionError, ActionResponse, StoreError};
pub use handlers::AppState;
pub use models::*;
pub use store::EntityStore;
