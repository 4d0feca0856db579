pub mod error;
pub mod settings;
pub mod types;

// Re-export the error type for convenience
pub use error::{AppError, AppResult};
