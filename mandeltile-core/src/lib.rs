pub mod error;
pub mod escape;
pub mod view;

// Re-export primary types for convenience.
pub use error::CoreError;
pub use escape::escape_count;
pub use view::{Direction, ViewCommand, ViewState};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
