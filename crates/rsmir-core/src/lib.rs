#[macro_use]
pub mod macros;

pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ident;
pub mod mir;
pub mod pretty;
pub mod span;
pub mod thir;
pub mod types;

// Re-export commonly used items for convenience
pub use eyre;
pub use tracing;

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
