// Gateway module for utils - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod errors;
mod fallback;
mod logger;

// Public re-exports - the ONLY way to access utils functionality
pub use errors::{error_chain, ProjectError, ProviderError};
pub use fallback::or_else_try;
pub use logger::init_logger;
