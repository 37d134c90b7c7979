// Gateway module for projects - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod git;
mod paths;
mod store;
mod types;

// Public re-exports - the ONLY way to access project functionality
pub use store::ProjectStore;
pub use types::{CommitInfo, FileUpload, ProjectDetails, ProjectFile, ProjectMetadata};
