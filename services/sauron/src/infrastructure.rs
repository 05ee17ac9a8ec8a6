// Infrastructure layer modules
pub mod logging;

// Re-exports
pub use logging::{init_cli_logging, init_logging};
