// Domain layer modules
pub mod echo_message;
pub mod status;

// Re-exports
pub use echo_message::{EchoRequest, EchoResponse};
pub use status::{status_for_body, ERROR_TRIGGER_BODY, STATUS_NOT_FOUND, STATUS_OK};
