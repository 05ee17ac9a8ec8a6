// Stack composition modules
pub mod composition;
pub mod config;
pub mod error;
pub mod intrinsic;
pub mod resource;
pub mod template;

// Re-exports
pub use composition::compose;
pub use config::{
    Architecture, DownstreamWiring, HandlerCode, HandlerRuntime, StackConfig, StackConfigError,
};
pub use error::StackError;
pub use intrinsic::CfnValue;
pub use resource::{Resource, ResourceKind};
pub use template::{Output, Parameter, Template};
