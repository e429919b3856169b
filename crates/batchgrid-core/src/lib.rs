pub mod config;
pub mod error;
pub mod function;
pub mod types;
pub mod validate;

pub use config::{ComputePoolOverrides, CustomConfig, ProviderConfig, ServiceConfig};
pub use error::{CompileResult, ConfigError};
pub use function::{
    ContainerOverrides, EnvironmentInput, FunctionSpec, JobAnnotation, JobKind, RetryStrategy,
    TimeoutPolicy,
};
pub use types::ArtifactRequest;
