//! Configuration errors raised while validating and compiling a service.

use thiserror::Error;

/// Result type alias for validation and compilation.
pub type CompileResult<T> = Result<T, ConfigError>;

/// Every way a compilation run can fail.
///
/// All variants are deterministic functions of the input: retrying with the
/// same `batchgrid.toml` fails the same way, so the caller must fix the
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("provider configuration is missing required field '{0}'")]
    MissingProviderField(&'static str),

    #[error(
        "'provider.batch' does not contain '{0}' (network placement is required; make sure it's capitalized)"
    )]
    MissingNetworkField(&'static str),

    #[error("function at position {0} has an empty name")]
    EmptyFunctionName(usize),

    #[error("function '{0}' is defined more than once")]
    DuplicateFunction(String),

    #[error("function '{function}' has no handler and its batch annotation supplies no Command")]
    MissingHandler { function: String },

    #[error("invalid characters in environment variable '{key}' of function '{function}'")]
    InvalidEnvironmentKey { function: String, key: String },

    #[error("environment variable '{key}' of function '{function}' must contain a string or a reference")]
    InvalidEnvironmentValue { function: String, key: String },

    #[error("logical identifier '{id}' derived for {second} collides with {first}")]
    IdentifierCollision {
        id: String,
        first: String,
        second: String,
    },

    #[error("deployed name '{name}' of {second} collides with {first}")]
    PhysicalNameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("resource '{0}' was synthesized twice with different definitions")]
    ConflictingResource(String),

    #[error("template already defines resource '{0}' with a different definition")]
    ConflictingTemplateResource(String),

    #[error("template is not mergeable: {0}")]
    InvalidTemplate(String),
}
