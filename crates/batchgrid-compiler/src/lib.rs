pub mod compile;
pub mod compute;
pub mod env;
pub mod graph;
pub mod job_definition;
pub mod merge;
pub mod naming;
pub mod phase;
pub mod report;
pub mod roles;
pub mod shim;

pub use compile::{
    CompileOptions, CompileOutput, FunctionReport, Substitution, compile,
};
pub use graph::{ResourceDefinition, ResourceGraph};
pub use naming::{LogicalId, ResourceKind};
pub use phase::FunctionPhase;
