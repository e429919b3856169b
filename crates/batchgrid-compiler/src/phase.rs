//! Per-function compilation phases.
//!
//! ```text
//! Unannotated                                   (no action)
//! Annotated → Validated → RoleGenerated → JobDefinitionGenerated → ShimSubstituted
//!     any step ──────────────────────────────────────────────────→ Failed
//! ```
//!
//! `Failed` aborts the whole run; nothing from the run is merged.

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionPhase {
    Unannotated,
    Annotated,
    Validated,
    RoleGenerated,
    JobDefinitionGenerated,
    ShimSubstituted,
    Failed,
}

impl FunctionPhase {
    /// The phase that follows on success, if any.
    pub fn next(self) -> Option<FunctionPhase> {
        match self {
            FunctionPhase::Annotated => Some(FunctionPhase::Validated),
            FunctionPhase::Validated => Some(FunctionPhase::RoleGenerated),
            FunctionPhase::RoleGenerated => Some(FunctionPhase::JobDefinitionGenerated),
            FunctionPhase::JobDefinitionGenerated => Some(FunctionPhase::ShimSubstituted),
            FunctionPhase::Unannotated
            | FunctionPhase::ShimSubstituted
            | FunctionPhase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn label(self) -> &'static str {
        match self {
            FunctionPhase::Unannotated => "unannotated",
            FunctionPhase::Annotated => "annotated",
            FunctionPhase::Validated => "validated",
            FunctionPhase::RoleGenerated => "role generated",
            FunctionPhase::JobDefinitionGenerated => "job definition generated",
            FunctionPhase::ShimSubstituted => "shim substituted",
            FunctionPhase::Failed => "failed",
        }
    }
}

/// Tracks one function through its phases.
#[derive(Debug)]
pub struct PhaseTracker<'a> {
    function: &'a str,
    phase: FunctionPhase,
}

impl<'a> PhaseTracker<'a> {
    pub fn annotated(function: &'a str) -> Self {
        debug!(function, "function is batch-annotated");
        Self {
            function,
            phase: FunctionPhase::Annotated,
        }
    }

    pub fn phase(&self) -> FunctionPhase {
        self.phase
    }

    /// Move to the next phase. Terminal phases stay put.
    pub fn advance(&mut self) -> FunctionPhase {
        if let Some(next) = self.phase.next() {
            debug!(function = self.function, phase = next.label(), "phase advanced");
            self.phase = next;
        }
        self.phase
    }

    pub fn fail(&mut self) {
        warn!(
            function = self.function,
            phase = self.phase.label(),
            "function compilation failed"
        );
        self.phase = FunctionPhase::Failed;
    }
}
