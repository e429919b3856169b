//! Shared types passed between the compiler and the packaging crate.

use serde::{Deserialize, Serialize};

/// A request for the packaging collaborator to produce the deployable
/// bundle of a substituted function.
///
/// One is emitted per annotated function. The bundle always carries the
/// same fixed "submit job" handler; only its location differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    /// Name of the function whose definition was replaced.
    pub function: String,
    /// Directory, relative to the output root, the bundle is written to.
    pub artifact_dir: String,
    /// File name of the handler source inside the bundle.
    pub handler_file: String,
    /// Handler reference (`<module>.<export>`) the replacement points at.
    pub handler: String,
}
