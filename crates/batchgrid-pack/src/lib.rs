//! batchgrid pack: write submit-job bundles and the job image build file.
//!
//! Only files are produced here; building and pushing the image is left to
//! the deployment tooling.

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use batchgrid_core::ArtifactRequest;

pub mod dockerfile;
pub mod handler;

pub use dockerfile::{render_dockerfile, write_build_context};

/// One written bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub function: String,
    pub output_path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Check that every request stays under the output directory, without
/// touching the filesystem.
pub fn check_requests(requests: &[ArtifactRequest]) -> Result<()> {
    for request in requests {
        relative(&request.artifact_dir)?;
        relative(&request.handler_file)?;
    }
    Ok(())
}

/// Write every requested bundle under `out_dir`. Nothing is written if any
/// request is rejected.
pub fn fulfil(requests: &[ArtifactRequest], out_dir: &Path) -> Result<Vec<ArtifactBundle>> {
    check_requests(requests)?;
    let bundles = requests
        .iter()
        .map(|request| write_bundle(request, out_dir))
        .collect::<Result<Vec<_>>>()?;
    info!(count = bundles.len(), out = %out_dir.display(), "submit-job bundles written");
    Ok(bundles)
}

fn write_bundle(request: &ArtifactRequest, out_dir: &Path) -> Result<ArtifactBundle> {
    let dir = out_dir.join(relative(&request.artifact_dir)?);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(relative(&request.handler_file)?);
    fs::write(&path, handler::SUBMIT_JOB_HANDLER)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let size_bytes = fs::metadata(&path)?.len();
    let sha256 = sha256_file(&path)?;
    debug!(function = %request.function, path = %path.display(), size_bytes, "bundle written");

    Ok(ArtifactBundle {
        function: request.function.clone(),
        output_path: path,
        size_bytes,
        sha256,
    })
}

/// Reject absolute paths and parent references so bundles stay under the
/// output directory.
fn relative(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    if path.is_empty()
        || candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("Artifact path must be relative and inside the output directory: {path:?}");
    }
    Ok(candidate)
}

/// Compute SHA-256 hash of a file and return the hex digest.
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let hash = Sha256::digest(&bytes);
    Ok(hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(function: &str) -> ArtifactRequest {
        ArtifactRequest {
            function: function.to_string(),
            artifact_dir: format!("artifacts/{function}"),
            handler_file: "schedule.js".to_string(),
            handler: "schedule.schedule".to_string(),
        }
    }

    #[test]
    fn test_fulfil_writes_one_bundle_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let bundles = fulfil(&[request("resize"), request("encode")], dir.path()).unwrap();

        assert_eq!(bundles.len(), 2);
        assert_eq!(
            bundles[0].output_path,
            dir.path().join("artifacts/resize/schedule.js")
        );
        let written = fs::read_to_string(&bundles[1].output_path).unwrap();
        assert_eq!(written, handler::SUBMIT_JOB_HANDLER);
        assert_eq!(bundles[1].size_bytes, handler::SUBMIT_JOB_HANDLER.len() as u64);
    }

    #[test]
    fn test_identical_bundles_share_digest() {
        let dir = tempfile::tempdir().unwrap();
        let bundles = fulfil(&[request("a"), request("b")], dir.path()).unwrap();
        assert_eq!(bundles[0].sha256, bundles[1].sha256);
        assert_eq!(bundles[0].sha256.len(), 64);
    }

    #[test]
    fn test_no_requests_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bundles = fulfil(&[], dir.path()).unwrap();
        assert!(bundles.is_empty());
        assert!(!dir.path().join("artifacts").exists());
    }

    #[test]
    fn test_escaping_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = request("x");
        bad.artifact_dir = "../outside".into();
        let err = fulfil(&[bad], dir.path()).unwrap_err().to_string();
        assert!(err.contains("must be relative"), "{err}");

        let mut bad = request("x");
        bad.handler_file = "/etc/passwd".into();
        assert!(fulfil(&[bad], dir.path()).is_err());

        // A bad request later in the list stops the earlier ones too.
        let mut bad = request("y");
        bad.artifact_dir = "/tmp/y".into();
        assert!(fulfil(&[request("ok"), bad], dir.path()).is_err());
        assert!(!dir.path().join("artifacts/ok").exists());
    }

    #[test]
    fn test_sha256_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
