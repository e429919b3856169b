//! Build file for the job container image.
//!
//! Two stages: the build image unpacks the service bundle, the runtime
//! image copies it under `/var/task/<service>/`. A few runtimes need their
//! entrypoint or environment adjusted so the job inherits the container's
//! memory instead of the function defaults.

use anyhow::{Context, Result};
use batchgrid_core::ServiceConfig;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Base image repository; `build-<runtime>` and `<runtime>` tags are used.
pub const BASE_IMAGE: &str = "lambci/lambda";

pub const DEFAULT_RUNTIME: &str = "nodejs10.x";

pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Bootstrap script of python3.6 images, written next to the build file.
pub const PYTHON_BOOTSTRAP_FILE: &str = "aws_environment.sh";

/// Exports the task role credentials so the SDK inside the runtime sees
/// them, then hands the job's command line to the runtime bootstrap.
pub const PYTHON_BOOTSTRAP: &str = r#"#!/bin/bash
set -euo pipefail

if [ -n "${AWS_CONTAINER_CREDENTIALS_RELATIVE_URI:-}" ]; then
  creds="$(curl -sf "http://169.254.170.2${AWS_CONTAINER_CREDENTIALS_RELATIVE_URI}")"
  field() {
    printf '%s' "$creds" | /var/lang/bin/python3.6 -c "import json, sys; print(json.load(sys.stdin)['$1'])"
  }
  export AWS_ACCESS_KEY_ID="$(field AccessKeyId)"
  export AWS_SECRET_ACCESS_KEY="$(field SecretAccessKey)"
  export AWS_SESSION_TOKEN="$(field Token)"
fi

exec /var/lang/bin/python3.6 /var/runtime/awslambda/bootstrap.py "$@"
"#;

/// A file the build file copies from its context directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextFile {
    /// Produced here and written next to the build file.
    Generated {
        name: &'static str,
        contents: &'static str,
    },
    /// Produced by the deployment tooling before the image is built.
    Supplied(String),
}

impl ContextFile {
    pub fn name(&self) -> &str {
        match self {
            ContextFile::Generated { name, .. } => name,
            ContextFile::Supplied(name) => name,
        }
    }
}

/// File name of the service bundle copied into the build stage.
pub fn bundle_name(service: &str) -> String {
    format!("{service}.zip")
}

fn runtime(config: &ServiceConfig) -> &str {
    config
        .provider
        .runtime
        .as_deref()
        .unwrap_or(DEFAULT_RUNTIME)
}

/// Everything the build file expects in its context directory.
pub fn context_files(config: &ServiceConfig) -> Vec<ContextFile> {
    let mut files = vec![ContextFile::Supplied(bundle_name(&config.service))];
    if runtime(config) == "python3.6" {
        files.push(ContextFile::Generated {
            name: PYTHON_BOOTSTRAP_FILE,
            contents: PYTHON_BOOTSTRAP,
        });
    }
    files
}

/// Write the build file and its generated context files into `dir`.
/// Returns the files the deployment tooling still has to place there.
pub fn write_build_context(config: &ServiceConfig, dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let dockerfile = dir.join(DOCKERFILE_NAME);
    fs::write(&dockerfile, render_dockerfile(config))
        .with_context(|| format!("Failed to write {}", dockerfile.display()))?;

    let mut supplied = Vec::new();
    for file in context_files(config) {
        match file {
            ContextFile::Generated { name, contents } => {
                let path = dir.join(name);
                fs::write(&path, contents)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                debug!(path = %path.display(), "build context file written");
            }
            ContextFile::Supplied(name) => supplied.push(name),
        }
    }
    info!(dir = %dir.display(), "build context written");
    Ok(supplied)
}

pub fn render_dockerfile(config: &ServiceConfig) -> String {
    let service = config.service.as_str();
    let runtime = runtime(config);
    let bundle = bundle_name(service);

    let mut out = String::new();
    out.push_str(&format!("FROM {BASE_IMAGE}:build-{runtime} AS builder\n"));
    out.push_str("USER root\n");
    for command in &config.custom.docker_run_commands {
        out.push_str(&format!("RUN {command}\n"));
    }
    out.push_str(&format!("COPY {bundle} /tmp\n"));
    out.push_str(&format!(
        "RUN cd /tmp && unzip -q {bundle} && rm {bundle}\n"
    ));
    if runtime == "python3.6" {
        out.push_str(
            "RUN pip install -U awscli boto3 botocore jmespath python-dateutil s3transfer \
             -t /tmp --no-cache-dir\n",
        );
        out.push_str(&format!(
            "COPY {PYTHON_BOOTSTRAP_FILE} /tmp/{PYTHON_BOOTSTRAP_FILE}\n"
        ));
        out.push_str(&format!("RUN chmod +x /tmp/{PYTHON_BOOTSTRAP_FILE}\n"));
    }

    out.push('\n');
    out.push_str(&format!("FROM {BASE_IMAGE}:{runtime}\n"));
    out.push_str(&format!("COPY --from=builder /tmp /var/task/{service}/\n"));
    out.push_str("RUN rm -rf /tmp/*\n");
    out.push_str(&format!("ENV PATH=${{PATH}}:/var/task/{service}/\n"));

    match runtime {
        "nodejs8.10" => out.push_str(
            "ENTRYPOINT [\"/var/lang/bin/node\", \"--expose-gc\", \"--max-semi-space-size=150\", \
             \"--max-old-space-size=30000\", \"/var/runtime/node_modules/awslambda/index.js\"]\n",
        ),
        "nodejs10.x" => out.push_str("ENV NODE_OPTIONS=\"--max-old-space-size=30000\"\n"),
        "python3.6" => {
            out.push_str(&format!(
                "ENV PYTHONPATH=/var/task/{service}:${{PYTHONPATH}}\n"
            ));
            out.push_str(&format!(
                "ENTRYPOINT [\"/bin/bash\", \"/var/task/{service}/{PYTHON_BOOTSTRAP_FILE}\"]\n"
            ));
        }
        _ => {}
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(runtime: Option<&str>, commands: &[&str]) -> ServiceConfig {
        let mut config = ServiceConfig::from_toml_str(
            r#"
service = "thumbs"

[provider]
region = "us-east-1"
stage = "dev"
"#,
        )
        .unwrap();
        config.provider.runtime = runtime.map(str::to_string);
        config.custom.docker_run_commands = commands.iter().map(|c| c.to_string()).collect();
        config
    }

    #[test]
    fn default_runtime_is_node10() {
        let text = render_dockerfile(&config(None, &[]));
        assert!(text.starts_with("FROM lambci/lambda:build-nodejs10.x AS builder\n"));
        assert!(text.contains("FROM lambci/lambda:nodejs10.x\n"));
        assert!(text.contains("COPY thumbs.zip /tmp\n"));
        assert!(text.contains("COPY --from=builder /tmp /var/task/thumbs/\n"));
        assert!(text.contains("NODE_OPTIONS"));
        assert!(!text.contains("ENTRYPOINT"));
    }

    #[test]
    fn extra_run_commands_go_in_the_build_stage() {
        let text = render_dockerfile(&config(Some("nodejs8.10"), &["yum install -y ImageMagick"]));
        let run = text.find("RUN yum install -y ImageMagick").unwrap();
        let runtime_stage = text.find("FROM lambci/lambda:nodejs8.10").unwrap();
        assert!(run < runtime_stage);
        assert!(text.contains("--max-old-space-size=30000"));
        assert!(text.contains("ENTRYPOINT [\"/var/lang/bin/node\""));
    }

    #[test]
    fn python_gets_bootstrap_entrypoint() {
        let text = render_dockerfile(&config(Some("python3.6"), &[]));
        assert!(text.contains("COPY aws_environment.sh /tmp/aws_environment.sh"));
        assert!(text.contains("ENV PYTHONPATH=/var/task/thumbs:${PYTHONPATH}"));
        assert!(text.contains("/var/task/thumbs/aws_environment.sh"));
    }

    /// Sources of every `COPY` that reads from the build context.
    fn copied_sources(text: &str) -> Vec<String> {
        text.lines()
            .filter_map(|line| line.strip_prefix("COPY "))
            .filter(|rest| !rest.starts_with("--from="))
            .filter_map(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn every_copied_file_is_in_the_context() {
        for runtime in ["nodejs8.10", "nodejs10.x", "python3.6", "go1.x"] {
            let config = config(Some(runtime), &[]);
            let names: Vec<_> = context_files(&config)
                .iter()
                .map(|f| f.name().to_string())
                .collect();
            for source in copied_sources(&render_dockerfile(&config)) {
                assert!(names.contains(&source), "{runtime}: {source} is not produced");
            }
        }
    }

    #[test]
    fn build_context_writes_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(Some("python3.6"), &[]);
        let supplied = write_build_context(&config, dir.path()).unwrap();

        assert_eq!(supplied, ["thumbs.zip"]);
        let text = fs::read_to_string(dir.path().join(DOCKERFILE_NAME)).unwrap();
        for source in copied_sources(&text) {
            if source != "thumbs.zip" {
                assert!(dir.path().join(&source).is_file(), "{source} missing");
            }
        }
        let script = fs::read_to_string(dir.path().join(PYTHON_BOOTSTRAP_FILE)).unwrap();
        assert!(script.starts_with("#!/bin/bash"));
    }

    #[test]
    fn node_context_needs_only_the_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let supplied = write_build_context(&config(None, &[]), dir.path()).unwrap();
        assert_eq!(supplied, ["thumbs.zip"]);
        assert!(!dir.path().join(PYTHON_BOOTSTRAP_FILE).exists());
    }

    #[test]
    fn unknown_runtime_has_no_adjustments() {
        let text = render_dockerfile(&config(Some("go1.x"), &[]));
        assert!(!text.contains("ENTRYPOINT"));
        assert!(!text.contains("NODE_OPTIONS"));
        assert!(text.contains("FROM lambci/lambda:go1.x"));
    }
}
