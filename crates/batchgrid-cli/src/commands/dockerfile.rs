use batchgrid_pack::dockerfile::{ContextFile, DOCKERFILE_NAME, context_files};
use std::path::Path;
use tracing::warn;

pub fn dockerfile(config: &str, out: Option<&str>) -> anyhow::Result<()> {
    let service = super::load(config)?;

    match out {
        Some(dir) => {
            let supplied = batchgrid_pack::write_build_context(&service, Path::new(dir))?;
            println!("✓ Wrote {}", Path::new(dir).join(DOCKERFILE_NAME).display());
            for name in supplied {
                println!("  place {name} in {dir} before building");
            }
        }
        None => {
            for file in context_files(&service) {
                if let ContextFile::Generated { name, .. } = file {
                    warn!(file = name, "build file needs a support file; use --out to write it");
                }
            }
            print!("{}", batchgrid_pack::render_dockerfile(&service));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, runtime: &str) -> String {
        let config = dir.join("batchgrid.toml");
        fs::write(
            &config,
            format!(
                r#"
service = "thumbs"

[provider]
region = "us-east-1"
stage = "dev"
runtime = "{runtime}"

[custom]
docker_run_commands = ["yum install -y ImageMagick"]
"#
            ),
        )
        .unwrap();
        config.display().to_string()
    }

    #[test]
    fn test_writes_build_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "nodejs8.10");
        let out = dir.path().join("image");

        dockerfile(&config, Some(&out.display().to_string())).unwrap();

        let text = fs::read_to_string(out.join(DOCKERFILE_NAME)).unwrap();
        assert!(text.contains("FROM lambci/lambda:build-nodejs8.10 AS builder"));
        assert!(text.contains("RUN yum install -y ImageMagick"));
    }

    #[test]
    fn test_python_build_context_has_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "python3.6");
        let out = dir.path().join("image");

        dockerfile(&config, Some(&out.display().to_string())).unwrap();

        let text = fs::read_to_string(out.join(DOCKERFILE_NAME)).unwrap();
        assert!(text.contains("COPY aws_environment.sh /tmp/aws_environment.sh"));
        assert!(out.join("aws_environment.sh").is_file());
    }
}
