//! Version-control sources: shallow clone, external build, artifact lookup.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use bytes::Bytes;
use globset::Glob;
use keg_resource::{BuildRecipe, PackageSpec};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::artifact::Artifact;
use crate::error::{BuildError, FetchError, Result};

const GIT: &str = "git";

/// Every declared build-stage dependency, plus `git`, must be on `PATH`.
pub fn check_build_tools(spec: &PackageSpec) -> Result<()> {
    let tools = spec
        .build_dependencies()
        .map(|dep| dep.name.as_str())
        .chain(std::iter::once(GIT));

    for tool in tools {
        match which::which(tool) {
            Ok(path) => tracing::debug!(tool, path = %path.display(), "build tool found"),
            Err(_) => {
                return Err(BuildError::ToolNotFound {
                    name: tool.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

pub(crate) async fn clone(repository: &str, reference: &str, checkout: &Path) -> Result<()> {
    tracing::info!(repository, reference, "cloning");
    let mut command = Command::new(GIT);
    command
        .args(["clone", "--quiet", "--depth", "1", "--branch", reference, repository])
        .arg(checkout);
    run(GIT, command).await?;
    keg_fs::remove_dir_if_exists(checkout.join(".git"))?;
    Ok(())
}

pub(crate) async fn run_build(recipe: &BuildRecipe, checkout: &Path) -> Result<()> {
    tracing::info!(program = %recipe.program, args = ?recipe.args, "building");
    let mut command = Command::new(&recipe.program);
    command.args(&recipe.args).current_dir(checkout);
    run(&recipe.program, command).await
}

/// Spawn `command` with captured output; a non-zero exit is a [`BuildError::Failed`].
async fn run(program: &str, mut command: Command) -> Result<()> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| BuildError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }
    Err(BuildError::Failed {
        program: program.to_string(),
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
    .into())
}

/// Pick the build output named by the recipe, or hand back the whole checkout.
pub(crate) fn locate_artifact(recipe: &BuildRecipe, checkout: &Path) -> Result<Artifact> {
    let Some(pattern) = &recipe.artifact else {
        return Ok(Artifact::Tree {
            path: checkout.to_path_buf(),
        });
    };

    let matcher = Glob::new(pattern)
        .map_err(|source| BuildError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?
        .compile_matcher();

    let mut candidates: Vec<PathBuf> = WalkDir::new(checkout)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(checkout).ok()?.to_path_buf();
            matcher.is_match(&relative).then_some(relative)
        })
        .collect();
    candidates.sort();

    let Some(found) = candidates.into_iter().next() else {
        return Err(BuildError::ArtifactNotFound {
            pattern: pattern.clone(),
            dir: checkout.to_path_buf(),
        }
        .into());
    };

    let path = checkout.join(&found);
    tracing::debug!(artifact = %path.display(), "build artifact located");
    let bytes = std::fs::read(&path).map_err(|source| FetchError::Read { path, source })?;
    Ok(Artifact::Archive {
        bytes: Bytes::from(bytes),
        strip_components: recipe.strip_components,
    })
}
