//! Chains a lowering and a rendering toolchain over annotated artifacts.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use liftscan_toolchain_api::{Toolchain, ToolchainRegistry, ToolchainStage, Transform};
use liftscan_toolchains::{default_registry, ToolchainSettings};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Paths produced for one converted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Annotated source file.
    pub source: Utf8PathBuf,
    /// Intermediate representation written by the lowering stage.
    pub intermediate: Utf8PathBuf,
    /// Output of the rendering stage.
    pub rendering: Utf8PathBuf,
}

/// Counts for a batch conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Artifacts converted end to end.
    pub converted: Vec<Conversion>,
    /// Artifacts for which a stage failed.
    pub failed: usize,
}

/// Runs artifacts through the registered lowering and rendering toolchains.
#[derive(Debug)]
pub struct ConversionService {
    registry: ToolchainRegistry,
}

impl ConversionService {
    /// Use the toolchains of `registry`.
    #[must_use]
    pub const fn new(registry: ToolchainRegistry) -> Self {
        Self { registry }
    }

    /// Service over the process-backed charon and aeneas toolchains.
    #[must_use]
    pub fn from_settings(settings: &ToolchainSettings) -> Self {
        Self::new(default_registry(settings))
    }

    /// Lower `source` into `<output>/llbc` and render it into `<output>/coq`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolchainUnavailable`] when a stage has no toolchain
    /// and [`Error::Toolchain`] when either process fails.
    pub fn convert(&self, source: &Utf8Path, output: &Utf8Path) -> Result<Conversion> {
        let lowering = self.stage(ToolchainStage::Lowering)?;
        let rendering = self.stage(ToolchainStage::Rendering)?;

        let lowered = lowering
            .transform(source.as_std_path(), output.join("llbc").as_std_path())
            .map_err(|err| Error::Toolchain {
                tool: lowering.id().to_owned(),
                source: err,
            })?;
        log_output(lowering.id(), &lowered);
        let rendered = rendering
            .transform(&lowered.output, output.join("coq").as_std_path())
            .map_err(|err| Error::Toolchain {
                tool: rendering.id().to_owned(),
                source: err,
            })?;
        log_output(rendering.id(), &rendered);

        Ok(Conversion {
            source: source.to_owned(),
            intermediate: utf8(lowered.output)?,
            rendering: utf8(rendered.output)?,
        })
    }

    /// Convert every file under `artifacts`, logging and counting failures.
    ///
    /// # Errors
    ///
    /// Fails only when `artifacts` cannot be listed or a stage is missing.
    pub fn convert_dir(&self, artifacts: &Utf8Path, output: &Utf8Path) -> Result<ConversionSummary> {
        self.stage(ToolchainStage::Lowering)?;
        self.stage(ToolchainStage::Rendering)?;
        for toolchain in self.registry.summaries() {
            info!(
                id = %toolchain.id,
                label = %toolchain.label,
                stage = ?toolchain.stage,
                "toolchain registered"
            );
        }

        let mut files = Vec::new();
        collect_files(artifacts, &mut files)?;
        files.sort();

        let mut summary = ConversionSummary::default();
        for file in files {
            match self.convert(&file, output) {
                Ok(conversion) => summary.converted.push(conversion),
                Err(err) => {
                    warn!(path = %file, error = %err, "conversion failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            converted = summary.converted.len(),
            failed = summary.failed,
            "conversion finished"
        );
        Ok(summary)
    }

    fn stage(&self, stage: ToolchainStage) -> Result<Arc<dyn Toolchain>> {
        self.registry
            .for_stage(stage)
            .ok_or(Error::ToolchainUnavailable { stage })
    }
}

fn log_output(tool: &str, transform: &Transform) {
    let stdout = transform.stdout.trim();
    let stderr = transform.stderr.trim();
    if !stdout.is_empty() {
        debug!(tool, input = %transform.input.display(), output = stdout, "tool stdout");
    }
    if !stderr.is_empty() {
        debug!(tool, input = %transform.input.display(), output = stderr, "tool stderr");
    }
}

fn collect_files(dir: &Utf8Path, files: &mut Vec<Utf8PathBuf>) -> Result<()> {
    let entries = dir.read_dir_utf8().map_err(|source| Error::Io {
        path: dir.to_string(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_string(),
            source,
        })?;
        let path = entry.path().to_owned();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| Error::Io {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "path is not UTF-8"),
    })
}
