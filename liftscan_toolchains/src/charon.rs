use std::ffi::OsString;
use std::path::Path;

use liftscan_toolchain_api::{
    Toolchain, ToolchainError, ToolchainResult, ToolchainStage, Transform,
};

use crate::ProcessRunner;

/// Lowers a Rust source file to charon's `.llbc` intermediate representation.
///
/// Invoked as `charon --hide-marker-traits --input <file> --dest-file <out>.llbc`.
#[derive(Debug, Clone)]
pub struct CharonToolchain {
    runner: ProcessRunner,
}

impl CharonToolchain {
    /// Construct the toolchain around a configured runner.
    #[must_use]
    pub const fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }
}

impl Toolchain for CharonToolchain {
    fn id(&self) -> &'static str {
        "charon"
    }

    fn label(&self) -> &'static str {
        "Charon (Rust to LLBC)"
    }

    fn stage(&self) -> ToolchainStage {
        ToolchainStage::Lowering
    }

    fn transform(&self, input: &Path, output_dir: &Path) -> ToolchainResult<Transform> {
        let file_name = input
            .file_name()
            .ok_or_else(|| ToolchainError::message(format!("{} has no file name", input.display())))?;
        std::fs::create_dir_all(output_dir).map_err(|err| {
            ToolchainError::message(format!("failed to create {}: {err}", output_dir.display()))
        })?;

        let mut dest_name = OsString::from(file_name);
        dest_name.push(".llbc");
        let output = output_dir.join(dest_name);

        let result = self.runner.run(
            self.id(),
            [
                OsString::from("--hide-marker-traits"),
                OsString::from("--input"),
                input.as_os_str().to_os_string(),
                OsString::from("--dest-file"),
                output.as_os_str().to_os_string(),
            ],
        )?;

        Ok(Transform {
            input: input.to_path_buf(),
            output,
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn passes_input_and_destination_flags() {
        let dir = TempDir::new().expect("tempdir");
        let capture = dir.path().join("args.txt");
        let script = dir.path().join("charon.sh");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" > \"{}\"\necho \"warning: unused import\" >&2\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"--dest-file\" ]; then touch \"$2\"; fi\n  shift\ndone\n",
                capture.display()
            ),
        )
        .expect("write script");
        let mut perms = fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).expect("set perms");

        let input = dir.path().join("pre_abc__src_lib.rs");
        fs::write(&input, "fn main() {}\n").expect("write input");
        let out_dir = dir.path().join("llbc");

        let toolchain = CharonToolchain::new(ProcessRunner::new(&script, Duration::from_secs(5)));
        let transform = toolchain.transform(&input, &out_dir).expect("transform");

        assert_eq!(transform.output, out_dir.join("pre_abc__src_lib.rs.llbc"));
        assert!(transform.output.exists());
        let args = fs::read_to_string(&capture).expect("captured args");
        assert!(args.starts_with("--hide-marker-traits --input "));
        assert!(args.contains("--dest-file"));
        assert_eq!(transform.stderr.trim(), "warning: unused import");
    }
}
