//! Writes build outputs below the output directory.
//!
//! Every filename is cleaned and checked to stay inside the output directory
//! before anything touches the disk. Files are written to temporary siblings
//! first and renamed once all of them succeeded; on failure the temporary
//! files are removed again.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use rolldown_common::Output;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Write chunks and assets into `dir`, replacing existing files.
pub fn write_outputs(outputs: &[Output], dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = normalize_dir(dir)?;
    fs::create_dir_all(&dir)?;

    let mut operations = Vec::with_capacity(outputs.len());
    for output in outputs {
        let (filename, content) = match output {
            Output::Chunk(chunk) => (chunk.filename.as_str(), chunk.code.as_bytes()),
            Output::Asset(asset) => (asset.filename.as_str(), asset.source.as_bytes()),
        };
        operations.push((validate_output_path(&dir, filename)?, content));
    }

    write_files_atomic(&operations)?;
    debug!(files = operations.len(), dir = %dir.display(), "wrote build outputs");
    Ok(operations.into_iter().map(|(path, _)| path).collect())
}

fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::InvalidOutputPath(format!("Failed to get current directory: {e}"))
    })?;
    Ok(cwd.join(cleaned).clean())
}

/// Resolve `filename` below `base_dir`, rejecting anything that escapes it.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }
    Ok(full_path)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut written: Vec<(PathBuf, &Path)> = Vec::with_capacity(operations.len());

    for (target, content) in operations {
        let temp = temp_path(target);
        let result = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&temp, content));
        if let Err(e) = result {
            cleanup(&written);
            return Err(e.into());
        }
        written.push((temp, target.as_path()));
    }

    for (temp, target) in &written {
        if let Err(e) = fs::rename(temp, target) {
            cleanup(&written);
            return Err(e.into());
        }
    }
    Ok(())
}

fn cleanup(written: &[(PathBuf, &Path)]) {
    for (temp, _) in written {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                warn!(path = %temp.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolldown_common::OutputAsset;
    use std::sync::Arc;

    fn asset(filename: &str, source: &str) -> Output {
        Output::Asset(Arc::new(OutputAsset {
            names: vec![],
            original_file_names: vec![],
            filename: filename.into(),
            source: source.to_string().into(),
        }))
    }

    #[test]
    fn nested_paths_stay_inside() {
        let base = Path::new("/tmp/output");
        assert_eq!(
            validate_output_path(base, "assets/./a.js").unwrap(),
            Path::new("/tmp/output/assets/a.js")
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let base = Path::new("/tmp/output");
        for filename in ["../etc/passwd", "assets/../../../etc/passwd"] {
            assert!(matches!(
                validate_output_path(base, filename),
                Err(Error::InvalidOutputPath(_))
            ));
        }
        assert!(validate_output_path(base, "a\0.js").is_err());
    }

    #[test]
    fn writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_outputs(
            &[
                asset("server/index.js", "export default 1;"),
                asset("islet-manifest.json", "{}"),
            ],
            dir.path(),
        )
        .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("server/index.js")).unwrap(),
            "export default 1;"
        );
        assert!(!dir.path().join("server/index.js.tmp").exists());
    }

    #[test]
    fn nothing_is_written_when_a_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_outputs(
            &[asset("ok.js", "1"), asset("../escape.js", "2")],
            dir.path(),
        );
        assert!(result.is_err());
        assert!(!dir.path().join("ok.js").exists());
    }
}
