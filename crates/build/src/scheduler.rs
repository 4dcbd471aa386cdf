//! Modification-time staleness checks.

use crate::error::BuildError;
use contentpack_source::collect_files;
use std::path::Path;
use std::time::SystemTime;

fn modified(path: &Path) -> Result<SystemTime, BuildError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(BuildError::io(path))
}

/// Whether `output` must be rebuilt.
///
/// True when `output` is missing, or when any `*.<ext>` file under
/// `source_root` or the `implementation` file is strictly newer than it.
/// A missing source root contributes no files.
pub fn should_build(
    source_root: &Path,
    ext: &str,
    output: &Path,
    implementation: Option<&Path>,
) -> Result<bool, BuildError> {
    if !output.exists() {
        return Ok(true);
    }
    let built = modified(output)?;

    if let Some(implementation) = implementation.filter(|p| p.exists())
        && modified(implementation)? > built
    {
        tracing::debug!(output = %output.display(), "implementation changed");
        return Ok(true);
    }

    if !source_root.is_dir() {
        return Ok(false);
    }
    for file in collect_files(source_root, ext)? {
        if modified(&file)? > built {
            tracing::debug!(source = %file.display(), output = %output.display(), "source changed");
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(path: &Path, time: SystemTime) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        if !path.exists() {
            std::fs::write(path, b"").unwrap();
        }
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn base() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn missing_output_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        assert!(should_build(dir.path(), "obj", &dir.path().join("obj.dat"), None).unwrap());
    }

    #[test]
    fn equal_mtime_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("obj.dat");
        touch(&src.join("items.obj"), base());
        touch(&out, base());
        assert!(!should_build(&src, "obj", &out, None).unwrap());
    }

    #[test]
    fn newer_nested_source_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("obj.dat");
        touch(&out, base());
        touch(&src.join("a").join("b").join("items.obj"), base() + Duration::from_secs(1));
        assert!(should_build(&src, "obj", &out, None).unwrap());
        // other extensions are ignored
        assert!(!should_build(&src, "npc", &out, None).unwrap());
    }

    #[test]
    fn newer_implementation_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("obj.dat");
        let exe = dir.path().join("contentpack");
        touch(&out, base());
        touch(&exe, base() + Duration::from_secs(60));
        assert!(should_build(&dir.path().join("missing"), "obj", &out, Some(&exe)).unwrap());
        touch(&exe, base());
        assert!(!should_build(&dir.path().join("missing"), "obj", &out, Some(&exe)).unwrap());
    }
}
