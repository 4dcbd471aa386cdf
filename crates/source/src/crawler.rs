use crate::error::SourceError;
use std::path::{Path, PathBuf};

/// Recursively collect files under `root` whose extension is `ext`.
///
/// Paths are returned in lexicographic order so duplicate detection and
/// diagnostics are reproducible run-to-run.
pub fn collect_files(root: impl AsRef<Path>, ext: &str) -> Result<Vec<PathBuf>, SourceError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(SourceError::MissingRoot(root.to_path_buf()));
    }
    let mut files = Vec::new();
    walk(root, ext, &mut files)?;
    files.sort();
    tracing::trace!(root = %root.display(), ext, count = files.len(), "collected sources");
    Ok(files)
}

fn walk(dir: &Path, ext: &str, files: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    let io = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() {
            walk(&path, ext, files)?;
        } else if path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    Ok(())
}

/// Read a source file, attaching the path to any IO error.
pub fn read_source(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_recursively_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("b/nested")).unwrap();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::write(root.join("b/nested/z.obj"), "").unwrap();
        std::fs::write(root.join("a/y.obj"), "").unwrap();
        std::fs::write(root.join("a/skip.npc"), "").unwrap();
        std::fs::write(root.join("x.obj"), "").unwrap();

        let files = collect_files(root, "obj").unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a/y.obj", "b/nested/z.obj", "x.obj"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = collect_files(tmp.path().join("nope"), "obj").unwrap_err();
        assert!(matches!(err, SourceError::MissingRoot(_)));
    }
}
