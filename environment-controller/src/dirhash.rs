use std::path::Path;
use walkdir::WalkDir;

/// Deterministic content hash of a directory tree: every regular file's
/// path (relative to `dir`) and bytes feed an MD5 digest in sorted path
/// order, so the result depends only on content, not on filesystem
/// iteration order. Mirrors `checksumdir.dirhash(path, hashfunc='md5')`
/// from the original implementation closely enough that rebuilding the
/// same subtask source tree always yields the same `image_tag`.
pub fn dirhash(dir: &Path) -> anyhow::Result<String> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();

    let mut ctx = md5::Context::new();
    for path in paths {
        let rel = path.strip_prefix(dir).unwrap_or(&path);
        ctx.consume(rel.to_string_lossy().as_bytes());
        ctx.consume(std::fs::read(&path)?);
    }
    Ok(format!("{:x}", ctx.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn stable_across_repeated_builds() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("subtask.py"), b"print('hi')").unwrap();
        let first = dirhash(dir.path()).unwrap();
        let second = dirhash(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn changes_when_content_changes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("subtask.py"), b"print('hi')").unwrap();
        let before = dirhash(dir.path()).unwrap();
        fs::write(dir.path().join("subtask.py"), b"print('bye')").unwrap();
        let after = dirhash(dir.path()).unwrap();
        assert_ne!(before, after);
    }
}
