//! Local filesystem helpers shared by the source fetcher and image builder.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Scan a source tree: every regular file as a `(relative path, byte size)`
/// pair, sorted by relative path so the listing is deterministic.
pub fn walk_source_files(root: &Path) -> Result<Vec<(String, u64)>> {
    let mut files = Vec::new();
    walk_into(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_into(root: &Path, dir: &Path, files: &mut Vec<(String, u64)>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry in {}", dir.display()))?;
        let path = entry.path();
        let meta = entry
            .metadata()
            .with_context(|| format!("reading metadata of {}", path.display()))?;
        if meta.is_dir() {
            walk_into(root, &path, files)?;
        } else if meta.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            files.push((relative, meta.len()));
        }
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, creating `dst` first.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    let entries =
        fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let target = dst.join(entry.file_name());
        let path = entry.path();
        if entry
            .metadata()
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .is_dir()
        {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target)
                .with_context(|| format!("copying {} to {}", path.display(), target.display()))?;
        }
    }
    Ok(())
}
