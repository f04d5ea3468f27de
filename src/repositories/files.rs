use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;

/// Replaces `path` with whatever `write` produces. The data goes to a
/// sibling temp file first, so readers see either the old or the new file.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), anyhow::Error>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), anyhow::Error>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let file = File::create(temp_path)
        .with_context(|| format!("Failed to create {}", temp_path.display()))?;
    let mut writer = BufWriter::new(file);

    let result = write(&mut writer)
        .and_then(|_| writer.flush().context("Failed to flush data"))
        .and_then(|_| writer.get_ref().sync_all().context("Failed to sync data"));

    drop(writer);

    if let Err(e) = result {
        let _ = fs::remove_file(temp_path);
        return Err(e);
    }

    fs::rename(temp_path, path).map_err(|e| {
        let _ = fs::remove_file(temp_path);
        anyhow::Error::new(e).context(format!("Failed to replace {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_parent_directories_and_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.txt");

        write_atomic(&path, |w| Ok(w.write_all(b"first")?)).unwrap();
        write_atomic(&path, |w| Ok(w.write_all(b"second")?)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("nested").join("file.txt.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_original_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "original").unwrap();

        let result = write_atomic(&path, |_| Err(anyhow::anyhow!("boom")));

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert!(!dir.path().join("file.txt.tmp").exists());
    }
}
