// dbcourier/src/restore/archive.rs
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Extracts a backup archive that must contain exactly one SQL dump file.
///
/// Archives with no entries, more than one entry, directories, or nested
/// paths are rejected: the restore pipeline has no way to pick a dump file
/// out of an ambiguous archive.
///
/// Returns the path of the extracted dump file inside `extract_to_dir`.
pub fn extract_single_file_archive(archive_path: &Path, extract_to_dir: &Path) -> Result<PathBuf> {
    let archive_file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive file: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(archive_file)
        .with_context(|| format!("Failed to read zip archive: {}", archive_path.display()))?;

    if archive.is_empty() {
        return Err(anyhow::anyhow!(
            "No files found in the archive at {}",
            archive_path.display()
        ));
    }
    if archive.len() > 1 {
        return Err(anyhow::anyhow!(
            "Expected exactly one file in the archive at {}, found {} entries",
            archive_path.display(),
            archive.len()
        ));
    }

    let entry_name = {
        let entry = archive
            .by_index(0)
            .context("Failed to read the archive's only entry")?;
        if entry.is_dir() {
            return Err(anyhow::anyhow!(
                "The archive's only entry is a directory, not a dump file"
            ));
        }
        let name = entry
            .enclosed_name()
            .context("The archive entry has an unsafe path")?;
        if name.components().count() != 1 {
            return Err(anyhow::anyhow!(
                "The archive entry {} is nested inside a directory; expected a single top-level file",
                name.display()
            ));
        }
        name
    };

    archive.extract(extract_to_dir).with_context(|| {
        format!(
            "Failed to extract archive {} to {}",
            archive_path.display(),
            extract_to_dir.display()
        )
    })?;

    let dump_path = extract_to_dir.join(entry_name);
    println!("Extracted dump file to {}", dump_path.display());
    Ok(dump_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(name.to_string(), options)?;
            writer.write_all(content)?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_single_file_archive_extracts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("backup.zip");
        write_zip(&archive, &[("20240501_shop.sql", b"CREATE TABLE t (id INT);")])?;

        let extract_dir = tempfile::tempdir()?;
        let dump = extract_single_file_archive(&archive, extract_dir.path())?;

        assert_eq!(dump.file_name().unwrap(), "20240501_shop.sql");
        assert_eq!(
            std::fs::read_to_string(&dump)?,
            "CREATE TABLE t (id INT);"
        );
        Ok(())
    }

    #[test]
    fn test_empty_archive_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("empty.zip");
        write_zip(&archive, &[])?;

        let extract_dir = tempfile::tempdir()?;
        let err = extract_single_file_archive(&archive, extract_dir.path()).unwrap_err();
        assert!(err.to_string().contains("No files found"));
        Ok(())
    }

    #[test]
    fn test_multi_file_archive_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("two.zip");
        write_zip(&archive, &[("a.sql", b"a"), ("b.sql", b"b")])?;

        let extract_dir = tempfile::tempdir()?;
        let err = extract_single_file_archive(&archive, extract_dir.path()).unwrap_err();
        assert!(err.to_string().contains("exactly one file"));
        Ok(())
    }

    #[test]
    fn test_nested_entry_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("nested.zip");
        write_zip(&archive, &[("dumps/shop.sql", b"x")])?;

        let extract_dir = tempfile::tempdir()?;
        let err = extract_single_file_archive(&archive, extract_dir.path()).unwrap_err();
        assert!(err.to_string().contains("single top-level file"));
        Ok(())
    }

    #[test]
    fn test_extraction_dir_cleanup_removes_dump() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let archive = dir.path().join("backup.zip");
        write_zip(&archive, &[("shop.sql", b"SELECT 1;")])?;

        let extract_dir = tempfile::tempdir()?;
        let dump = extract_single_file_archive(&archive, extract_dir.path())?;
        assert!(dump.exists());

        let extract_path = extract_dir.path().to_path_buf();
        drop(extract_dir);
        assert!(!extract_path.exists());
        assert!(!dump.exists());
        Ok(())
    }
}
