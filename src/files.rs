//! Copying files into the BelegManager directory without overwriting
//!
//! A copy never replaces an existing file. Copying into a directory falls
//! back to a timestamp-suffixed name when the plain name is taken, and the
//! database backup uses the same no-overwrite primitive.

use crate::error::{Error, Result};
use crate::store::flat_timestamp;
use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tracing::{debug, trace, warn};

/// Infix of database backup file names
pub const BACKUP_INFIX: &str = "belegsyncbackup";

/// Copy `source` to `target`, failing with [`Error::TargetExists`] if the
/// target is already there. Permissions of the source are preserved.
pub async fn copy_file_if_target_absent(source: &Path, target: &Path) -> Result<()> {
    trace!(source = %source.display(), target = %target.display(), "Creating copy of file...");

    let mut source_file = fs::File::open(source).await?;
    let permissions = source_file.metadata().await?.permissions();

    let mut target_file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(target = %target.display(), "Target file already exists");
            return Err(Error::TargetExists(target.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let copied = async {
        tokio::io::copy(&mut source_file, &mut target_file).await?;
        fs::set_permissions(target, permissions).await?;
        target_file.sync_all().await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = copied {
        warn!(target = %target.display(), "Failed to copy file contents: {}", e);
        drop(target_file);
        if let Err(remove_err) = fs::remove_file(target).await {
            debug!("Failed to remove partial copy {}: {}", target.display(), remove_err);
        }
        return Err(e.into());
    }

    debug!(source = %source.display(), target = %target.display(), "File copied");
    Ok(())
}

/// Name used when `file_name` is already taken in the target directory
pub fn timestamped_file_name(file_name: &Path, timestamp: &str) -> String {
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.extension() {
        Some(ext) => format!("{}_{}.{}", stem, timestamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, timestamp),
    }
}

/// Copy a file into `directory`; returns the file name the copy got
pub async fn copy_into_directory(source: &Path, directory: &Path) -> Result<String> {
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::Other(format!("{} has no file name", source.display())))?;
    let plain_name = file_name.to_string_lossy().into_owned();

    match copy_file_if_target_absent(source, &directory.join(&plain_name)).await {
        Ok(()) => Ok(plain_name),
        Err(Error::TargetExists(existing)) => {
            let suffixed = timestamped_file_name(Path::new(file_name), &flat_timestamp(Local::now()));
            debug!(
                "File {} already exists, copying {} as {}",
                existing.display(),
                source.display(),
                suffixed
            );
            copy_file_if_target_absent(source, &directory.join(&suffixed)).await?;
            Ok(suffixed)
        }
        Err(e) => Err(e),
    }
}

/// Path of the backup copy for a database file at a given time
pub fn backup_path(store_file: &Path, timestamp: &str) -> PathBuf {
    let stem = store_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = store_file
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db4".to_string());
    store_file.with_file_name(format!("{stem}-{BACKUP_INFIX}-{timestamp}.{extension}"))
}

/// Back up the database file next to itself; never overwrites
pub async fn backup_store_file(store_file: &Path) -> Result<PathBuf> {
    let target = backup_path(store_file, &flat_timestamp(Local::now()));
    copy_file_if_target_absent(store_file, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_refuses_existing_target() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        let target = tmp.path().join("b.pdf");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&target, b"old").unwrap();

        let err = copy_file_if_target_absent(&source, &target).await.unwrap_err();
        assert!(matches!(err, Error::TargetExists(ref p) if p == &target));
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_copy_into_directory_renames_on_collision() {
        let tmp = TempDir::new().unwrap();
        let inbox = tmp.path().join("inbox");
        let data = tmp.path().join("data");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(&data).unwrap();

        let source = inbox.join("scan.pdf");
        std::fs::write(&source, b"scan").unwrap();

        let first = copy_into_directory(&source, &data).await.unwrap();
        assert_eq!(first, "scan.pdf");

        let second = copy_into_directory(&source, &data).await.unwrap();
        assert!(second.starts_with("scan_") && second.ends_with(".pdf"), "{second}");
        assert_eq!(second.len(), "scan_.pdf".len() + 14);
        assert_eq!(std::fs::read(data.join(&second)).unwrap(), b"scan");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.png");
        std::fs::write(&source, b"png").unwrap();
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o640)).unwrap();

        let target = tmp.path().join("copy.png");
        copy_file_if_target_absent(&source, &target).await.unwrap();
        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_timestamped_file_name() {
        assert_eq!(
            timestamped_file_name(Path::new("invoice.2024.pdf"), "20240101120000"),
            "invoice.2024_20240101120000.pdf"
        );
        assert_eq!(
            timestamped_file_name(Path::new("README"), "20240101120000"),
            "README_20240101120000"
        );
    }

    #[tokio::test]
    async fn test_backup_store_file() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("BelegManager.db4");
        std::fs::write(&store, b"sqlite").unwrap();

        assert_eq!(
            backup_path(&store, "20240102030405"),
            tmp.path()
                .join("BelegManager-belegsyncbackup-20240102030405.db4")
        );

        let backup = backup_store_file(&store).await.unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("BelegManager-belegsyncbackup-"));
        assert_eq!(std::fs::read(backup).unwrap(), b"sqlite");
    }
}
