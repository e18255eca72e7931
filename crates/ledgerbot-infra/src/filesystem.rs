//! Data directory layout and backup file I/O.

use std::path::{Path, PathBuf};

use ledgerbot_types::event::Document;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `LEDGERBOT_DATA_DIR` environment variable
/// 2. `~/.ledgerbot`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LEDGERBOT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".ledgerbot");
    }

    // Last resort: current directory
    PathBuf::from(".ledgerbot")
}

/// Where backups land when no output path is given: `{data_dir}/backups/`.
pub fn backup_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("backups")
}

/// Write a backup document, creating parent directories as needed.
///
/// `path` may be a directory, in which case the document's own file name is used.
pub async fn write_document(path: &Path, document: &Document) -> Result<PathBuf, std::io::Error> {
    let target = if tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.join(&document.file_name)
    } else {
        path.to_path_buf()
    };
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, &document.content).await?;
    Ok(target)
}

/// Write a backup document under `dir` using its own file name.
///
/// `dir` is created if missing, so a fresh data directory still ends up with
/// `backups/<file>` rather than a file called `backups`.
pub async fn write_document_in(dir: &Path, document: &Document) -> Result<PathBuf, std::io::Error> {
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(&document.file_name);
    tokio::fs::write(&target, &document.content).await?;
    Ok(target)
}

/// Read a file as an inbound document (e.g. a snapshot to restore).
pub async fn read_document(path: &Path) -> Result<Document, std::io::Error> {
    let content = tokio::fs::read_to_string(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document { file_name, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc() -> Document {
        Document {
            file_name: "ledger-backup-20240101-000000.json".to_string(),
            content: "{\"schema_version\":1}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_into_directory_uses_document_name() {
        let dir = tempdir().unwrap();
        let written = write_document(dir.path(), &doc()).await.unwrap();
        assert_eq!(written, dir.path().join("ledger-backup-20240101-000000.json"));

        let back = read_document(&written).await.unwrap();
        assert_eq!(back, doc());
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("deep").join("b.json");
        let written = write_document(&target, &doc()).await.unwrap();
        assert_eq!(written, target);
        assert_eq!(read_document(&target).await.unwrap().file_name, "b.json");
    }

    #[tokio::test]
    async fn test_default_backup_dir_created_and_backups_accumulate() {
        let data = tempdir().unwrap();
        let dir = backup_dir(data.path());

        let first = write_document_in(&dir, &doc()).await.unwrap();
        assert_eq!(first, dir.join("ledger-backup-20240101-000000.json"));
        assert!(tokio::fs::metadata(&dir).await.unwrap().is_dir());

        let later = Document {
            file_name: "ledger-backup-20240102-000000.json".to_string(),
            content: "{}".to_string(),
        };
        let second = write_document_in(&dir, &later).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(read_document(&first).await.unwrap(), doc());
        assert_eq!(read_document(&second).await.unwrap(), later);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_document(&dir.path().join("nope.json")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_backup_dir() {
        assert_eq!(backup_dir(Path::new("/data")), PathBuf::from("/data/backups"));
    }
}
