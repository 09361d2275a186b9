use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("could not prepare directory for `{path}`: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("could not append to `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

/// Append-only sink for leads, unanswered questions and the mail outbox.
#[async_trait]
pub trait RecordAppender: Send + Sync {
    async fn append(&self, path: &Path, record: &str) -> Result<(), RecordError>;
}

/// Appends newline-terminated records to local files, creating parent directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileRecordAppender;

#[async_trait]
impl RecordAppender for FileRecordAppender {
    async fn append(&self, path: &Path, record: &str) -> Result<(), RecordError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RecordError::CreateDir { path: path.to_path_buf(), source })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| RecordError::Write { path: path.to_path_buf(), source })?;

        let mut line = record.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| RecordError::Write { path: path.to_path_buf(), source })?;
        file.flush().await.map_err(|source| RecordError::Write { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{FileRecordAppender, RecordAppender};

    #[tokio::test]
    async fn appends_lines_and_creates_parent_directories() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("data").join("leads.txt");

        FileRecordAppender.append(&path, "a@b.com | Ana | notas").await.expect("first append");
        FileRecordAppender.append(&path, "c@d.com | Name not provided | not provided\n").await.expect("second append");

        let contents = std::fs::read_to_string(&path).expect("file should exist");
        assert_eq!(
            contents,
            "a@b.com | Ana | notas\nc@d.com | Name not provided | not provided\n"
        );
    }
}
