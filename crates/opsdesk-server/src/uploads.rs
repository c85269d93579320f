//! Attachment storage under the upload root.
//!
//! The policy half of the decision (type, size) lives in opsdesk-core; this
//! module owns the filesystem: directory creation, name generation, the
//! write itself, and the quiet removal used after a replacement. A rejected
//! upload never touches disk.

use std::path::PathBuf;

use chrono::Utc;
use rand::Rng;

use opsdesk_core::{OpsError, Result, UploadPolicy};

/// One file lifted out of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// The client-supplied name. Empty means "no file supplied", which is
    /// an omitted optional field, not an error.
    pub original_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn is_empty(&self) -> bool {
        self.original_name.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Validate and persist one upload. `Ok(None)` when no file was supplied;
    /// `Ok(Some(path))` is the stored path relative to the upload root,
    /// `<subdir>/<prefix>_<unix-ts>_<16-hex>.<ext>`.
    pub async fn store(
        &self,
        file: &UploadedFile,
        policy: &UploadPolicy,
        subdir: &str,
        prefix: &str,
    ) -> Result<Option<String>> {
        if file.is_empty() {
            return Ok(None);
        }
        let extension = policy
            .validate(&file.original_name, file.bytes.len() as u64)
            .map_err(OpsError::ValidationFailed)?;

        let dir = self.root.join(subdir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| write_err("creating upload directory", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| write_err("setting upload directory mode", e))?;
        }

        let suffix: u64 = rand::thread_rng().gen();
        let filename = format!(
            "{prefix}_{}_{suffix:016x}.{extension}",
            Utc::now().timestamp()
        );
        tokio::fs::write(dir.join(&filename), &file.bytes)
            .await
            .map_err(|e| write_err("writing uploaded file", e))?;
        Ok(Some(format!("{subdir}/{filename}")))
    }

    /// Remove a previously stored file. Used only after the replacement has
    /// been stored and the record updated, so a failure here orphans a file
    /// at worst — logged, never surfaced.
    pub async fn remove_quiet(&self, relative_path: &str) {
        let path = self.root.join(relative_path);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove replaced attachment");
        }
    }
}

fn write_err(context: &str, err: std::io::Error) -> OpsError {
    OpsError::storage(
        "The uploaded file could not be stored.",
        Some(format!("{context}: {err}")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: u64 = 3 * 1024 * 1024;

    fn store_in(dir: &tempfile::TempDir) -> AttachmentStore {
        AttachmentStore::new(dir.path().to_path_buf())
    }

    fn pdf(bytes: usize) -> UploadedFile {
        UploadedFile {
            original_name: "scan.pdf".to_string(),
            bytes: vec![0u8; bytes],
        }
    }

    #[tokio::test]
    async fn stores_under_subdir_with_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let stored = store_in(&dir)
            .store(&pdf(1024), &UploadPolicy::attachment(CAP), "calls_attachments", "call")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.starts_with("calls_attachments/call_"));
        assert!(stored.ends_with(".pdf"));
        let on_disk = dir.path().join(&stored);
        assert_eq!(std::fs::metadata(on_disk).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn no_file_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile {
            original_name: String::new(),
            bytes: Vec::new(),
        };
        let stored = store_in(&dir)
            .store(&file, &UploadPolicy::attachment(CAP), "calls_attachments", "call")
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn rejected_extension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile {
            original_name: "malware.exe".to_string(),
            bytes: vec![0u8; 10],
        };
        let err = store_in(&dir)
            .store(&file, &UploadPolicy::attachment(CAP), "calls_attachments", "call")
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::ValidationFailed(_)));
        // The subdirectory is never even created.
        assert!(!dir.path().join("calls_attachments").exists());
    }

    #[tokio::test]
    async fn size_cap_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let policy = UploadPolicy::attachment(1024);
        assert!(store
            .store(&pdf(1024), &policy, "calls_attachments", "call")
            .await
            .unwrap()
            .is_some());
        let err = store
            .store(&pdf(1025), &policy, "calls_attachments", "call")
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn remove_quiet_deletes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let stored = store
            .store(&pdf(16), &UploadPolicy::attachment(CAP), "calls_attachments", "call")
            .await
            .unwrap()
            .unwrap();
        store.remove_quiet(&stored).await;
        assert!(!dir.path().join(&stored).exists());
        // Second removal logs and moves on.
        store.remove_quiet(&stored).await;
    }
}
