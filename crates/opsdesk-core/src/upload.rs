//! Attachment acceptance rules.
//!
//! The decision half of the upload pipeline: what is allowed, how large it
//! may be, and the exact complaints handed back to the form. Writing the
//! accepted bytes to disk is the server's `AttachmentStore`, which consults
//! this policy before touching the filesystem, so a rejected upload never
//! produces a partial file.

use std::path::Path;

/// Extensions accepted for every attachment field, compared case-insensitively.
pub const ALLOWED_ATTACHMENT_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

/// Size and type limits for one attachment field.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub allowed_extensions: &'static [&'static str],
    pub max_bytes: u64,
}

impl UploadPolicy {
    /// Standard attachment policy with a per-module size cap.
    pub fn attachment(max_bytes: u64) -> Self {
        Self {
            allowed_extensions: &ALLOWED_ATTACHMENT_EXTENSIONS,
            max_bytes,
        }
    }

    /// Check a candidate file against the policy. Returns the lowercased
    /// extension on acceptance, otherwise every violated rule as its own
    /// message so the form can show all of them at once.
    pub fn validate(
        &self,
        original_name: &str,
        size_bytes: u64,
    ) -> std::result::Result<String, Vec<String>> {
        let mut errors = Vec::new();

        if size_bytes > self.max_bytes {
            errors.push(format!(
                "The file exceeds the {} limit.",
                human_size(self.max_bytes)
            ));
        }

        let extension = match file_extension(original_name) {
            Some(ext) if self.allowed_extensions.contains(&ext.as_str()) => Some(ext),
            Some(ext) => {
                errors.push(format!(
                    "File type .{ext} is not allowed (allowed: {}).",
                    self.allowed_extensions.join(", ")
                ));
                None
            }
            None => {
                errors.push("The file name has no extension.".to_string());
                None
            }
        };

        match (extension, errors.is_empty()) {
            (Some(ext), true) => Ok(ext),
            _ => Err(errors),
        }
    }
}

/// Lowercased extension of a file name, `None` when there is none.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn human_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: u64 = 3 * 1024 * 1024;

    #[test]
    fn whitelist_is_case_insensitive() {
        let policy = UploadPolicy::attachment(CAP);
        assert_eq!(policy.validate("scan.PDF", 100), Ok("pdf".to_string()));
        assert_eq!(policy.validate("photo.Jpg", 100), Ok("jpg".to_string()));
        assert_eq!(policy.validate("site.jpeg", 100), Ok("jpeg".to_string()));
        assert_eq!(policy.validate("roof.png", 100), Ok("png".to_string()));
    }

    #[test]
    fn non_whitelisted_extension_is_rejected() {
        let policy = UploadPolicy::attachment(CAP);
        let errors = policy.validate("invoice.exe", 100).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(".exe"));
        assert!(errors[0].contains("pdf, jpg, jpeg, png"));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let policy = UploadPolicy::attachment(CAP);
        let errors = policy.validate("README", 100).unwrap_err();
        assert_eq!(errors, vec!["The file name has no extension.".to_string()]);
    }

    #[test]
    fn size_boundary_is_inclusive() {
        let policy = UploadPolicy::attachment(CAP);
        assert!(policy.validate("scan.pdf", CAP).is_ok());
        let errors = policy.validate("scan.pdf", CAP + 1).unwrap_err();
        assert_eq!(errors, vec!["The file exceeds the 3 MB limit.".to_string()]);
    }

    #[test]
    fn size_and_type_violations_accumulate() {
        let policy = UploadPolicy::attachment(CAP);
        let errors = policy.validate("backup.zip", CAP + 1).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("3 MB"));
        assert!(errors[1].contains(".zip"));
    }

    #[test]
    fn extension_helper_handles_edge_names() {
        assert_eq!(file_extension("a.b.PDF"), Some("pdf".to_string()));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".gitignore"), None);
    }
}
