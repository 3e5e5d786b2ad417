use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use log::{debug, warn};

use crate::error::SyncError;
use crate::fetch_client::EmailAttachment;
use crate::table_store::{AttachmentValue, TableStore};

/// Upload ceiling imposed by the store's blob layer.
pub const MAX_ATTACHMENT_BYTES: u64 = 2 * 1024 * 1024 * 1024; // 2 GiB
/// Longest filename the store accepts.
pub const MAX_FILENAME_CHARS: usize = 250;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub struct AttachmentUploader;

impl AttachmentUploader {
    /// Upload every eligible attachment and return the descriptors of those
    /// that made it, preserving relative order.
    ///
    /// Entries without a payload, over the size ceiling or with an over-long
    /// filename are skipped. A decode or upload failure drops that one entry;
    /// it never aborts the remaining attachments or the owning record.
    pub async fn upload_all<S: TableStore + ?Sized>(
        store: &S,
        attachments: &[EmailAttachment],
    ) -> Vec<AttachmentValue> {
        let mut uploaded = Vec::new();

        for attachment in attachments {
            match Self::upload_one(store, attachment).await {
                Ok(Some(value)) => uploaded.push(value),
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
        }

        debug!(
            "Uploaded {}/{} attachment(s)",
            uploaded.len(),
            attachments.len()
        );
        uploaded
    }

    /// Upload a single attachment. `Ok(None)` means the entry was ineligible
    /// and deliberately skipped.
    async fn upload_one<S: TableStore + ?Sized>(
        store: &S,
        attachment: &EmailAttachment,
    ) -> Result<Option<AttachmentValue>, SyncError> {
        let content = match attachment.content.as_deref() {
            Some(content) if !content.is_empty() => content,
            _ => {
                warn!(
                    "Attachment '{}' has no content, skipping upload",
                    attachment.filename
                );
                return Ok(None);
            }
        };

        if attachment.size > MAX_ATTACHMENT_BYTES {
            warn!(
                "Attachment '{}' is {} bytes, over the {} byte limit, skipping upload",
                attachment.filename, attachment.size, MAX_ATTACHMENT_BYTES
            );
            return Ok(None);
        }

        if attachment.filename.chars().count() > MAX_FILENAME_CHARS {
            warn!(
                "Attachment filename '{}' is longer than {} characters, skipping upload",
                attachment.filename, MAX_FILENAME_CHARS
            );
            return Ok(None);
        }

        // Inline payloads sometimes arrive wrapped; strip whitespace before
        // decoding.
        let bytes = general_purpose::STANDARD
            .decode(content.replace(['\r', '\n', ' '], ""))
            .map_err(|e| SyncError::AttachmentUpload {
                filename: attachment.filename.clone(),
                message: format!("invalid base64 payload: {}", e),
            })?;

        let content_type = if attachment.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            attachment.content_type.as_str()
        };

        debug!(
            "Uploading attachment '{}' ({} bytes, type: {})",
            attachment.filename,
            bytes.len(),
            content_type
        );

        let token = store
            .upload_file(bytes, &attachment.filename, content_type)
            .await
            .map_err(|e| SyncError::AttachmentUpload {
                filename: attachment.filename.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "Attachment '{}' uploaded, token: {}",
            attachment.filename, token
        );

        Ok(Some(AttachmentValue {
            name: attachment.filename.clone(),
            size: attachment.size,
            content_type: content_type.to_string(),
            token,
            time_stamp: Utc::now().timestamp_millis(),
        }))
    }
}
