use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};

use crate::attachment_uploader::AttachmentUploader;
use crate::error::SyncError;
use crate::fetch_client::EmailMessage;
use crate::schema::FieldMapping;
use crate::table_store::{CellValue, RecordFields, TableStore};

/// Longest content the store accepts in a text cell.
pub const MAX_CONTENT_CHARS: usize = 10_000;
/// Marker appended when content had to be truncated.
pub const CONTENT_ELLIPSIS: &str = "...";

/// Timestamp layouts the fetcher is known to emit besides RFC 2822/3339.
const NAIVE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"];

/// Builds one store row from one email record, uploading its attachments on
/// the way. Only fields present in the mapping are populated.
pub struct RecordBuilder<'a, S: TableStore + ?Sized> {
    store: &'a S,
    mapping: &'a FieldMapping,
}

impl<'a, S: TableStore + ?Sized> RecordBuilder<'a, S> {
    pub fn new(store: &'a S, mapping: &'a FieldMapping) -> Self {
        RecordBuilder { store, mapping }
    }

    /// Build the row for the record at `index` in the batch.
    ///
    /// A record with nothing to write (blank subject, sender and body, no
    /// uploadable attachment) is rejected here, before any store call is made
    /// for it.
    pub async fn build(
        &self,
        index: usize,
        email: &EmailMessage,
    ) -> Result<RecordFields, SyncError> {
        if Self::is_vacuous(email) {
            return Err(SyncError::RecordValidation {
                index,
                field: "record".to_string(),
                reason: "subject, sender and body are empty and there is no attachment"
                    .to_string(),
            });
        }

        let mut fields = RecordFields::new();

        if let Some(id) = &self.mapping.subject {
            fields.insert(id.clone(), CellValue::Text(email.subject.clone()));
        }

        if let Some(id) = &self.mapping.sender {
            fields.insert(id.clone(), CellValue::Text(email.sender.clone()));
        }

        if let Some(id) = &self.mapping.date {
            let millis = match parse_date_millis(&email.date) {
                Some(millis) => millis,
                None => {
                    // A date cell must always be set; precision loss here is
                    // accepted over failing the record.
                    warn!(
                        "Record {}: unparsable date '{}', using current time",
                        index, email.date
                    );
                    Utc::now().timestamp_millis()
                }
            };
            fields.insert(id.clone(), CellValue::Timestamp(millis));
        }

        if let Some(id) = &self.mapping.content {
            fields.insert(id.clone(), CellValue::Text(sanitize_content(&email.body)));
        }

        if let Some(id) = &self.mapping.attachments {
            // Attachment cells are always lists. Records carrying only the
            // legacy has_attachments flag, or nothing, get an empty one.
            let values = match &email.attachments {
                Some(list) if !list.is_empty() => {
                    AttachmentUploader::upload_all(self.store, list).await
                }
                _ => {
                    if email.has_attachments.unwrap_or(false) {
                        debug!(
                            "Record {}: flagged as having attachments but carries no detail",
                            index
                        );
                    }
                    Vec::new()
                }
            };
            fields.insert(id.clone(), CellValue::Attachments(values));
        }

        if fields.values().all(|cell| cell.is_empty()) {
            return Err(SyncError::RecordValidation {
                index,
                field: "fields".to_string(),
                reason: "no field could be populated from this record".to_string(),
            });
        }

        Ok(fields)
    }

    /// A record with blank text fields and no uploadable attachment carries
    /// nothing worth a row.
    fn is_vacuous(email: &EmailMessage) -> bool {
        let has_uploadable = email
            .attachments
            .as_ref()
            .map(|list| {
                list.iter()
                    .any(|a| a.content.as_deref().is_some_and(|c| !c.is_empty()))
            })
            .unwrap_or(false);

        email.subject.trim().is_empty()
            && email.sender.trim().is_empty()
            && email.body.trim().is_empty()
            && !has_uploadable
    }
}

/// Parse the fetcher's timestamp into epoch milliseconds. Naive layouts are
/// read as UTC.
fn parse_date_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    None
}

/// Clean up email body text before it is written to a text cell: drop the
/// control characters the store cannot encode, normalize line breaks to LF,
/// trim, and cap the length.
fn sanitize_content(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !is_stripped_control(*c)).collect();
    let normalized = cleaned.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = normalized.trim();

    match trimmed.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((byte_index, _)) => {
            warn!(
                "Content longer than {} characters, truncating",
                MAX_CONTENT_CHARS
            );
            let mut truncated = trimmed[..byte_index].to_string();
            truncated.push_str(CONTENT_ELLIPSIS);
            truncated
        }
        None => trimmed.to_string(),
    }
}

// 0x09 (tab), 0x0A (LF) and 0x0D (CR) survive; CR is folded into LF right
// after.
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}
