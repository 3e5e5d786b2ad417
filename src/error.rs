use thiserror::Error;

/// Errors produced by the sync pipeline.
///
/// Only `Schema` and `MappingEmpty` abort a run. The remaining kinds isolate
/// to a single record or attachment: they are logged, rendered into the
/// `WriteOutcome` failure list and the run carries on.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Creating a missing table field failed. Fatal for the run; the table is
    /// left in whatever partial state it reached and the next run retries the
    /// name-based check.
    #[error("schema reconciliation failed for '{name}': {message}")]
    Schema { name: String, message: String },

    /// After reconciliation the table exposes none of the expected fields.
    #[error("no usable fields found in the table, check the field configuration")]
    MappingEmpty,

    /// One record's data is unusable; the record is excluded from the write
    /// set and counted as failed.
    #[error("record {index}: invalid {field}: {reason}")]
    RecordValidation {
        index: usize,
        field: String,
        reason: String,
    },

    /// One attachment could not be decoded or uploaded; the attachment is
    /// skipped, the owning record is unaffected.
    #[error("attachment '{filename}': upload failed: {message}")]
    AttachmentUpload { filename: String, message: String },

    /// The bulk insert call failed as a whole; triggers the per-row fallback.
    #[error("bulk insert of {count} record(s) failed: {message}")]
    BulkWrite { count: usize, message: String },

    /// One row's base insert failed during fallback; the row is counted as
    /// failed and the remaining rows are still attempted.
    #[error("record {index}: insert failed: {message}")]
    RowInsert { index: usize, message: String },

    /// Setting the attachment cell of an already inserted row failed; the row
    /// still counts as succeeded, only its attachments are missing.
    #[error("record {index}: attachment assignment failed: {message}")]
    AttachmentAttach { index: usize, message: String },
}

impl SyncError {
    /// Whether this error aborts the whole run instead of isolating to one
    /// record or attachment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Schema { .. } | SyncError::MappingEmpty)
    }
}
