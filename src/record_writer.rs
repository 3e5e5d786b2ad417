use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::config::FieldNames;
use crate::error::SyncError;
use crate::fetch_client::EmailMessage;
use crate::record_builder::RecordBuilder;
use crate::schema::{FieldMapping, SchemaManager};
use crate::table_store::{CellValue, RecordFields, TableStore};

/// Pause between successive fallback inserts, to stay inside the store's
/// request budget.
const FALLBACK_DELAY_MS: u64 = 200;

/// How the batch ended up being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// One bulk call covered every row.
    Bulk,
    /// The bulk call failed and rows were inserted one by one.
    Fallback,
}

/// One record that could not be written, with its position in the input batch.
#[derive(Debug)]
pub struct RecordFailure {
    pub index: usize,
    pub reason: String,
}

/// Terminal result of one batch write. `succeeded + failed` always equals
/// `total_requested`.
#[derive(Debug)]
pub struct WriteOutcome {
    pub total_requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub mode: WriteMode,
    pub errors: Vec<RecordFailure>,
}

/// Orchestrates one sync batch against the table: reconcile the schema once,
/// build every row, try one bulk insert, and degrade to per-row inserts when
/// the bulk call fails.
pub struct RecordWriter<S: TableStore> {
    store: S,
    schema: SchemaManager,
}

impl<S: TableStore> RecordWriter<S> {
    pub fn new(store: S, fields: FieldNames) -> Self {
        RecordWriter {
            store,
            schema: SchemaManager::new(fields),
        }
    }

    /// Create every missing table field. Safe to call on every run.
    pub async fn ensure_schema(&self) -> Result<(), SyncError> {
        self.schema.ensure_fields(&self.store).await
    }

    /// Whether the table already carries the subject and sender fields.
    pub async fn has_email_fields(&self) -> bool {
        self.schema.has_email_fields(&self.store).await
    }

    /// Display name of the target table. Store errors degrade to a
    /// placeholder; the name is informational only.
    pub async fn table_name(&self) -> String {
        match self.store.table_meta().await {
            Ok(meta) => meta.name,
            Err(e) => {
                warn!("Unable to read the table name: {}", e);
                "unknown table".to_string()
            }
        }
    }

    /// Write a batch of email records and report exactly what happened.
    ///
    /// Only schema-level problems (`Schema`, `MappingEmpty`) surface as `Err`;
    /// everything below that isolates to single records and lands in the
    /// returned outcome.
    pub async fn write_records(&self, emails: &[EmailMessage]) -> Result<WriteOutcome, SyncError> {
        let total = emails.len();

        if emails.is_empty() {
            info!("No emails to write");
            return Ok(WriteOutcome {
                total_requested: 0,
                succeeded: 0,
                failed: 0,
                mode: WriteMode::Bulk,
                errors: Vec::new(),
            });
        }

        info!("Writing {} email record(s) to the table", total);

        // Reconcile once, map once; the mapping lives for this batch only.
        self.schema.ensure_fields(&self.store).await?;
        let mapping = self.schema.field_mapping(&self.store).await?;

        // Build every row in input order. A record that fails to build is
        // excluded from the write set and counted as failed up front.
        let builder = RecordBuilder::new(&self.store, &mapping);
        let mut rows: Vec<(usize, RecordFields)> = Vec::new();
        let mut errors: Vec<RecordFailure> = Vec::new();

        for (index, email) in emails.iter().enumerate() {
            match builder.build(index, email).await {
                Ok(fields) => rows.push((index, fields)),
                Err(e) => {
                    warn!("{}", e);
                    errors.push(RecordFailure {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if rows.is_empty() {
            warn!("No valid record in the batch, nothing to write");
            return Ok(WriteOutcome {
                total_requested: total,
                succeeded: 0,
                failed: total,
                mode: WriteMode::Bulk,
                errors,
            });
        }

        // One bulk call for the whole write set.
        let row_fields: Vec<RecordFields> = rows.iter().map(|(_, f)| f.clone()).collect();

        match self.store.add_records(&row_fields).await {
            Ok(()) => {
                info!("Bulk insert succeeded: {} record(s)", rows.len());
                Ok(WriteOutcome {
                    total_requested: total,
                    succeeded: rows.len(),
                    failed: total - rows.len(),
                    mode: WriteMode::Bulk,
                    errors,
                })
            }
            Err(e) => {
                let bulk_error = SyncError::BulkWrite {
                    count: rows.len(),
                    message: e.to_string(),
                };
                warn!("{}; falling back to per-record inserts", bulk_error);
                Ok(self.write_one_by_one(total, rows, errors, &mapping).await)
            }
        }
    }

    /// Fallback path: insert rows one at a time, in input order, isolating
    /// failures to single rows.
    async fn write_one_by_one(
        &self,
        total: usize,
        rows: Vec<(usize, RecordFields)>,
        mut errors: Vec<RecordFailure>,
        mapping: &FieldMapping,
    ) -> WriteOutcome {
        let row_count = rows.len();
        let mut succeeded = 0;

        for (position, (index, mut fields)) in rows.into_iter().enumerate() {
            // The store wants a row to exist before its attachment cell can
            // be set, so the attachment cell goes in with a second call.
            let attachment_cell = mapping
                .attachments
                .as_ref()
                .and_then(|id| fields.remove(id));

            match self.store.add_record(&fields).await {
                Ok(record_id) => {
                    succeeded += 1;
                    debug!("Record {} inserted as '{}'", index, record_id);

                    if let (Some(field_id), Some(CellValue::Attachments(values))) =
                        (mapping.attachments.as_ref(), attachment_cell)
                    {
                        if !values.is_empty() {
                            if let Err(e) = self
                                .store
                                .set_attachment_cell(&record_id, field_id, &values)
                                .await
                            {
                                // The row stays succeeded; only its
                                // attachments are missing.
                                let attach_error = SyncError::AttachmentAttach {
                                    index,
                                    message: e.to_string(),
                                };
                                warn!("{}", attach_error);
                            }
                        }
                    }
                }
                Err(e) => {
                    let insert_error = SyncError::RowInsert {
                        index,
                        message: e.to_string(),
                    };
                    error!("{}", insert_error);
                    errors.push(RecordFailure {
                        index,
                        reason: insert_error.to_string(),
                    });
                }
            }

            if position < row_count - 1 {
                sleep(Duration::from_millis(FALLBACK_DELAY_MS)).await;
            }
        }

        info!(
            "Fallback insert completed: {}/{} record(s) written",
            succeeded, row_count
        );

        errors.sort_by_key(|f| f.index);

        WriteOutcome {
            total_requested: total,
            succeeded,
            failed: total - succeeded,
            mode: WriteMode::Fallback,
            errors,
        }
    }
}
