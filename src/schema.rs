use log::{debug, info, warn};

use crate::config::FieldNames;
use crate::error::SyncError;
use crate::table_store::{FieldKind, TableStore};

/// Live field ids for each logical field the pipeline writes.
///
/// Rebuilt from the table's field metadata on every run; never cached, since
/// fields can be renamed or deleted between runs. A `None` entry means the
/// table has no such field and the pipeline skips it for every record.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub date: Option<String>,
    pub content: Option<String>,
    pub attachments: Option<String>,
}

impl FieldMapping {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.sender.is_none()
            && self.date.is_none()
            && self.content.is_none()
            && self.attachments.is_none()
    }
}

/// Reconciles the table's field set with the fixed catalog and resolves the
/// field ids the write pipeline needs.
pub struct SchemaManager {
    names: FieldNames,
}

impl SchemaManager {
    pub fn new(names: FieldNames) -> Self {
        SchemaManager { names }
    }

    /// The fixed field catalog, in creation order.
    fn catalog(&self) -> [(&str, FieldKind); 5] {
        [
            (self.names.subject.as_str(), FieldKind::Text),
            (self.names.sender.as_str(), FieldKind::Text),
            (self.names.date.as_str(), FieldKind::DateTime),
            (self.names.content.as_str(), FieldKind::Text),
            (self.names.attachments.as_str(), FieldKind::Attachment),
        ]
    }

    /// Create every catalog field the table is missing, by name.
    ///
    /// Idempotent: a table that already carries all fields is untouched. A
    /// creation failure aborts the run; whatever fields were created stay, and
    /// the next run picks up where this one stopped.
    pub async fn ensure_fields<S: TableStore + ?Sized>(&self, store: &S) -> Result<(), SyncError> {
        let metas = store
            .field_meta_list()
            .await
            .map_err(|e| SyncError::Schema {
                name: "field list".to_string(),
                message: e.to_string(),
            })?;

        let existing: Vec<&str> = metas.iter().map(|m| m.name.as_str()).collect();

        for (name, kind) in self.catalog() {
            if existing.contains(&name) {
                continue;
            }
            store
                .add_field(name, kind)
                .await
                .map_err(|e| SyncError::Schema {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
            info!("Created field '{}' ({:?})", name, kind);
        }

        Ok(())
    }

    /// Re-read the field metadata and map logical names to field ids.
    ///
    /// Missing fields are simply absent from the mapping; a mapping with no
    /// usable field at all is a configuration error fatal for the run.
    pub async fn field_mapping<S: TableStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<FieldMapping, SyncError> {
        let metas = store
            .field_meta_list()
            .await
            .map_err(|e| SyncError::Schema {
                name: "field list".to_string(),
                message: e.to_string(),
            })?;

        let mut mapping = FieldMapping::default();

        for meta in metas {
            if meta.name == self.names.subject {
                mapping.subject = Some(meta.id);
            } else if meta.name == self.names.sender {
                mapping.sender = Some(meta.id);
            } else if meta.name == self.names.date {
                mapping.date = Some(meta.id);
            } else if meta.name == self.names.content {
                mapping.content = Some(meta.id);
            } else if meta.name == self.names.attachments {
                mapping.attachments = Some(meta.id);
            }
        }

        if mapping.is_empty() {
            return Err(SyncError::MappingEmpty);
        }

        debug!("Field mapping resolved: {:?}", mapping);
        Ok(mapping)
    }

    /// Whether the table already carries at least the subject and sender
    /// fields. Errors count as "not ready", the caller only needs a yes/no.
    pub async fn has_email_fields<S: TableStore + ?Sized>(&self, store: &S) -> bool {
        match store.field_meta_list().await {
            Ok(metas) => {
                let names: Vec<&str> = metas.iter().map(|m| m.name.as_str()).collect();
                names.contains(&self.names.subject.as_str())
                    && names.contains(&self.names.sender.as_str())
            }
            Err(e) => {
                warn!("Unable to check the table fields: {}", e);
                false
            }
        }
    }
}
