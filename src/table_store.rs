use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Field types the sync pipeline knows how to write.
///
/// A live table can carry fields of other kinds; those deserialize to
/// `Unknown` and are simply never mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    #[serde(rename = "datetime")]
    DateTime,
    Attachment,
    #[serde(other)]
    Unknown,
}

/// Metadata of one table field as reported by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    pub name: String,
    pub kind: FieldKind,
}

/// Metadata of the table itself.
#[derive(Debug, Clone, Deserialize)]
pub struct TableMeta {
    pub name: String,
}

/// A fully uploaded attachment, as the store expects it in an attachment cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentValue {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub token: String,
    #[serde(rename = "timeStamp")]
    pub time_stamp: i64,
}

/// One cell value. Serialized untagged so the store API sees plain strings,
/// millisecond timestamps and attachment arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Timestamp(i64),
    Attachments(Vec<AttachmentValue>),
}

impl CellValue {
    /// A cell counts as empty when it carries no usable content: an empty
    /// string or an empty attachment list. Timestamps are always set.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Text(s) => s.is_empty(),
            CellValue::Timestamp(_) => false,
            CellValue::Attachments(list) => list.is_empty(),
        }
    }
}

/// One store row: field id → cell value.
pub type RecordFields = HashMap<String, CellValue>;

/// Capability surface of the tabular store host.
///
/// The pipeline only ever talks to the table through this trait; the HTTP
/// implementation lives in `table_client` and the tests provide an in-memory
/// one.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Live field metadata of the table.
    async fn field_meta_list(&self) -> Result<Vec<FieldMeta>>;

    /// Create a new field. The caller is responsible for not creating
    /// duplicates; the store does not deduplicate by name.
    async fn add_field(&self, name: &str, kind: FieldKind) -> Result<()>;

    /// Insert several rows in one call.
    async fn add_records(&self, rows: &[RecordFields]) -> Result<()>;

    /// Insert a single row, returning its record id.
    async fn add_record(&self, row: &RecordFields) -> Result<String>;

    /// Replace the attachment cell of an existing record. Requires the record
    /// to already exist, which is why the fallback path inserts first.
    async fn set_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        value: &[AttachmentValue],
    ) -> Result<()>;

    /// Upload one file to the store's blob layer, returning its token.
    async fn upload_file(&self, bytes: Vec<u8>, filename: &str, content_type: &str)
        -> Result<String>;

    /// Metadata of the table (display name).
    async fn table_meta(&self) -> Result<TableMeta>;
}
