// Shared test helpers: an in-memory TableStore with failure injection and
// builders for email records.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use mailbase::fetch_client::{EmailAttachment, EmailMessage};
use mailbase::table_store::{
    AttachmentValue, FieldKind, FieldMeta, RecordFields, TableMeta, TableStore,
};

/// Everything the store saw during a test, plus the failures it was told to
/// inject.
#[derive(Default)]
pub struct StoreState {
    pub fields: Vec<FieldMeta>,
    pub rows: Vec<RecordFields>,
    pub attachment_cells: Vec<(String, String, Vec<AttachmentValue>)>,
    pub uploads: Vec<String>,
    pub created_fields: Vec<String>,
    pub field_list_calls: usize,
    pub bulk_calls: usize,
    pub insert_calls: usize,
    pub fail_bulk: bool,
    pub fail_insert_ordinals: Vec<usize>,
    pub fail_field_creation: bool,
    pub fail_uploads_of: Vec<String>,
    pub fail_attachment_cells: bool,
    next_record_id: usize,
}

/// In-memory stand-in for the HTTP table client. Clones share state so a test
/// can hand one handle to the writer and keep another for inspection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn fail_bulk(&self) {
        self.state.lock().unwrap().fail_bulk = true;
    }

    /// Make the Nth add_record call fail (0-based, counted across the test).
    pub fn fail_insert_at(&self, ordinal: usize) {
        self.state.lock().unwrap().fail_insert_ordinals.push(ordinal);
    }

    pub fn fail_field_creation(&self) {
        self.state.lock().unwrap().fail_field_creation = true;
    }

    pub fn fail_upload_of(&self, filename: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_uploads_of
            .push(filename.to_string());
    }

    pub fn fail_attachment_cells(&self) {
        self.state.lock().unwrap().fail_attachment_cells = true;
    }

    pub fn seed_field(&self, name: &str, kind: FieldKind) {
        let mut state = self.state.lock().unwrap();
        let id = format!("fld{}", state.fields.len() + 1);
        state.fields.push(FieldMeta {
            id,
            name: name.to_string(),
            kind,
        });
    }

    /// Field id for a display name, panicking when the field does not exist.
    pub fn field_id(&self, name: &str) -> String {
        self.state
            .lock()
            .unwrap()
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.id.clone())
            .unwrap_or_else(|| panic!("no field named '{}'", name))
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn field_meta_list(&self) -> Result<Vec<FieldMeta>> {
        let mut state = self.state.lock().unwrap();
        state.field_list_calls += 1;
        Ok(state.fields.clone())
    }

    async fn add_field(&self, name: &str, kind: FieldKind) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_field_creation {
            anyhow::bail!("field creation rejected");
        }
        let id = format!("fld{}", state.fields.len() + 1);
        state.fields.push(FieldMeta {
            id,
            name: name.to_string(),
            kind,
        });
        state.created_fields.push(name.to_string());
        Ok(())
    }

    async fn add_records(&self, rows: &[RecordFields]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        if state.fail_bulk {
            anyhow::bail!("bulk endpoint rejected the batch");
        }
        state.rows.extend(rows.iter().cloned());
        Ok(())
    }

    async fn add_record(&self, row: &RecordFields) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let ordinal = state.insert_calls;
        state.insert_calls += 1;
        if state.fail_insert_ordinals.contains(&ordinal) {
            anyhow::bail!("insert rejected");
        }
        state.rows.push(row.clone());
        state.next_record_id += 1;
        Ok(format!("rec{}", state.next_record_id))
    }

    async fn set_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        value: &[AttachmentValue],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_attachment_cells {
            anyhow::bail!("attachment cell rejected");
        }
        state.attachment_cells.push((
            record_id.to_string(),
            field_id.to_string(),
            value.to_vec(),
        ));
        Ok(())
    }

    async fn upload_file(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
        _content_type: &str,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_uploads_of.iter().any(|f| f == filename) {
            anyhow::bail!("blob upload failed");
        }
        state.uploads.push(filename.to_string());
        Ok(format!("tok_{}", filename))
    }

    async fn table_meta(&self) -> Result<TableMeta> {
        Ok(TableMeta {
            name: "Inbox Sync".to_string(),
        })
    }
}

pub fn email(subject: &str, sender: &str, date: &str, body: &str) -> EmailMessage {
    EmailMessage {
        id: format!("msg-{}", subject.replace(' ', "-").to_lowercase()),
        subject: subject.to_string(),
        sender: sender.to_string(),
        date: date.to_string(),
        body: body.to_string(),
        attachments: None,
        has_attachments: None,
    }
}

pub fn attachment(filename: &str, size: u64, content: Option<&str>) -> EmailAttachment {
    EmailAttachment {
        filename: filename.to_string(),
        size,
        content_type: "text/csv".to_string(),
        content: content.map(|c| c.to_string()),
    }
}
