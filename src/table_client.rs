use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::table_store::{
    AttachmentValue, FieldKind, FieldMeta, RecordFields, TableMeta, TableStore,
};

/// Fixed call-level timeout for every store request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response envelope shared by all store endpoints.
#[derive(Debug, Deserialize)]
struct StoreEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

impl<T> StoreEnvelope<T> {
    fn into_data(self, what: &str) -> Result<T> {
        if !self.success {
            anyhow::bail!(
                "{} request failed: {}",
                what,
                self.error.unwrap_or_else(|| "unknown store error".to_string())
            );
        }
        self.data
            .with_context(|| format!("{} response carries no data", what))
    }

    fn into_ok(self, what: &str) -> Result<()> {
        if !self.success {
            anyhow::bail!(
                "{} request failed: {}",
                what,
                self.error.unwrap_or_else(|| "unknown store error".to_string())
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AddFieldRequest<'a> {
    name: &'a str,
    kind: FieldKind,
}

#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    fields: &'a RecordFields,
}

#[derive(Debug, Serialize)]
struct BatchCreateRequest<'a> {
    records: Vec<RecordPayload<'a>>,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    record_id: String,
}

#[derive(Debug, Serialize)]
struct SetCellRequest<'a> {
    value: &'a [AttachmentValue],
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    token: String,
}

/// HTTP implementation of the table capability surface.
pub struct HttpTableStore {
    client: Client,
    base_url: String,
    table_id: String,
    api_token: String,
}

impl HttpTableStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Unable to build the HTTP client for the table store")?;

        Ok(HttpTableStore {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            table_id: config.table_id.clone(),
            api_token: config.api_token.clone(),
        })
    }

    fn table_url(&self, suffix: &str) -> String {
        format!("{}/api/tables/{}{}", self.base_url, self.table_id, suffix)
    }
}

#[async_trait]
impl TableStore for HttpTableStore {
    async fn field_meta_list(&self) -> Result<Vec<FieldMeta>> {
        let envelope: StoreEnvelope<Vec<FieldMeta>> = self
            .client
            .get(self.table_url("/fields"))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("Error requesting the field list")?
            .error_for_status()?
            .json()
            .await
            .context("Field list is not valid JSON")?;

        envelope.into_data("field list")
    }

    async fn add_field(&self, name: &str, kind: FieldKind) -> Result<()> {
        debug!("Creating field '{}' ({:?})", name, kind);

        let envelope: StoreEnvelope<serde_json::Value> = self
            .client
            .post(self.table_url("/fields"))
            .bearer_auth(&self.api_token)
            .json(&AddFieldRequest { name, kind })
            .send()
            .await
            .context("Error creating a field")?
            .error_for_status()?
            .json()
            .await
            .context("Field creation response is not valid JSON")?;

        envelope.into_ok("field creation")
    }

    async fn add_records(&self, rows: &[RecordFields]) -> Result<()> {
        let request = BatchCreateRequest {
            records: rows.iter().map(|fields| RecordPayload { fields }).collect(),
        };

        debug!("Bulk inserting {} record(s)", rows.len());

        let envelope: StoreEnvelope<serde_json::Value> = self
            .client
            .post(self.table_url("/records/batch"))
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .context("Error bulk inserting records")?
            .error_for_status()?
            .json()
            .await
            .context("Bulk insert response is not valid JSON")?;

        envelope.into_ok("bulk insert")
    }

    async fn add_record(&self, row: &RecordFields) -> Result<String> {
        let envelope: StoreEnvelope<CreatedRecord> = self
            .client
            .post(self.table_url("/records"))
            .bearer_auth(&self.api_token)
            .json(&RecordPayload { fields: row })
            .send()
            .await
            .context("Error inserting a record")?
            .error_for_status()?
            .json()
            .await
            .context("Record insert response is not valid JSON")?;

        Ok(envelope.into_data("record insert")?.record_id)
    }

    async fn set_attachment_cell(
        &self,
        record_id: &str,
        field_id: &str,
        value: &[AttachmentValue],
    ) -> Result<()> {
        let url = self.table_url(&format!("/records/{}/fields/{}", record_id, field_id));

        let envelope: StoreEnvelope<serde_json::Value> = self
            .client
            .put(url)
            .bearer_auth(&self.api_token)
            .json(&SetCellRequest { value })
            .send()
            .await
            .context("Error setting an attachment cell")?
            .error_for_status()?
            .json()
            .await
            .context("Attachment cell response is not valid JSON")?;

        envelope.into_ok("attachment cell update")
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String> {
        let url = format!("{}/api/files/upload", self.base_url);

        let envelope: StoreEnvelope<UploadedFile> = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("Error uploading a file")?
            .error_for_status()?
            .json()
            .await
            .context("File upload response is not valid JSON")?;

        Ok(envelope.into_data("file upload")?.token)
    }

    async fn table_meta(&self) -> Result<TableMeta> {
        let envelope: StoreEnvelope<TableMeta> = self
            .client
            .get(self.table_url("/meta"))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("Error requesting the table metadata")?
            .error_for_status()?
            .json()
            .await
            .context("Table metadata is not valid JSON")?;

        envelope.into_data("table metadata")
    }
}
