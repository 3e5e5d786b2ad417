mod common;

use common::{attachment, email, MemoryStore};
use mailbase::config::FieldNames;
use mailbase::error::SyncError;
use mailbase::fetch_client::EmailMessage;
use mailbase::record_writer::{RecordWriter, WriteMode};
use mailbase::table_store::CellValue;

fn writer(store: &MemoryStore) -> RecordWriter<MemoryStore> {
    RecordWriter::new(store.clone(), FieldNames::default())
}

fn batch_of(count: usize) -> Vec<EmailMessage> {
    (0..count)
        .map(|i| {
            email(
                &format!("Message {}", i),
                &format!("sender{}@example.com", i),
                "2025-06-02 10:00:00",
                &format!("Body of message {}", i),
            )
        })
        .collect()
}

fn subject_of(row: &mailbase::table_store::RecordFields, subject_id: &str) -> String {
    match row.get(subject_id) {
        Some(CellValue::Text(subject)) => subject.clone(),
        other => panic!("expected a subject cell, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bulk_write_success() {
    let store = MemoryStore::new();
    let outcome = writer(&store)
        .write_records(&batch_of(3))
        .await
        .expect("write failed");

    assert_eq!(outcome.total_requested, 3);
    assert_eq!(outcome.succeeded, 3);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.mode, WriteMode::Bulk);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.succeeded + outcome.failed, outcome.total_requested);

    let state = store.state.lock().unwrap();
    assert_eq!(state.bulk_calls, 1);
    assert_eq!(state.insert_calls, 0, "bulk success must not insert row by row");
    assert_eq!(state.rows.len(), 3);
}

#[tokio::test]
async fn test_bulk_failure_falls_back_to_per_row_inserts() {
    let store = MemoryStore::new();
    store.fail_bulk();

    let outcome = writer(&store)
        .write_records(&batch_of(4))
        .await
        .expect("write failed");

    assert_eq!(outcome.mode, WriteMode::Fallback);
    assert_eq!(outcome.succeeded, 4);
    assert_eq!(outcome.failed, 0);

    let subject_id = store.field_id("Subject");
    let state = store.state.lock().unwrap();
    assert_eq!(state.bulk_calls, 1);
    assert_eq!(state.insert_calls, 4, "every row gets its own insert");

    // Fallback preserves input order
    let subjects: Vec<String> = state
        .rows
        .iter()
        .map(|row| subject_of(row, &subject_id))
        .collect();
    assert_eq!(
        subjects,
        vec!["Message 0", "Message 1", "Message 2", "Message 3"]
    );
}

#[tokio::test]
async fn test_fallback_isolates_a_failing_row() {
    let store = MemoryStore::new();
    store.fail_bulk();
    store.fail_insert_at(1); // second row

    let outcome = writer(&store)
        .write_records(&batch_of(3))
        .await
        .expect("write failed");

    assert_eq!(outcome.total_requested, 3);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.mode, WriteMode::Fallback);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].index, 1);
    assert!(outcome.errors[0].reason.contains("insert failed"));
    assert_eq!(outcome.succeeded + outcome.failed, outcome.total_requested);

    let subject_id = store.field_id("Subject");
    let state = store.state.lock().unwrap();
    assert_eq!(state.insert_calls, 3, "the failing row must not stop the rest");

    let subjects: Vec<String> = state
        .rows
        .iter()
        .map(|row| subject_of(row, &subject_id))
        .collect();
    assert_eq!(subjects, vec!["Message 0", "Message 2"]);
}

#[tokio::test]
async fn test_fallback_writes_attachments_in_a_second_call() {
    let store = MemoryStore::new();
    store.fail_bulk();

    let mut emails = batch_of(1);
    emails[0].attachments = Some(vec![attachment("data.csv", 5, Some("aGVsbG8="))]);

    let outcome = writer(&store)
        .write_records(&emails)
        .await
        .expect("write failed");

    assert_eq!(outcome.succeeded, 1);

    let attachments_id = store.field_id("Attachments");
    let state = store.state.lock().unwrap();
    // The base insert must not carry the attachment cell
    assert!(!state.rows[0].contains_key(&attachments_id));

    // The attachment arrives through the dedicated cell call
    assert_eq!(state.attachment_cells.len(), 1);
    let (record_id, field_id, values) = &state.attachment_cells[0];
    assert_eq!(record_id, "rec1");
    assert_eq!(field_id, &attachments_id);
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].name, "data.csv");
}

#[tokio::test]
async fn test_attachment_cell_failure_keeps_the_row_succeeded() {
    let store = MemoryStore::new();
    store.fail_bulk();
    store.fail_attachment_cells();

    let mut emails = batch_of(1);
    emails[0].attachments = Some(vec![attachment("data.csv", 5, Some("aGVsbG8="))]);

    let outcome = writer(&store)
        .write_records(&emails)
        .await
        .expect("write failed");

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 0);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_fallback_skips_the_attachment_call_for_empty_lists() {
    let store = MemoryStore::new();
    store.fail_bulk();

    let outcome = writer(&store)
        .write_records(&batch_of(2))
        .await
        .expect("write failed");

    assert_eq!(outcome.succeeded, 2);
    assert!(store.state.lock().unwrap().attachment_cells.is_empty());
}

#[tokio::test]
async fn test_bulk_rows_carry_the_empty_attachment_cell() {
    let store = MemoryStore::new();

    writer(&store)
        .write_records(&batch_of(1))
        .await
        .expect("write failed");

    let attachments_id = store.field_id("Attachments");
    let state = store.state.lock().unwrap();
    assert_eq!(
        state.rows[0].get(&attachments_id),
        Some(&CellValue::Attachments(Vec::new()))
    );
}

#[tokio::test]
async fn test_vacuous_record_fails_validation_without_store_writes() {
    let store = MemoryStore::new();

    let outcome = writer(&store)
        .write_records(&[email("", "", "", "  ")])
        .await
        .expect("write failed");

    assert_eq!(outcome.total_requested, 1);
    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.mode, WriteMode::Bulk);
    assert_eq!(outcome.errors[0].index, 0);

    let state = store.state.lock().unwrap();
    assert_eq!(state.bulk_calls, 0, "an empty write set skips the bulk call");
    assert_eq!(state.insert_calls, 0);
    assert!(state.uploads.is_empty());
}

#[tokio::test]
async fn test_invalid_record_among_valid_ones() {
    let store = MemoryStore::new();

    let emails = vec![
        email("First", "a@example.com", "2025-06-02 10:00:00", "body"),
        email("", "", "", ""),
        email("Third", "c@example.com", "2025-06-02 10:00:00", "body"),
    ];

    let outcome = writer(&store)
        .write_records(&emails)
        .await
        .expect("write failed");

    assert_eq!(outcome.total_requested, 3);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.mode, WriteMode::Bulk);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].index, 1);
    assert_eq!(outcome.succeeded + outcome.failed, outcome.total_requested);

    assert_eq!(store.state.lock().unwrap().rows.len(), 2);
}

#[tokio::test]
async fn test_empty_batch_touches_nothing() {
    let store = MemoryStore::new();

    let outcome = writer(&store)
        .write_records(&[])
        .await
        .expect("write failed");

    assert_eq!(outcome.total_requested, 0);
    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.mode, WriteMode::Bulk);

    let state = store.state.lock().unwrap();
    assert_eq!(state.field_list_calls, 0);
    assert_eq!(state.bulk_calls, 0);
}

#[tokio::test]
async fn test_schema_failure_aborts_the_run() {
    let store = MemoryStore::new();
    store.fail_field_creation();

    let result = writer(&store).write_records(&batch_of(1)).await;

    assert!(matches!(result, Err(SyncError::Schema { .. })));
    assert_eq!(store.state.lock().unwrap().bulk_calls, 0);
}

#[tokio::test]
async fn test_mapping_is_rebuilt_on_every_run() {
    let store = MemoryStore::new();
    let writer = writer(&store);

    writer
        .write_records(&batch_of(1))
        .await
        .expect("first write failed");
    writer
        .write_records(&batch_of(1))
        .await
        .expect("second write failed");

    // One listing for reconciliation plus one for mapping, per run
    assert_eq!(store.state.lock().unwrap().field_list_calls, 4);
}

#[tokio::test]
async fn test_table_name_comes_from_the_store_meta() {
    let store = MemoryStore::new();
    assert_eq!(writer(&store).table_name().await, "Inbox Sync");
}
