//! Integration tests for the CSV batch driver.

use google_workspace::batch::{BatchDriver, BatchOptions};
use google_workspace::errors::{SchemaError, WorkspaceError};
use google_workspace::schema::{CommandSchema, FlagSpec, FlagType, FlagValueKind, Invocation};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

fn member_flags() -> Vec<FlagSpec> {
    vec![
        FlagSpec::builder("groupKey", FlagType::String)
            .description("Group email address or ID")
            .commands(["insert"])
            .required(["insert"])
            .build()
            .unwrap(),
        FlagSpec::builder("email", FlagType::String)
            .description("Member email address")
            .commands(["insert"])
            .required(["insert"])
            .build()
            .unwrap(),
        FlagSpec::builder("role", FlagType::String)
            .description("Member role")
            .commands(["insert"])
            .default_value("insert", FlagValueKind::String("MEMBER".to_string()))
            .build()
            .unwrap(),
        FlagSpec::builder("deliverySettings", FlagType::String)
            .commands(["insert"])
            .build()
            .unwrap(),
    ]
}

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_rows_with_all_flag() {
    let flags = member_flags();
    let schema = CommandSchema::new("insert", &flags);
    let file = csv_file("email;role\na@x;member\nb@x;owner\n");
    let invocation = Invocation::new()
        .set("groupKey_ALL", "grp@x")
        .set("email", "1")
        .set("role", "2");

    let mut batch = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new(file.path()).skip_header(true),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let mut rows = Vec::new();
    while let Some(row) = batch.next().await {
        rows.push((
            row.get_string("groupKey").unwrap().to_string(),
            row.get_string("email").unwrap().to_string(),
            row.get_string("role").unwrap().to_string(),
        ));
        assert_eq!(row.len(), 4);
        assert_eq!(row.get_string("deliverySettings").unwrap(), "");
    }

    assert_eq!(
        rows,
        vec![
            ("grp@x".to_string(), "a@x".to_string(), "member".to_string()),
            ("grp@x".to_string(), "b@x".to_string(), "owner".to_string()),
        ]
    );
    assert!(batch.take_errors().is_empty());
}

#[tokio::test]
async fn test_header_emitted_without_skip() {
    let flags = member_flags();
    let schema = CommandSchema::new("insert", &flags);
    let file = csv_file("a@x\nb@x\nc@x\n");
    let invocation = Invocation::new().set("groupKey_ALL", "grp@x").set("email", "1");

    let mut batch = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new(file.path()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let processed = batch
        .run(4, |row| {
            let seen = seen.clone();
            async move {
                let email = row.get_string("email").unwrap().to_string();
                assert_eq!(row.get_string("role").unwrap(), "MEMBER");
                seen.lock().unwrap().push(email);
            }
        })
        .await;

    assert_eq!(processed, 3);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["a@x", "b@x", "c@x"]);
}

#[tokio::test]
async fn test_conflict_rejected_before_reading() {
    let flags = member_flags();
    let schema = CommandSchema::new("insert", &flags);
    let invocation = Invocation::new()
        .set("groupKey_ALL", "grp@x")
        .set("email", "1")
        .set("email_ALL", "a@x");

    let result = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new("/nonexistent/members.csv"),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(WorkspaceError::Schema(SchemaError::Conflict { .. }))
    ));
}

#[tokio::test]
async fn test_column_out_of_range() {
    let flags = member_flags();
    let schema = CommandSchema::new("insert", &flags);
    let file = csv_file("a@x;member\n");
    let invocation = Invocation::new().set("groupKey_ALL", "grp@x").set("email", "3");

    let result = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new(file.path()),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(WorkspaceError::Schema(SchemaError::ColumnOutOfRange {
            column: 3,
            columns: 2,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_bad_cell_reported_and_skipped() {
    let flags = vec![
        FlagSpec::builder("userKey", FlagType::String)
            .commands(["update"])
            .required(["update"])
            .build()
            .unwrap(),
        FlagSpec::builder("suspended", FlagType::Bool)
            .commands(["update"])
            .build()
            .unwrap(),
    ];
    let schema = CommandSchema::new("update", &flags);
    let file = csv_file("u1,true\nu2,maybe\nu3,0\n");
    let invocation = Invocation::new().set("userKey", "1").set("suspended", "2");

    let mut batch = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new(file.path()).delimiter(b',').parallelism(2),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(batch.parallelism(), 2);

    let mut rows = Vec::new();
    while let Some(row) = batch.next().await {
        rows.push((
            row.get_string("userKey").unwrap().to_string(),
            row.get_bool("suspended").unwrap(),
        ));
    }
    assert_eq!(rows, vec![("u1".to_string(), true), ("u3".to_string(), false)]);

    let errors = batch.take_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].key(), Some("line 2"));
    assert!(matches!(
        errors[0].root(),
        WorkspaceError::Schema(SchemaError::Coercion { .. })
    ));
}

#[tokio::test]
async fn test_empty_file_rejected() {
    let flags = member_flags();
    let schema = CommandSchema::new("insert", &flags);
    let file = csv_file("");
    let invocation = Invocation::new().set("groupKey_ALL", "grp@x").set("email", "1");

    let result = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new(file.path()),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(WorkspaceError::Batch(_))));
}

#[tokio::test]
async fn test_error_key_counts_file_lines() {
    let flags = vec![
        FlagSpec::builder("userKey", FlagType::String)
            .commands(["update"])
            .required(["update"])
            .build()
            .unwrap(),
        FlagSpec::builder("note", FlagType::String)
            .commands(["update"])
            .build()
            .unwrap(),
        FlagSpec::builder("count", FlagType::Int)
            .commands(["update"])
            .build()
            .unwrap(),
    ];
    let schema = CommandSchema::new("update", &flags);
    let file = csv_file("a@x;\"multi\nline\";1\nb@x;x;bad\n");
    let invocation = Invocation::new()
        .set("userKey", "1")
        .set("note", "2")
        .set("count", "3");

    let mut batch = BatchDriver::for_each_row(
        &schema,
        &invocation,
        BatchOptions::new(file.path()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let mut notes = Vec::new();
    while let Some(row) = batch.next().await {
        notes.push(row.get_string("note").unwrap().to_string());
    }
    assert_eq!(notes, vec!["multi\nline"]);

    let errors = batch.take_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].key(), Some("line 3"));
}
