mod common;

use anyhow::Result;
use applus::db::load_timestamp;
use applus::{Error, Fields, FieldValue, RecordMutator};
use common::test_system;

fn article(key: &str, name: &str) -> Fields {
    Fields::from([
        ("ARTIKEL".to_string(), FieldValue::from(key)),
        ("NAME".to_string(), FieldValue::from(name)),
    ])
}

#[tokio::test]
async fn test_insert_returns_new_id() -> Result<()> {
    let system = test_system().await?;
    let mutator = RecordMutator::new(&system.session);

    let id = mutator.insert("ARTIKEL", &article("A100", "Widget")).await?;

    let row = system
        .session
        .query_single_row("SELECT ARTIKEL, NAME, MANDANT FROM ARTIKEL WHERE ID = ?", &[id.into()])
        .await?
        .expect("inserted row");
    assert_eq!(row["ARTIKEL"], FieldValue::from("A100"));
    assert_eq!(row["MANDANT"], FieldValue::from(common::TENANT));

    let sent = system.server.calls("useXML");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text_param(0).unwrap().starts_with("<row cmd=\"insert\" table=\"ARTIKEL\""));
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_use_current_timestamp() -> Result<()> {
    let system = test_system().await?;
    let mutator = RecordMutator::new(&system.session);
    let id = mutator.insert("ARTIKEL", &article("A100", "Widget")).await?;

    let before = load_timestamp(system.db.as_ref(), "ARTIKEL", id).await?;
    let change = Fields::from([("NAME".to_string(), FieldValue::from("Gadget"))]);
    mutator.update("ARTIKEL", id, &change).await?;

    assert_eq!(system.count("ARTIKEL", "NAME = 'Gadget'").await?, 1);
    let after = load_timestamp(system.db.as_ref(), "ARTIKEL", id).await?;
    assert_ne!(before, after);

    mutator.delete("ARTIKEL", id).await?;
    assert_eq!(system.count("ARTIKEL", "1 = 1").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() -> Result<()> {
    let system = test_system().await?;
    let mutator = RecordMutator::new(&system.session);
    let id = mutator.insert("ARTIKEL", &article("A100", "Widget")).await?;

    let change = Fields::from([("NAME".to_string(), FieldValue::from("Gadget"))]);
    let err = mutator
        .update_with_timestamp("ARTIKEL", id, &change, Some("00000000000000ff".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::Validation { table, message } if table == "ARTIKEL" && message.contains("geändert")));
    assert_eq!(system.count("ARTIKEL", "NAME = 'Widget'").await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_insert_or_update_matches_unique_index() -> Result<()> {
    let system = test_system().await?;
    let mutator = RecordMutator::new(&system.session);

    let first = mutator.insert_or_update("ARTIKEL", &article("A100", "Widget")).await?;
    let second = mutator.insert_or_update("ARTIKEL", &article("A100", "Gadget")).await?;
    let other = mutator.insert_or_update("ARTIKEL", &article("A200", "Gizmo")).await?;

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(system.count("ARTIKEL", "1 = 1").await?, 2);
    assert_eq!(system.count("ARTIKEL", "ARTIKEL = 'A100' AND NAME = 'Gadget'").await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_server_fault_becomes_validation_error() -> Result<()> {
    let system = test_system().await?;
    system.server.fail_on("ARTIKEL");
    let mutator = RecordMutator::new(&system.session);

    let err = mutator.insert("ARTIKEL", &article("A100", "Widget")).await.unwrap_err();

    match err {
        Error::Validation { table, message } => {
            assert_eq!(table, "ARTIKEL");
            assert_eq!(message, "Änderungen an ARTIKEL sind gesperrt");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(system.count("ARTIKEL", "1 = 1").await?, 0);
    Ok(())
}
