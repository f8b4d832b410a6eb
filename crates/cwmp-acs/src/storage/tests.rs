//! Storage layer tests for the ACS.

use cwmp_core::cwmp::ParameterValue;

use super::db::{AcsDatabase, DatabaseError};
use super::queries::SESSION_ENDED_ERROR;
use crate::store::DeviceReport;

async fn test_db() -> AcsDatabase {
    AcsDatabase::open_in_memory().await.unwrap()
}

fn param(name: &str, value: &str) -> ParameterValue {
    ParameterValue {
        name: name.into(),
        value: value.into(),
        value_type: Some("xsd:string".into()),
    }
}

fn report(serial: &str) -> DeviceReport {
    DeviceReport {
        serial_number: serial.into(),
        manufacturer: Some("Huawei".into()),
        oui: Some("00E0FC".into()),
        product_class: Some("HG8245".into()),
        software_version: Some("V1".into()),
        ..DeviceReport::default()
    }
}

async fn seeded_device(db: &AcsDatabase) -> String {
    db.upsert_device(&report("SN1"), 1_000).await.unwrap().device.id
}

// === Device tests ===

#[tokio::test]
async fn first_inform_creates_device() {
    let db = test_db().await;
    let outcome = db.upsert_device(&report("ABC123"), 1_000).await.unwrap();

    assert!(outcome.created);
    let device = outcome.device;
    assert_eq!(device.serial_number, "ABC123");
    assert_eq!(device.manufacturer, "Huawei");
    assert_eq!(device.device_type, "CPE");
    assert_eq!(device.status, "online");
    assert_eq!(device.last_inform, Some(1_000));
    assert_eq!(device.registered_at, 1_000);
    assert_eq!(device.last_boot, None);
}

#[tokio::test]
async fn repeated_inform_updates_same_row() {
    let db = test_db().await;
    let first = db.upsert_device(&report("ABC123"), 1_000).await.unwrap();

    let mut again = report("ABC123");
    again.software_version = Some("V2".into());
    let second = db.upsert_device(&again, 2_000).await.unwrap();

    assert!(!second.created);
    assert_eq!(second.device.id, first.device.id);
    assert_eq!(second.device.software_version.as_deref(), Some("V2"));
    assert_eq!(second.device.registered_at, 1_000);
    assert_eq!(second.device.last_inform, Some(2_000));
    assert_eq!(db.count_devices().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_fields_keep_stored_values() {
    let db = test_db().await;
    db.upsert_device(&report("ABC123"), 1_000).await.unwrap();

    let bare = DeviceReport {
        serial_number: "ABC123".into(),
        ..DeviceReport::default()
    };
    let device = db.upsert_device(&bare, 2_000).await.unwrap().device;

    assert_eq!(device.manufacturer, "Huawei");
    assert_eq!(device.product_class, "HG8245");
    assert_eq!(device.oui.as_deref(), Some("00E0FC"));
    assert_eq!(device.software_version.as_deref(), Some("V1"));
}

#[tokio::test]
async fn unknown_identity_defaults_on_insert() {
    let db = test_db().await;
    let bare = DeviceReport {
        serial_number: "X".into(),
        ..DeviceReport::default()
    };
    let device = db.upsert_device(&bare, 1_000).await.unwrap().device;

    assert_eq!(device.manufacturer, "Unknown");
    assert_eq!(device.product_class, "Unknown");
}

#[tokio::test]
async fn boot_sets_last_boot_and_later_informs_keep_it() {
    let db = test_db().await;
    let mut booted = report("ABC123");
    booted.booted = true;
    let device = db.upsert_device(&booted, 1_000).await.unwrap().device;
    assert_eq!(device.last_boot, Some(1_000));

    let device = db.upsert_device(&report("ABC123"), 2_000).await.unwrap().device;
    assert_eq!(device.last_boot, Some(1_000));
    assert_eq!(device.last_inform, Some(2_000));
}

#[tokio::test]
async fn get_device_by_serial_and_missing() {
    let db = test_db().await;
    let id = seeded_device(&db).await;

    assert_eq!(db.get_device_by_serial("SN1").await.unwrap().id, id);
    assert_eq!(db.get_device(&id).await.unwrap().serial_number, "SN1");
    assert!(matches!(
        db.get_device_by_serial("nope").await,
        Err(DatabaseError::NotFound(_))
    ));
}

// === Parameter tests ===

#[tokio::test]
async fn inform_parameters_are_stored_and_overwritten() {
    let db = test_db().await;
    let mut first = report("SN1");
    first.parameters = vec![
        param("Device.DeviceInfo.UpTime", "10"),
        param("Device.DeviceInfo.SerialNumber", "SN1"),
    ];
    let id = db.upsert_device(&first, 1_000).await.unwrap().device.id;

    let mut second = report("SN1");
    second.parameters = vec![param("Device.DeviceInfo.UpTime", "20")];
    db.upsert_device(&second, 2_000).await.unwrap();

    let params = db.list_parameters(&id).await.unwrap();
    assert_eq!(params.len(), 2);
    let uptime = params
        .iter()
        .find(|p| p.name == "Device.DeviceInfo.UpTime")
        .unwrap();
    assert_eq!(uptime.value, "20");
    assert_eq!(uptime.updated_at, 2_000);
}

#[tokio::test]
async fn upsert_parameters_keeps_known_type() {
    let db = test_db().await;
    let id = seeded_device(&db).await;

    db.upsert_parameters(&id, &[param("A.B", "1")], 1_000)
        .await
        .unwrap();
    let untyped = ParameterValue {
        name: "A.B".into(),
        value: "2".into(),
        value_type: None,
    };
    db.upsert_parameters(&id, &[untyped], 2_000).await.unwrap();

    let params = db.list_parameters(&id).await.unwrap();
    assert_eq!(params[0].value, "2");
    assert_eq!(params[0].value_type.as_deref(), Some("xsd:string"));
}

// === Session tests ===

#[tokio::test]
async fn session_resolves_to_device() {
    let db = test_db().await;
    let id = seeded_device(&db).await;

    let session = db.open_session(&id, 1_000).await.unwrap();
    let resolved = db.resolve_session(&session, 900, 1_050).await.unwrap();
    assert_eq!(resolved.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn stale_or_unknown_session_is_absent() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    let session = db.open_session(&id, 1_000).await.unwrap();

    assert_eq!(db.resolve_session(&session, 1_001, 2_000).await.unwrap(), None);
    assert_eq!(db.resolve_session("bogus", 0, 2_000).await.unwrap(), None);
}

#[tokio::test]
async fn resolving_refreshes_last_seen() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    let session = db.open_session(&id, 1_000).await.unwrap();

    db.resolve_session(&session, 900, 1_200).await.unwrap();
    // Still live against a window that starts after the original open.
    assert!(
        db.resolve_session(&session, 1_100, 1_300)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn new_session_replaces_previous_one() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    let old = db.open_session(&id, 1_000).await.unwrap();
    let new = db.open_session(&id, 1_010).await.unwrap();

    assert_ne!(old, new);
    assert_eq!(db.resolve_session(&old, 0, 1_020).await.unwrap(), None);
    assert!(db.resolve_session(&new, 0, 1_020).await.unwrap().is_some());
}

#[tokio::test]
async fn new_session_fails_tasks_left_in_flight() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    let first = db.open_session(&id, 1_000).await.unwrap();
    db.create_task("sent", &id, "reboot", 5, None).await.unwrap();
    db.create_task("queued", &id, "reboot", 5, None).await.unwrap();
    db.start_task("sent", "req-1", &first, 1_010).await.unwrap();

    db.open_session(&id, 1_100).await.unwrap();

    let sent = db.get_task("sent").await.unwrap();
    assert_eq!(sent.status, "failed");
    assert_eq!(sent.error_message.as_deref(), Some(SESSION_ENDED_ERROR));
    assert_eq!(sent.completed_at, Some(1_100));
    assert_eq!(db.get_task("queued").await.unwrap().status, "pending");
}

#[tokio::test]
async fn new_session_leaves_other_devices_tasks_alone() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    let other = db.upsert_device(&report("SN2"), 1_000).await.unwrap().device.id;
    db.create_task("t1", &other, "reboot", 5, None).await.unwrap();
    db.start_task("t1", "req-1", "s-other", 1_010).await.unwrap();

    db.open_session(&id, 1_100).await.unwrap();

    assert_eq!(db.get_task("t1").await.unwrap().status, "in_progress");
}

// === Task tests ===

#[tokio::test]
async fn next_pending_orders_by_priority_then_age() {
    let db = test_db().await;
    let id = seeded_device(&db).await;

    db.create_task("t-low", &id, "reboot", 9, None).await.unwrap();
    db.create_task("t-high-a", &id, "reboot", 1, None).await.unwrap();
    db.create_task("t-high-b", &id, "reboot", 1, None).await.unwrap();

    let next = db.next_pending_task(&id).await.unwrap().unwrap();
    assert_eq!(next.id, "t-high-a");

    db.start_task("t-high-a", "req-1", "s1", 1_000).await.unwrap();
    let next = db.next_pending_task(&id).await.unwrap().unwrap();
    assert_eq!(next.id, "t-high-b");
}

#[tokio::test]
async fn no_pending_task_for_other_device() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    let other = db.upsert_device(&report("SN2"), 1_000).await.unwrap().device.id;
    db.create_task("t1", &id, "reboot", 5, None).await.unwrap();

    assert!(db.next_pending_task(&other).await.unwrap().is_none());
}

#[tokio::test]
async fn start_records_request_and_is_found_by_it() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    db.create_task("t1", &id, "reboot", 5, None).await.unwrap();

    assert!(db.start_task("t1", "req-1", "s1", 1_000).await.unwrap());

    let task = db.get_task_by_request("req-1").await.unwrap().unwrap();
    assert_eq!(task.id, "t1");
    assert_eq!(task.status, "in_progress");
    assert_eq!(task.started_at, Some(1_000));
    assert_eq!(task.session_id.as_deref(), Some("s1"));
    assert_eq!(db.in_progress_task(&id, "s1").await.unwrap().unwrap().id, "t1");
    assert!(db.in_progress_task(&id, "s2").await.unwrap().is_none());
}

#[tokio::test]
async fn complete_stores_result_and_parameters() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    db.create_task("t1", &id, "get_parameters", 5, Some(r#"{"parameter_names":["A.B"]}"#))
        .await
        .unwrap();
    db.start_task("t1", "req-1", "s1", 1_000).await.unwrap();

    let done = db
        .complete_task("t1", r#"{"A.B":"x"}"#, &[param("A.B", "x")], 1_100)
        .await
        .unwrap();
    assert!(done);

    let task = db.get_task("t1").await.unwrap();
    assert_eq!(task.status, "completed");
    assert_eq!(task.result.as_deref(), Some(r#"{"A.B":"x"}"#));
    assert_eq!(task.completed_at, Some(1_100));
    assert_eq!(db.list_parameters(&id).await.unwrap()[0].value, "x");
}

#[tokio::test]
async fn pending_task_can_fail_directly() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    db.create_task("t1", &id, "download", 5, None).await.unwrap();

    assert!(db.fail_task("t1", "unknown task type", 1_000).await.unwrap());

    let task = db.get_task("t1").await.unwrap();
    assert_eq!(task.status, "failed");
    assert_eq!(task.error_message.as_deref(), Some("unknown task type"));
    assert_eq!(task.started_at, None);
}

#[tokio::test]
async fn terminal_tasks_never_move() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    db.create_task("t1", &id, "reboot", 5, None).await.unwrap();
    db.start_task("t1", "req-1", "s1", 1_000).await.unwrap();
    db.complete_task("t1", "{}", &[], 1_100).await.unwrap();

    assert!(!db.fail_task("t1", "late", 1_200).await.unwrap());
    assert!(!db.start_task("t1", "req-2", "s1", 1_200).await.unwrap());
    assert!(!db.complete_task("t1", "{}", &[], 1_200).await.unwrap());
    assert_eq!(db.get_task("t1").await.unwrap().status, "completed");
}

#[tokio::test]
async fn pending_task_cannot_complete() {
    let db = test_db().await;
    let id = seeded_device(&db).await;
    db.create_task("t1", &id, "reboot", 5, None).await.unwrap();

    assert!(!db.complete_task("t1", "{}", &[], 1_000).await.unwrap());
    assert_eq!(db.get_task("t1").await.unwrap().status, "pending");
}

#[tokio::test]
async fn transition_on_missing_task_is_not_found() {
    let db = test_db().await;
    assert!(matches!(
        db.start_task("ghost", "req", "s1", 1_000).await,
        Err(DatabaseError::NotFound(_))
    ));
}
