mod test_support;

use serde_json::json;
use test_support::{replace_holidays, request_err, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn class_progress_is_derived_from_its_schedule_config() {
    let workspace = temp_dir("didactic-classes");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    replace_holidays(
        &mut stdin,
        &mut reader,
        json!([{ "date": "2025-01-13", "name": "Test Holiday" }]),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({
            "name": "X-IPA-1",
            "subject": "Fisika Dasar",
            "studentCount": 32,
            "startDate": "2025-01-06",
            "dayOfWeek": 1,
            "totalMeetings": 3,
            "today": "2025-01-15"
        }),
    );
    let class_id = created
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    assert_eq!(
        created.get("scheduleLabel").and_then(|v| v.as_str()),
        Some("Senin, 08:00 WIB")
    );
    assert_eq!(created.get("progress").and_then(|v| v.as_i64()), Some(33));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.list",
        json!({ "today": "2025-01-15" }),
    );
    let classes = listed
        .get("classes")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("classes");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].get("progress").and_then(|v| v.as_i64()), Some(33));
    assert_eq!(
        classes[0].get("studentCount").and_then(|v| v.as_i64()),
        Some(32)
    );

    // Same row, later date: progress moves without any write.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.list",
        json!({ "today": "2025-02-01" }),
    );
    let classes = listed
        .get("classes")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("classes");
    assert_eq!(classes[0].get("progress").and_then(|v| v.as_i64()), Some(100));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.open",
        json!({ "classId": class_id, "today": "2025-01-15" }),
    );
    assert_eq!(
        opened.pointer("/class/progress").and_then(|v| v.as_i64()),
        Some(33)
    );
}

#[test]
fn class_update_reshapes_label_and_schedule() {
    let workspace = temp_dir("didactic-classes-update");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    replace_holidays(&mut stdin, &mut reader, json!([]));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({
            "name": "XI-IPS-2",
            "subject": "Sejarah Indonesia",
            "startDate": "2025-01-07",
            "dayOfWeek": 2,
            "totalMeetings": 14
        }),
    );
    let class_id = created
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    assert_eq!(
        created.get("scheduleLabel").and_then(|v| v.as_str()),
        Some("Selasa, 08:00 WIB")
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.update",
        json!({
            "classId": class_id,
            "patch": { "dayOfWeek": 3, "startDate": "2025-02-05", "totalMeetings": 12 },
            "today": "2025-01-02"
        }),
    );
    assert_eq!(
        updated.get("scheduleLabel").and_then(|v| v.as_str()),
        Some("Rabu, 08:00 WIB")
    );
    assert_eq!(updated.get("progress").and_then(|v| v.as_i64()), Some(0));

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "classes.update",
        json!({ "classId": class_id, "patch": { "dayOfWeek": 9 } }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("bad_params"));
}

#[test]
fn class_without_schedule_reads_zero_progress() {
    let workspace = temp_dir("didactic-classes-noschedule");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "XII-BHS", "subject": "Bahasa Inggris" }),
    );
    assert_eq!(created.get("progress").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(created.get("scheduleLabel").and_then(|v| v.as_str()), Some(""));

    let class_id = created
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "classes.open",
        json!({ "classId": class_id }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_found"));
}
