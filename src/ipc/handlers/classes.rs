use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, load_holiday_calendar, now_ts, opt_str, parse_iso_date, required_str, today_param,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{self, HolidayCalendar, ScheduleConfig};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const DAY_NAMES: [&str; 7] = [
    "Minggu", "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu",
];

fn schedule_label(day_of_week: i64, schedule_time: &str) -> String {
    let name = DAY_NAMES
        .get(day_of_week as usize)
        .copied()
        .unwrap_or(DAY_NAMES[0]);
    format!("{}, {}", name, schedule_time)
}

/// Progress is derived on every read; it is never stored on the row. A
/// class without a schedule config reads as 0, and a config the projector
/// rejects reads as null so the list view can flag it.
fn class_progress(
    calendar: &HolidayCalendar,
    start_date: Option<&str>,
    day_of_week: Option<i64>,
    total_meetings: Option<i64>,
    today: NaiveDate,
) -> serde_json::Value {
    let (start_raw, dow, total) = match (start_date, day_of_week, total_meetings) {
        (Some(s), Some(d), Some(t)) => (s, d, t),
        _ => return json!(0),
    };
    if total <= 0 || !(0..=6).contains(&dow) {
        return json!(0);
    }
    let start = match parse_iso_date(start_raw) {
        Ok(v) => v,
        Err(_) => return json!(0),
    };
    let config = ScheduleConfig {
        start_date: start,
        target_weekday: dow as u32,
        total_meetings: total as u32,
    };
    match schedule::compute_progress(&config, calendar, today) {
        Ok(report) => json!(report.progress),
        Err(_) => serde_json::Value::Null,
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    let today = match today_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut stmt = match conn.prepare(
        "SELECT id, name, subject, teacher_id, schedule_label, student_count,
                start_date, day_of_week, total_meetings
         FROM classes
         ORDER BY name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| {
            let start_date: Option<String> = r.get(6)?;
            let day_of_week: Option<i64> = r.get(7)?;
            let total_meetings: Option<i64> = r.get(8)?;
            let progress = class_progress(
                &calendar,
                start_date.as_deref(),
                day_of_week,
                total_meetings,
                today,
            );
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "subject": r.get::<_, String>(2)?,
                "teacherId": r.get::<_, Option<String>>(3)?,
                "scheduleLabel": r.get::<_, String>(4)?,
                "studentCount": r.get::<_, i64>(5)?,
                "startDate": start_date,
                "dayOfWeek": day_of_week,
                "totalMeetings": total_meetings,
                "progress": progress,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = opt_str(req, "teacherId");

    let class_defaults = super::setup::load_classes_setup_defaults(conn);
    let student_count = req
        .params
        .get("studentCount")
        .and_then(|v| v.as_i64())
        .filter(|v| *v >= 0)
        .unwrap_or(class_defaults.default_student_count);

    // The schedule config travels as a group; a class may be created
    // without one and gains it later through classes.update.
    let start_date = match opt_str(req, "startDate") {
        Some(raw) => match parse_iso_date(&raw) {
            Ok(d) => Some(d),
            Err(m) => return err(&req.id, "bad_params", format!("startDate: {}", m), None),
        },
        None => None,
    };
    let day_of_week = match req.params.get("dayOfWeek").and_then(|v| v.as_i64()) {
        Some(v) if (0..=6).contains(&v) => Some(v),
        Some(_) => {
            return err(
                &req.id,
                "bad_params",
                "dayOfWeek must be a weekday index 0 (Sunday) .. 6 (Saturday)",
                None,
            )
        }
        None => None,
    };
    if start_date.is_some() && day_of_week.is_none() {
        return err(
            &req.id,
            "bad_params",
            "dayOfWeek is required when startDate is set",
            None,
        );
    }
    let curriculum_defaults = super::curriculum::load_curriculum_setup_defaults(conn);
    let total_meetings = match req.params.get("totalMeetings").and_then(|v| v.as_i64()) {
        Some(v) if v > 0 => Some(v),
        Some(_) => return err(&req.id, "bad_params", "totalMeetings must be positive", None),
        None => start_date.map(|_| curriculum_defaults.default_total_meetings),
    };

    let label = day_of_week
        .map(|dow| schedule_label(dow, &class_defaults.default_schedule_time))
        .unwrap_or_default();

    let class_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name, subject, teacher_id, schedule_label, student_count,
                             start_date, day_of_week, total_meetings, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            class_id,
            name,
            subject,
            teacher_id,
            label,
            student_count,
            start_date.map(|d| d.to_string()),
            day_of_week,
            total_meetings,
            ts,
            ts
        ],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    let today = match today_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let progress = class_progress(
        &calendar,
        start_date.map(|d| d.to_string()).as_deref(),
        day_of_week,
        total_meetings,
        today,
    );

    ok(
        &req.id,
        json!({
            "classId": class_id,
            "name": name,
            "scheduleLabel": label,
            "progress": progress
        }),
    )
}

struct ClassRow {
    name: String,
    subject: String,
    teacher_id: Option<String>,
    schedule_label: String,
    student_count: i64,
    start_date: Option<String>,
    day_of_week: Option<i64>,
    total_meetings: Option<i64>,
}

fn load_class_row(
    conn: &rusqlite::Connection,
    class_id: &str,
) -> Result<Option<ClassRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT name, subject, teacher_id, schedule_label, student_count,
                start_date, day_of_week, total_meetings
         FROM classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(ClassRow {
                name: r.get(0)?,
                subject: r.get(1)?,
                teacher_id: r.get(2)?,
                schedule_label: r.get(3)?,
                student_count: r.get(4)?,
                start_date: r.get(5)?,
                day_of_week: r.get(6)?,
                total_meetings: r.get(7)?,
            })
        },
    )
    .optional()
}

fn handle_classes_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let today = match today_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row = match load_class_row(conn, &class_id) {
        Ok(Some(r)) => r,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let progress = class_progress(
        &calendar,
        row.start_date.as_deref(),
        row.day_of_week,
        row.total_meetings,
        today,
    );

    ok(
        &req.id,
        json!({
            "class": {
                "id": class_id,
                "name": row.name,
                "subject": row.subject,
                "teacherId": row.teacher_id,
                "scheduleLabel": row.schedule_label,
                "studentCount": row.student_count,
                "startDate": row.start_date,
                "dayOfWeek": row.day_of_week,
                "totalMeetings": row.total_meetings,
                "progress": progress,
            }
        }),
    )
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut row = match load_class_row(conn, &class_id) {
        Ok(Some(r)) => r,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    for (key, value) in patch {
        match key.as_str() {
            "name" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => row.name = v.to_string(),
                None => return err(&req.id, "bad_params", "name must be a non-empty string", None),
            },
            "subject" => match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => row.subject = v.to_string(),
                None => {
                    return err(&req.id, "bad_params", "subject must be a non-empty string", None)
                }
            },
            "teacherId" => {
                row.teacher_id = value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
            }
            "studentCount" => match value.as_i64().filter(|v| *v >= 0) {
                Some(v) => row.student_count = v,
                None => {
                    return err(
                        &req.id,
                        "bad_params",
                        "studentCount must be a non-negative integer",
                        None,
                    )
                }
            },
            "startDate" => {
                if value.is_null() {
                    row.start_date = None;
                } else {
                    match value.as_str().map(parse_iso_date) {
                        Some(Ok(d)) => row.start_date = Some(d.to_string()),
                        _ => {
                            return err(
                                &req.id,
                                "bad_params",
                                "startDate must be a YYYY-MM-DD date or null",
                                None,
                            )
                        }
                    }
                }
            }
            "dayOfWeek" => match value.as_i64().filter(|v| (0..=6).contains(v)) {
                Some(v) => row.day_of_week = Some(v),
                None => {
                    return err(
                        &req.id,
                        "bad_params",
                        "dayOfWeek must be a weekday index 0 (Sunday) .. 6 (Saturday)",
                        None,
                    )
                }
            },
            "totalMeetings" => match value.as_i64().filter(|v| *v > 0) {
                Some(v) => row.total_meetings = Some(v),
                None => {
                    return err(&req.id, "bad_params", "totalMeetings must be positive", None)
                }
            },
            _ => return err(&req.id, "bad_params", format!("unknown field: {}", key), None),
        }
    }

    if row.start_date.is_some() && row.day_of_week.is_none() {
        return err(
            &req.id,
            "bad_params",
            "dayOfWeek is required when startDate is set",
            None,
        );
    }

    let class_defaults = super::setup::load_classes_setup_defaults(conn);
    row.schedule_label = row
        .day_of_week
        .map(|dow| schedule_label(dow, &class_defaults.default_schedule_time))
        .unwrap_or_default();

    if let Err(e) = conn.execute(
        "UPDATE classes
         SET name = ?, subject = ?, teacher_id = ?, schedule_label = ?, student_count = ?,
             start_date = ?, day_of_week = ?, total_meetings = ?, updated_at = ?
         WHERE id = ?",
        params![
            row.name,
            row.subject,
            row.teacher_id,
            row.schedule_label,
            row.student_count,
            row.start_date,
            row.day_of_week,
            row.total_meetings,
            now_ts(),
            class_id
        ],
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    let today = match today_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let progress = class_progress(
        &calendar,
        row.start_date.as_deref(),
        row.day_of_week,
        row.total_meetings,
        today,
    );

    ok(
        &req.id,
        json!({
            "classId": class_id,
            "scheduleLabel": row.schedule_label,
            "progress": progress
        }),
    )
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let deleted = match conn.execute("DELETE FROM classes WHERE id = ?", [&class_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "class not found", None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.open" => Some(handle_classes_open(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
