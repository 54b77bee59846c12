use crate::db;
use crate::ipc::error::{err, err_schedule, ok};
use crate::ipc::helpers::{
    db_conn, load_holiday_calendar, now_ts, opt_str, required_date, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{self, TopicDescriptor};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct CurriculumSetupDefaults {
    pub default_duration_jp: i64,
    pub default_total_meetings: i64,
}

/// Defaults for the generator form, overridable through `setup.update`.
/// 2 JP per session and 16 meetings mirror the product's form defaults.
pub fn load_curriculum_setup_defaults(conn: &Connection) -> CurriculumSetupDefaults {
    let obj = db::settings_get_json(conn, "setup.curriculum")
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let default_duration_jp = obj
        .get("defaultDurationJp")
        .and_then(|v| v.as_i64())
        .filter(|v| *v > 0)
        .unwrap_or(2);
    let default_total_meetings = obj
        .get("defaultTotalMeetings")
        .and_then(|v| v.as_i64())
        .filter(|v| *v > 0)
        .unwrap_or(16);
    CurriculumSetupDefaults {
        default_duration_jp,
        default_total_meetings,
    }
}

fn parse_topics(req: &Request) -> Result<Vec<TopicDescriptor>, serde_json::Value> {
    let raw = req
        .params
        .get("topics")
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing topics", None))?;
    serde_json::from_value::<Vec<TopicDescriptor>>(raw)
        .map_err(|e| err(&req.id, "bad_params", format!("topics: {}", e), None))
}

fn parse_modules_array(req: &Request) -> Result<String, serde_json::Value> {
    let raw = req
        .params
        .get("modules")
        .and_then(|v| v.as_array())
        .ok_or_else(|| err(&req.id, "bad_params", "modules must be an array", None))?;
    serde_json::to_string(raw).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

fn required_positive_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a positive integer", key),
                None,
            )
        })
}

fn handle_curriculum_bind(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let start_date = match required_date(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let topics = match parse_topics(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let setup = load_curriculum_setup_defaults(conn);
    let default_duration = req
        .params
        .get("defaultDuration")
        .and_then(|v| v.as_i64())
        .filter(|v| *v > 0)
        .unwrap_or(setup.default_duration_jp);
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match schedule::bind_topics_to_calendar(&topics, start_date, &calendar, default_duration) {
        Ok(modules) => ok(
            &req.id,
            json!({ "modules": modules, "defaultDuration": default_duration }),
        ),
        Err(e) => err_schedule(&req.id, e),
    }
}

fn handle_curriculum_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let level = match required_str(req, "level") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let total_days = match required_positive_i64(req, "totalDays") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_date = match required_date(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let modules_json = match parse_modules_array(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name =
        opt_str(req, "name").unwrap_or_else(|| format!("Kurikulum {} ({})", subject, level));

    let curriculum_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO curriculums(id, name, subject, level, total_days, start_date, modules_json, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            curriculum_id,
            name,
            subject,
            level,
            total_days,
            start_date.to_string(),
            modules_json,
            ts,
            ts
        ],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "curriculums" })),
        );
    }

    ok(&req.id, json!({ "curriculumId": curriculum_id, "name": name }))
}

fn handle_curriculum_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let curriculum_id = match required_str(req, "curriculumId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let level = match required_str(req, "level") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let total_days = match required_positive_i64(req, "totalDays") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_date = match required_date(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let modules_json = match parse_modules_array(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name =
        opt_str(req, "name").unwrap_or_else(|| format!("Kurikulum {} ({})", subject, level));

    let updated = match conn.execute(
        "UPDATE curriculums
         SET name = ?, subject = ?, level = ?, total_days = ?, start_date = ?, modules_json = ?, updated_at = ?
         WHERE id = ?",
        params![
            name,
            subject,
            level,
            total_days,
            start_date.to_string(),
            modules_json,
            now_ts(),
            curriculum_id
        ],
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if updated == 0 {
        return err(&req.id, "not_found", "curriculum not found", None);
    }

    ok(&req.id, json!({ "curriculumId": curriculum_id, "name": name }))
}

fn handle_curriculum_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "curriculums": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT id, name, subject, level, total_days, start_date, modules_json, created_at, updated_at
         FROM curriculums
         ORDER BY created_at DESC, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| {
            let modules_raw: String = r.get(6)?;
            let module_count = serde_json::from_str::<Vec<serde_json::Value>>(&modules_raw)
                .map(|m| m.len())
                .unwrap_or(0);
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "subject": r.get::<_, String>(2)?,
                "level": r.get::<_, String>(3)?,
                "totalDays": r.get::<_, i64>(4)?,
                "startDate": r.get::<_, String>(5)?,
                "moduleCount": module_count,
                "createdAt": r.get::<_, Option<String>>(7)?,
                "updatedAt": r.get::<_, Option<String>>(8)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(curriculums) => ok(&req.id, json!({ "curriculums": curriculums })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_curriculum_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let curriculum_id = match required_str(req, "curriculumId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row = conn
        .query_row(
            "SELECT id, name, subject, level, total_days, start_date, modules_json, created_at, updated_at
             FROM curriculums
             WHERE id = ?",
            [&curriculum_id],
            |r| {
                let modules_raw: String = r.get(6)?;
                let modules = serde_json::from_str::<serde_json::Value>(&modules_raw)
                    .unwrap_or_else(|_| json!([]));
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                    "subject": r.get::<_, String>(2)?,
                    "level": r.get::<_, String>(3)?,
                    "totalDays": r.get::<_, i64>(4)?,
                    "startDate": r.get::<_, String>(5)?,
                    "modules": modules,
                    "createdAt": r.get::<_, Option<String>>(7)?,
                    "updatedAt": r.get::<_, Option<String>>(8)?,
                }))
            },
        )
        .optional();

    match row {
        Ok(Some(curriculum)) => ok(&req.id, json!({ "curriculum": curriculum })),
        Ok(None) => err(&req.id, "not_found", "curriculum not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_curriculum_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let curriculum_id = match required_str(req, "curriculumId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let deleted = match conn.execute("DELETE FROM curriculums WHERE id = ?", [&curriculum_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "curriculum not found", None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "curriculum.bind" => Some(handle_curriculum_bind(state, req)),
        "curriculum.save" => Some(handle_curriculum_save(state, req)),
        "curriculum.update" => Some(handle_curriculum_update(state, req)),
        "curriculum.list" => Some(handle_curriculum_list(state, req)),
        "curriculum.open" => Some(handle_curriculum_open(state, req)),
        "curriculum.delete" => Some(handle_curriculum_delete(state, req)),
        _ => None,
    }
}
