use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Curriculum,
    Classes,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "curriculum" => Some(Self::Curriculum),
            "classes" => Some(Self::Classes),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Curriculum => "setup.curriculum",
            Self::Classes => "setup.classes",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Curriculum => json!({
            "defaultDurationJp": 2,
            "defaultTotalMeetings": 16
        }),
        SetupSection::Classes => json!({
            "defaultStudentCount": 30,
            "defaultScheduleTime": "08:00 WIB"
        }),
    }
}

fn parse_positive_int(value: &Value, key: &str) -> Result<i64, String> {
    value
        .as_i64()
        .filter(|v| *v > 0)
        .ok_or_else(|| format!("{} must be a positive integer", key))
}

fn parse_nonempty_string(value: &Value, key: &str) -> Result<String, String> {
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("{} must be a non-empty string", key))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Curriculum => match k.as_str() {
                "defaultDurationJp" | "defaultTotalMeetings" => {
                    obj.insert(k.clone(), Value::from(parse_positive_int(v, k)?));
                }
                _ => return Err(format!("unknown curriculum field: {}", k)),
            },
            SetupSection::Classes => match k.as_str() {
                "defaultStudentCount" => {
                    obj.insert(k.clone(), Value::from(parse_positive_int(v, k)?));
                }
                "defaultScheduleTime" => {
                    obj.insert(k.clone(), Value::String(parse_nonempty_string(v, k)?));
                }
                _ => return Err(format!("unknown classes field: {}", k)),
            },
        }
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct ClassesSetupDefaults {
    pub default_student_count: i64,
    pub default_schedule_time: String,
}

pub fn load_classes_setup_defaults(conn: &rusqlite::Connection) -> ClassesSetupDefaults {
    let obj = db::settings_get_json(conn, "setup.classes")
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let default_student_count = obj
        .get("defaultStudentCount")
        .and_then(|v| v.as_i64())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    let default_schedule_time = obj
        .get("defaultScheduleTime")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "08:00 WIB".to_string());
    ClassesSetupDefaults {
        default_student_count,
        default_schedule_time,
    }
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block setup UI.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let curriculum = match load_section(conn, SetupSection::Curriculum) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let classes = match load_section(conn, SetupSection::Classes) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "curriculum": curriculum,
            "classes": classes
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
