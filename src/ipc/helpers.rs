use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::schedule::HolidayCalendar;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn opt_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a valid YYYY-MM-DD date", raw.trim()))
}

pub fn required_date(req: &Request, key: &str) -> Result<NaiveDate, serde_json::Value> {
    let raw = required_str(req, key)?;
    parse_iso_date(&raw).map_err(|m| err(&req.id, "bad_params", format!("{}: {}", key, m), None))
}

pub fn opt_date(req: &Request, key: &str) -> Result<Option<NaiveDate>, serde_json::Value> {
    match opt_str(req, key) {
        Some(raw) => parse_iso_date(&raw)
            .map(Some)
            .map_err(|m| err(&req.id, "bad_params", format!("{}: {}", key, m), None)),
        None => Ok(None),
    }
}

/// "Today" for progress/validation requests: explicit param when supplied
/// (tests and replays pin it), otherwise the process-local date.
pub fn today_param(req: &Request) -> Result<NaiveDate, serde_json::Value> {
    match opt_date(req, "today")? {
        Some(date) => Ok(date),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

pub fn required_weekday(req: &Request, key: &str) -> Result<u32, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|v| (0..=6).contains(v))
        .map(|v| v as u32)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a weekday index 0 (Sunday) .. 6 (Saturday)", key),
                None,
            )
        })
}

pub fn load_holiday_calendar(conn: &Connection) -> Result<HolidayCalendar, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT date, name FROM holidays")?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (date_raw, name) = row?;
        // Rows are validated on insert; tolerate stray garbage rather than
        // failing every projection over one bad date.
        if let Ok(date) = parse_iso_date(&date_raw) {
            entries.push((date, name));
        }
    }
    Ok(HolidayCalendar::new(entries))
}

pub fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
