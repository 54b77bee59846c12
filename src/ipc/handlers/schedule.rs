use crate::ipc::error::{err, err_schedule, ok};
use crate::ipc::helpers::{
    db_conn, load_holiday_calendar, opt_str, parse_iso_date, required_date, required_weekday,
    today_param,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{self, ScheduleConfig};
use serde_json::json;

fn handle_schedule_project(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let start_date = match required_date(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target_weekday = match required_weekday(req, "dayOfWeek") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let total_meetings = match req.params.get("totalMeetings").and_then(|v| v.as_i64()) {
        Some(v) if v >= 0 => v as u32,
        Some(_) => return err(&req.id, "bad_params", "totalMeetings must not be negative", None),
        None => return err(&req.id, "bad_params", "missing totalMeetings", None),
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let config = ScheduleConfig {
        start_date,
        target_weekday,
        total_meetings,
    };
    match schedule::enumerate_meetings(&config, &calendar) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => err_schedule(&req.id, e),
    }
}

fn handle_schedule_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let today = match today_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Lenient config guard: a class without a start date or with a
    // non-positive meeting count reads as 0% rather than an error.
    let start_raw = opt_str(req, "startDate");
    let total_meetings = req
        .params
        .get("totalMeetings")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let start_raw = match start_raw {
        Some(raw) if total_meetings > 0 => raw,
        _ => {
            return ok(
                &req.id,
                json!({ "progress": 0, "meetingsPassed": 0, "totalMeetings": total_meetings.max(0) }),
            )
        }
    };
    let start_date = match parse_iso_date(&start_raw) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("startDate: {}", m), None),
    };
    let target_weekday = match required_weekday(req, "dayOfWeek") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let config = ScheduleConfig {
        start_date,
        target_weekday,
        total_meetings: total_meetings as u32,
    };
    match schedule::compute_progress(&config, &calendar, today) {
        Ok(report) => ok(&req.id, serde_json::to_value(report).unwrap_or_default()),
        Err(e) => err_schedule(&req.id, e),
    }
}

fn handle_schedule_validate_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let start_date = match required_date(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let today = match today_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match schedule::validate_start_date(start_date, &calendar, today) {
        Ok(()) => ok(&req.id, json!({ "valid": true })),
        Err(e) => err_schedule(&req.id, e),
    }
}

fn handle_schedule_estimate_end(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let start_date = match required_date(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let effective_days = match req.params.get("effectiveDays").and_then(|v| v.as_i64()) {
        Some(v) if v > 0 => v as u32,
        _ => {
            return err(
                &req.id,
                "bad_params",
                "effectiveDays must be a positive integer",
                None,
            )
        }
    };
    let calendar = match load_holiday_calendar(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match schedule::estimate_end_date(start_date, effective_days, &calendar) {
        Ok(end) => ok(&req.id, json!({ "endDate": end.to_string() })),
        Err(e) => err_schedule(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.project" => Some(handle_schedule_project(state, req)),
        "schedule.progress" => Some(handle_schedule_progress(state, req)),
        "schedule.validateStart" => Some(handle_schedule_validate_start(state, req)),
        "schedule.estimateEnd" => Some(handle_schedule_estimate_end(state, req)),
        _ => None,
    }
}
