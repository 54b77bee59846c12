use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, parse_iso_date};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_holidays_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "holidays": [] }));
    };

    let mut stmt = match conn.prepare("SELECT date, name FROM holidays ORDER BY date") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "date": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(holidays) => ok(&req.id, json!({ "holidays": holidays })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Swap the whole table in one transaction. The holiday list is a versioned
/// external dataset (one year's public holidays); partial edits are not a
/// supported operation.
fn handle_holidays_replace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let Some(raw) = req.params.get("holidays").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "holidays must be an array", None);
    };

    let mut rows: Vec<(String, String)> = Vec::with_capacity(raw.len());
    for item in raw {
        let date_raw = item.get("date").and_then(|v| v.as_str()).unwrap_or("");
        let name = item
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let date = match parse_iso_date(date_raw) {
            Ok(d) => d,
            Err(m) => return err(&req.id, "bad_params", m, None),
        };
        if name.is_empty() {
            return err(
                &req.id,
                "bad_params",
                format!("holiday {} is missing a name", date),
                None,
            );
        }
        rows.push((date.to_string(), name));
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute("DELETE FROM holidays", []) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    for (date, name) in &rows {
        if let Err(e) = tx.execute(
            "INSERT OR REPLACE INTO holidays(date, name) VALUES(?, ?)",
            (date, name),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "holidays" })),
            );
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "count": rows.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "holidays.list" => Some(handle_holidays_list(state, req)),
        "holidays.replace" => Some(handle_holidays_replace(state, req)),
        _ => None,
    }
}
