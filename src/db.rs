use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Indonesian public holidays, 2025 edition. Seeded into fresh workspaces;
/// `holidays.replace` swaps in another year's table at runtime.
const DEFAULT_HOLIDAYS_2025: &[(&str, &str)] = &[
    ("2025-01-01", "Tahun Baru Masehi"),
    ("2025-01-29", "Tahun Baru Imlek"),
    ("2025-03-29", "Hari Raya Nyepi"),
    ("2025-03-31", "Idul Fitri"),
    ("2025-04-01", "Cuti Bersama Idul Fitri"),
    ("2025-05-01", "Hari Buruh Internasional"),
    ("2025-05-12", "Hari Raya Waisak"),
    ("2025-05-29", "Kenaikan Isa Almasih"),
    ("2025-06-01", "Hari Lahir Pancasila"),
    ("2025-06-07", "Idul Adha"),
    ("2025-06-27", "Tahun Baru Islam"),
    ("2025-08-17", "Hari Kemerdekaan RI"),
    ("2025-09-05", "Maulid Nabi Muhammad SAW"),
    ("2025-12-25", "Hari Raya Natal"),
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("didacticboard.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subject TEXT NOT NULL,
            teacher_id TEXT,
            schedule_label TEXT NOT NULL DEFAULT '',
            student_count INTEGER NOT NULL DEFAULT 0,
            start_date TEXT,
            day_of_week INTEGER,
            total_meetings INTEGER,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    // Early workspaces carried classes without the schedule projection
    // columns. Add and leave NULL; progress then reads as 0.
    ensure_classes_schedule_columns(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS holidays(
            date TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculums(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subject TEXT NOT NULL,
            level TEXT NOT NULL,
            total_days INTEGER NOT NULL,
            start_date TEXT NOT NULL,
            modules_json TEXT NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_curriculums_subject ON curriculums(subject)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    seed_default_holidays(&conn)?;

    Ok(conn)
}

fn ensure_classes_schedule_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "classes", "start_date")? {
        conn.execute("ALTER TABLE classes ADD COLUMN start_date TEXT", [])?;
    }
    if !table_has_column(conn, "classes", "day_of_week")? {
        conn.execute("ALTER TABLE classes ADD COLUMN day_of_week INTEGER", [])?;
    }
    if !table_has_column(conn, "classes", "total_meetings")? {
        conn.execute("ALTER TABLE classes ADD COLUMN total_meetings INTEGER", [])?;
    }
    Ok(())
}

fn seed_default_holidays(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM holidays", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }
    for (date, name) in DEFAULT_HOLIDAYS_2025 {
        conn.execute(
            "INSERT OR IGNORE INTO holidays(date, name) VALUES(?, ?)",
            (date, name),
        )?;
    }
    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
