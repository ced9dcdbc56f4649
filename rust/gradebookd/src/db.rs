use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!("failed to create workspace {}", workspace.to_string_lossy())
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    migrate(&conn)?;
    Ok(conn)
}

/// Creates the schema if missing.
pub fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            id_type TEXT NOT NULL,
            identifier TEXT NOT NULL,
            registration_date TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(id_type, identifier)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            name TEXT NOT NULL,
            registration_date TEXT NOT NULL,
            score_e1 REAL,
            score_e2 REAL,
            score_e3 REAL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_student_sort ON courses(student_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admin(
            username TEXT PRIMARY KEY,
            pwd_scheme TEXT NOT NULL,
            iterations INTEGER NOT NULL,
            salt TEXT NOT NULL,
            pwd_hash TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            token TEXT PRIMARY KEY,
            expires_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}
