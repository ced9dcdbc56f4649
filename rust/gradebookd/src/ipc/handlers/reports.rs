use crate::error::Result;
use crate::ipc::helpers::{get_opt_str, get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::{reports, store};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Writes the sheet to `outPath` when given, creating parent directories.
fn maybe_write(out_path: Option<&str>, csv: &str) -> Result<()> {
    let Some(path) = out_path else {
        return Ok(());
    };
    let out = PathBuf::from(path);
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, csv)?;
    Ok(())
}

fn student_csv(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let out_path = get_opt_str(&req.params, "outPath")?;
    let student = store::get_student(conn, &student_id)?;
    let (csv, rows) = reports::student_csv(&student);
    maybe_write(out_path.as_deref(), &csv)?;
    Ok(json!({ "csv": csv, "rows": rows, "path": out_path }))
}

fn class_csv(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let out_path = get_opt_str(&req.params, "outPath")?;
    let students = store::list_students(conn)?;
    let (csv, rows) = reports::class_csv(&students);
    maybe_write(out_path.as_deref(), &csv)?;
    Ok(json!({ "csv": csv, "rows": rows, "path": out_path }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.studentCsv" => Some(respond(req, student_csv(state, req))),
        "reports.classCsv" => Some(respond(req, class_csv(state, req))),
        _ => None,
    }
}
