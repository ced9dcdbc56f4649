use crate::error::Result;
use crate::filters::{self, parse_student_filter};
use crate::ipc::helpers::{get_opt_date, get_opt_str, get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::{IdType, Student};
use crate::store::{self, NewStudent, StudentPatch};
use serde_json::{json, Value};

fn list(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let filter = parse_student_filter(req.params.get("filters"))?;
    let students = filters::apply(store::list_students(conn)?, |s| filter.matches(s));
    let records: Vec<_> = students.iter().map(Student::record).collect();
    Ok(json!({ "students": records }))
}

fn get(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let student = store::get_student(conn, &student_id)?;
    Ok(json!({ "student": student.record() }))
}

fn create(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let name = get_required_str(&req.params, "name")?;
    let id_type = IdType::parse(&get_required_str(&req.params, "idType")?)?;
    let identifier = get_required_str(&req.params, "identifier")?;
    let registration_date = get_opt_date(&req.params, "registrationDate")?;

    let student = store::create_student(
        conn,
        NewStudent {
            name,
            id_type,
            identifier,
            registration_date,
        },
    )?;
    tracing::info!(student_id = %student.id, "student created");
    Ok(json!({ "student": student.record() }))
}

fn update(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let patch = StudentPatch {
        name: get_opt_str(&req.params, "name")?,
        id_type: get_opt_str(&req.params, "idType")?
            .map(|s| IdType::parse(&s))
            .transpose()?,
        identifier: get_opt_str(&req.params, "identifier")?,
        registration_date: get_opt_date(&req.params, "registrationDate")?,
    };
    let student = store::update_student(conn, &student_id, patch)?;
    tracing::info!(student_id = %student.id, "student updated");
    Ok(json!({ "student": student.record() }))
}

fn delete(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    store::delete_student(conn, &student_id)?;
    tracing::info!(student_id = %student_id, "student deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(req, list(state, req))),
        "students.get" => Some(respond(req, get(state, req))),
        "students.create" => Some(respond(req, create(state, req))),
        "students.update" => Some(respond(req, update(state, req))),
        "students.delete" => Some(respond(req, delete(state, req))),
        _ => None,
    }
}
