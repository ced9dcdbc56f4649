use crate::calc::{validate_score, Stage};
use crate::error::{GradebookError, Result};
use crate::filters::{self, parse_course_filter};
use crate::ipc::helpers::{get_opt_date, get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Course;
use crate::store;
use serde_json::{json, Value};

fn list(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let filter = parse_course_filter(req.params.get("filters"))?;
    let courses = filters::apply(store::list_courses(conn, &student_id)?, |c| {
        filter.matches(c)
    });
    let records: Vec<_> = courses.iter().map(Course::record).collect();
    Ok(json!({ "courses": records }))
}

fn create(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let name = get_required_str(&req.params, "name")?;
    let registration_date = get_opt_date(&req.params, "registrationDate")?;
    let course = store::create_course(conn, &student_id, &name, registration_date)?;
    tracing::info!(student_id = %student_id, course_id = %course.id, "course created");
    Ok(json!({ "course": course.record() }))
}

fn update(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let course_id = get_required_str(&req.params, "courseId")?;
    let name = get_required_str(&req.params, "name")?;
    let registration_date = get_opt_date(&req.params, "registrationDate")?;
    let course = store::update_course(conn, &student_id, &course_id, &name, registration_date)?;
    tracing::info!(student_id = %student_id, course_id = %course_id, "course updated");
    Ok(json!({ "course": course.record() }))
}

fn delete(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let course_id = get_required_str(&req.params, "courseId")?;
    store::delete_course(conn, &student_id, &course_id)?;
    tracing::info!(student_id = %student_id, course_id = %course_id, "course deleted");
    Ok(json!({ "ok": true }))
}

fn set_grade(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let course_id = get_required_str(&req.params, "courseId")?;
    let stage = match req.params.get("stage") {
        Some(Value::String(s)) => Stage::parse(s)?,
        Some(other) => return Err(GradebookError::InvalidStage(other.to_string())),
        None => return Err(GradebookError::Validation("missing stage".into())),
    };
    let score = match req.params.get("score") {
        Some(v) => validate_score(v)?,
        None => return Err(GradebookError::Validation("missing score".into())),
    };

    let course = store::set_grade(conn, &student_id, &course_id, stage, score)?;
    let record = course.record();
    tracing::info!(
        course_id = %course_id,
        stage = %stage,
        score,
        status = record.status.as_str(),
        "grade recorded"
    );
    Ok(json!({ "course": record }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "courses.list" => Some(respond(req, list(state, req))),
        "courses.create" => Some(respond(req, create(state, req))),
        "courses.update" => Some(respond(req, update(state, req))),
        "courses.delete" => Some(respond(req, delete(state, req))),
        "courses.setGrade" => Some(respond(req, set_grade(state, req))),
        _ => None,
    }
}
