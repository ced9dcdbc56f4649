use crate::calc::{check_score, Stage, StageScores};
use crate::error::{GradebookError, Result};
use crate::model::{today, Course, IdType, Student};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    pub id_type: IdType,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<NaiveDate>,
}

/// Partial student update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_type: Option<IdType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<NaiveDate>,
}

fn required_text(field: &str, raw: &str) -> Result<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(GradebookError::Validation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(t.to_string())
}

fn stage_column(stage: Stage) -> &'static str {
    match stage {
        Stage::E1 => "score_e1",
        Stage::E2 => "score_e2",
        Stage::E3 => "score_e3",
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let id_type: String = row.get(2)?;
    let id_type = IdType::parse(&id_type).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.to_string().into())
    })?;
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        id_type,
        identifier: row.get(3)?,
        registration_date: row.get(4)?,
        courses: Vec::new(),
    })
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        student_id: row.get(1)?,
        name: row.get(2)?,
        registration_date: row.get(3)?,
        scores: StageScores::new(row.get(4)?, row.get(5)?, row.get(6)?),
    })
}

const STUDENT_COLS: &str = "id, name, id_type, identifier, registration_date";
const COURSE_COLS: &str =
    "id, student_id, name, registration_date, score_e1, score_e2, score_e3";

fn load_courses(conn: &Connection, student_id: &str) -> Result<Vec<Course>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COURSE_COLS} FROM courses WHERE student_id = ? ORDER BY sort_order"
    ))?;
    let rows = stmt
        .query_map([student_id], course_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All students with their courses, in insertion order.
pub fn list_students(conn: &Connection) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDENT_COLS} FROM students ORDER BY sort_order"
    ))?;
    let mut students = stmt
        .query_map([], student_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for s in students.iter_mut() {
        s.courses = load_courses(conn, &s.id)?;
    }
    Ok(students)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Student> {
    let student = conn
        .query_row(
            &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
            [student_id],
            student_from_row,
        )
        .optional()?;
    let Some(mut student) = student else {
        return Err(GradebookError::NotFound("student not found".into()));
    };
    student.courses = load_courses(conn, student_id)?;
    Ok(student)
}

fn ensure_student_exists(conn: &Connection, student_id: &str) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(GradebookError::NotFound("student not found".into()));
    }
    Ok(())
}

fn ensure_identifier_free(
    conn: &Connection,
    id_type: IdType,
    identifier: &str,
    except_id: Option<&str>,
) -> Result<()> {
    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM students WHERE id_type = ? AND identifier = ?",
            (id_type.as_str(), identifier),
            |r| r.get(0),
        )
        .optional()?;
    match taken {
        Some(id) if Some(id.as_str()) != except_id => Err(GradebookError::Conflict(format!(
            "a student with {} {} already exists",
            id_type.as_str(),
            identifier
        ))),
        _ => Ok(()),
    }
}

pub fn create_student(conn: &Connection, new: NewStudent) -> Result<Student> {
    let name = required_text("name", &new.name)?;
    let identifier = required_text("identifier", &new.identifier)?;
    let registration_date = new.registration_date.unwrap_or_else(today);
    ensure_identifier_free(conn, new.id_type, &identifier, None)?;

    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
        [],
        |r| r.get(0),
    )?;
    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(
           id, name, id_type, identifier, registration_date, sort_order, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &student_id,
            &name,
            new.id_type.as_str(),
            &identifier,
            registration_date,
            sort_order,
        ),
    )?;

    Ok(Student {
        id: student_id,
        name,
        id_type: new.id_type,
        identifier,
        registration_date,
        courses: Vec::new(),
    })
}

pub fn update_student(conn: &Connection, student_id: &str, patch: StudentPatch) -> Result<Student> {
    let current = get_student(conn, student_id)?;

    let name = match patch.name.as_deref() {
        Some(n) => required_text("name", n)?,
        None => current.name,
    };
    let identifier = match patch.identifier.as_deref() {
        Some(i) => required_text("identifier", i)?,
        None => current.identifier,
    };
    let id_type = patch.id_type.unwrap_or(current.id_type);
    let registration_date = patch
        .registration_date
        .unwrap_or(current.registration_date);
    ensure_identifier_free(conn, id_type, &identifier, Some(student_id))?;

    conn.execute(
        "UPDATE students
         SET name = ?, id_type = ?, identifier = ?, registration_date = ?,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        (
            &name,
            id_type.as_str(),
            &identifier,
            registration_date,
            student_id,
        ),
    )?;
    get_student(conn, student_id)
}

/// Deletes a student and all of its courses in one transaction.
pub fn delete_student(conn: &Connection, student_id: &str) -> Result<()> {
    ensure_student_exists(conn, student_id)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM courses WHERE student_id = ?", [student_id])?;
    let changed = tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if changed == 0 {
        return Err(GradebookError::NotFound("student not found".into()));
    }
    tx.commit()?;
    Ok(())
}

pub fn list_courses(conn: &Connection, student_id: &str) -> Result<Vec<Course>> {
    ensure_student_exists(conn, student_id)?;
    load_courses(conn, student_id)
}

pub fn get_course(conn: &Connection, student_id: &str, course_id: &str) -> Result<Course> {
    ensure_student_exists(conn, student_id)?;
    let course = conn
        .query_row(
            &format!("SELECT {COURSE_COLS} FROM courses WHERE id = ? AND student_id = ?"),
            (course_id, student_id),
            course_from_row,
        )
        .optional()?;
    course.ok_or_else(|| GradebookError::NotFound("course not found".into()))
}

pub fn create_course(
    conn: &Connection,
    student_id: &str,
    name: &str,
    registration_date: Option<NaiveDate>,
) -> Result<Course> {
    let name = required_text("name", name)?;
    ensure_student_exists(conn, student_id)?;
    let registration_date = registration_date.unwrap_or_else(today);

    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM courses WHERE student_id = ?",
        [student_id],
        |r| r.get(0),
    )?;
    let course_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO courses(
           id, student_id, name, registration_date, sort_order, updated_at
         ) VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&course_id, student_id, &name, registration_date, sort_order),
    )?;

    Ok(Course {
        id: course_id,
        student_id: student_id.to_string(),
        name,
        registration_date,
        scores: StageScores::default(),
    })
}

/// Renames a course; `registration_date` of `None` keeps the stored date.
pub fn update_course(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    name: &str,
    registration_date: Option<NaiveDate>,
) -> Result<Course> {
    let name = required_text("name", name)?;
    let current = get_course(conn, student_id, course_id)?;
    let registration_date = registration_date.unwrap_or(current.registration_date);

    conn.execute(
        "UPDATE courses
         SET name = ?, registration_date = ?,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ? AND student_id = ?",
        (&name, registration_date, course_id, student_id),
    )?;
    get_course(conn, student_id, course_id)
}

pub fn delete_course(conn: &Connection, student_id: &str, course_id: &str) -> Result<()> {
    ensure_student_exists(conn, student_id)?;
    let changed = conn.execute(
        "DELETE FROM courses WHERE id = ? AND student_id = ?",
        (course_id, student_id),
    )?;
    if changed == 0 {
        return Err(GradebookError::NotFound("course not found".into()));
    }
    Ok(())
}

/// Records one stage score and returns the course as now stored.
///
/// The score is range-checked before anything is written, so a rejected
/// value leaves the course untouched.
pub fn set_grade(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    stage: Stage,
    score: f64,
) -> Result<Course> {
    let score = check_score(score)?;
    get_course(conn, student_id, course_id)?;

    conn.execute(
        &format!(
            "UPDATE courses
             SET {} = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ? AND student_id = ?",
            stage_column(stage)
        ),
        (score, course_id, student_id),
    )?;
    get_course(conn, student_id, course_id)
}
