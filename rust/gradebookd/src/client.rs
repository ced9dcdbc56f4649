//! Client side of the sidecar protocol.
//!
//! [`SessionStore`] owns the bearer token (optionally persisted to a file so
//! it survives restarts); [`Client`] drives a spawned `gradebookd` process
//! and injects that token into every request. Each call blocks until its
//! response line arrives, so requests never overlap.

use crate::calc::Stage;
use crate::filters::{CourseFilter, StudentFilter};
use crate::model::{format_date, CourseRecord, StudentRecord};
use crate::store::{NewStudent, StudentPatch};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The sidecar answered with an error; `message` is its text verbatim.
    #[error("{message}")]
    Api { code: String, message: String },

    /// The sidecar could not be reached (spawn failure, broken pipe, EOF).
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The sidecar answered with something that is not a valid response.
    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("session store error: {0}")]
    Session(String),
}

impl ClientError {
    /// Wire code for API errors, `None` for local failures.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Connectivity(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Holds the current bearer token.
#[derive(Debug, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
    token: Option<String>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the token persisted at `path`, if any. A missing file is an empty session.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let token = match std::fs::read_to_string(&path) {
            Ok(s) => Some(s.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: Some(path),
            token,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set(&mut self, token: String) -> io::Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &token)?;
        }
        self.token = Some(token);
        Ok(())
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.token = None;
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

pub struct Client {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    session: SessionStore,
    next_id: u64,
}

impl Client {
    /// Spawns the sidecar executable with `args`.
    pub fn spawn(exe: impl AsRef<Path>, args: &[&str], session: SessionStore) -> Result<Self> {
        let mut child = Command::new(exe.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ClientError::Connectivity(format!(
                    "failed to start {}: {e}",
                    exe.as_ref().to_string_lossy()
                ))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Connectivity("sidecar stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Connectivity("sidecar stdout unavailable".into()))?;
        Ok(Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            session,
            next_id: 1,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Sends one request and waits for its response.
    pub fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.to_string();
        self.next_id += 1;

        let mut payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        if let Some(token) = self.session.token() {
            payload["token"] = json!(token);
        }
        writeln!(self.stdin, "{}", payload)?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ClientError::Connectivity(
                "sidecar closed the connection".into(),
            ));
        }
        let resp: Value = serde_json::from_str(line.trim())
            .map_err(|e| ClientError::Protocol(format!("{method}: {e}")))?;
        if resp.get("id").and_then(|v| v.as_str()) != Some(id.as_str()) {
            return Err(ClientError::Protocol(format!(
                "{method}: response id does not match request {id}"
            )));
        }

        if resp.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(resp.get("result").cloned().unwrap_or(Value::Null));
        }
        let error = resp.get("error").cloned().unwrap_or(Value::Null);
        Err(ClientError::Api {
            code: error
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            message: error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("request failed")
                .to_string(),
        })
    }

    fn call_as<T: DeserializeOwned>(&mut self, method: &str, params: Value, key: &str) -> Result<T> {
        let mut result = self.call(method, params)?;
        let field = result
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| ClientError::Protocol(format!("{method}: missing {key}")))?;
        serde_json::from_value(field).map_err(|e| ClientError::Protocol(format!("{method}: {e}")))
    }

    pub fn health(&mut self) -> Result<Value> {
        self.call("health", json!({}))
    }

    pub fn select_workspace(&mut self, path: &Path) -> Result<()> {
        self.call(
            "workspace.select",
            json!({ "path": path.to_string_lossy() }),
        )?;
        Ok(())
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let token: String = self.call_as(
            "auth.login",
            json!({ "username": username, "password": password }),
            "token",
        )?;
        self.session
            .set(token)
            .map_err(|e| ClientError::Session(e.to_string()))
    }

    /// Ends the session. The local token is discarded even if the sidecar call fails.
    pub fn logout(&mut self) -> Result<()> {
        let outcome = self.call("auth.logout", json!({}));
        self.session
            .clear()
            .map_err(|e| ClientError::Session(e.to_string()))?;
        outcome.map(|_| ())
    }

    pub fn change_password(&mut self, old: &str, new: &str) -> Result<()> {
        self.call(
            "auth.changePassword",
            json!({ "oldPassword": old, "newPassword": new }),
        )?;
        Ok(())
    }

    pub fn list_students(&mut self, filter: &StudentFilter) -> Result<Vec<StudentRecord>> {
        self.call_as("students.list", json!({ "filters": filter }), "students")
    }

    pub fn get_student(&mut self, student_id: &str) -> Result<StudentRecord> {
        self.call_as("students.get", json!({ "studentId": student_id }), "student")
    }

    pub fn create_student(&mut self, new: &NewStudent) -> Result<StudentRecord> {
        let params = serde_json::to_value(new).map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.call_as("students.create", params, "student")
    }

    pub fn update_student(&mut self, student_id: &str, patch: &StudentPatch) -> Result<StudentRecord> {
        let mut params =
            serde_json::to_value(patch).map_err(|e| ClientError::Protocol(e.to_string()))?;
        params["studentId"] = json!(student_id);
        self.call_as("students.update", params, "student")
    }

    pub fn delete_student(&mut self, student_id: &str) -> Result<()> {
        self.call("students.delete", json!({ "studentId": student_id }))?;
        Ok(())
    }

    pub fn list_courses(&mut self, student_id: &str, filter: &CourseFilter) -> Result<Vec<CourseRecord>> {
        self.call_as(
            "courses.list",
            json!({ "studentId": student_id, "filters": filter }),
            "courses",
        )
    }

    pub fn create_course(
        &mut self,
        student_id: &str,
        name: &str,
        registration_date: Option<NaiveDate>,
    ) -> Result<CourseRecord> {
        self.call_as(
            "courses.create",
            json!({
                "studentId": student_id,
                "name": name,
                "registrationDate": registration_date.map(format_date),
            }),
            "course",
        )
    }

    pub fn update_course(
        &mut self,
        student_id: &str,
        course_id: &str,
        name: &str,
        registration_date: Option<NaiveDate>,
    ) -> Result<CourseRecord> {
        self.call_as(
            "courses.update",
            json!({
                "studentId": student_id,
                "courseId": course_id,
                "name": name,
                "registrationDate": registration_date.map(format_date),
            }),
            "course",
        )
    }

    pub fn delete_course(&mut self, student_id: &str, course_id: &str) -> Result<()> {
        self.call(
            "courses.delete",
            json!({ "studentId": student_id, "courseId": course_id }),
        )?;
        Ok(())
    }

    pub fn set_grade(
        &mut self,
        student_id: &str,
        course_id: &str,
        stage: Stage,
        score: f64,
    ) -> Result<CourseRecord> {
        self.call_as(
            "courses.setGrade",
            json!({
                "studentId": student_id,
                "courseId": course_id,
                "stage": stage.code(),
                "score": score,
            }),
            "course",
        )
    }

    pub fn student_report_csv(&mut self, student_id: &str) -> Result<String> {
        self.call_as(
            "reports.studentCsv",
            json!({ "studentId": student_id }),
            "csv",
        )
    }

    pub fn class_report_csv(&mut self) -> Result<String> {
        self.call_as("reports.classCsv", json!({}), "csv")
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
