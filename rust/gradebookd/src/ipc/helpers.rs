use crate::error::{GradebookError, Result};
use crate::ipc::error::ok;
use crate::ipc::types::Request;
use crate::model::parse_date;
use chrono::NaiveDate;
use serde_json::Value;

/// Turns a handler outcome into a response envelope.
pub fn respond(req: &Request, result: Result<Value>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::warn!(method = %req.method, code = e.code(), error = %e, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String> {
    get_opt_str(params, key)?
        .ok_or_else(|| GradebookError::Validation(format!("missing {}", key)))
}

/// Trimmed string param; absent, null and blank all read as `None`.
pub fn get_opt_str(params: &Value, key: &str) -> Result<Option<String>> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(GradebookError::Validation(format!(
                    "{} must be a string",
                    key
                )));
            };
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
    }
}

pub fn get_opt_date(params: &Value, key: &str) -> Result<Option<NaiveDate>> {
    get_opt_str(params, key)?
        .map(|s| parse_date(key, &s))
        .transpose()
}
