use crate::auth;
use crate::error::{GradebookError, Result};
use crate::ipc::helpers::{get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn login(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.conn()?;
    let username = get_required_str(&req.params, "username")?;
    // Passwords are not trimmed.
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GradebookError::Validation("missing password".into()))?;

    if !auth::verify_user(conn, &username, password)? {
        tracing::warn!(user = %username, "login rejected");
        return Err(GradebookError::Unauthorized(
            "invalid username or password".into(),
        ));
    }
    let token = auth::issue_token(conn, state.config.token_ttl_secs)?;
    tracing::info!(user = %username, "login");
    Ok(json!({ "token": token }))
}

fn logout(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    if let Some(token) = req.token.as_deref() {
        auth::revoke_token(conn, token.trim())?;
    }
    tracing::info!("logout");
    Ok(json!({ "ok": true }))
}

fn change_password(state: &mut AppState, req: &Request) -> Result<Value> {
    let conn = state.session_conn(req)?;
    let old = req
        .params
        .get("oldPassword")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GradebookError::Validation("missing oldPassword".into()))?;
    let new = req
        .params
        .get("newPassword")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GradebookError::Validation("missing newPassword".into()))?;
    auth::change_password(conn, old, new)?;
    tracing::info!("admin password changed");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "auth.login" => Some(respond(req, login(state, req))),
        "auth.logout" => Some(respond(req, logout(state, req))),
        "auth.changePassword" => Some(respond(req, change_password(state, req))),
        _ => None,
    }
}
