//! Admin credentials and bearer-token sessions.
//!
//! There is exactly one admin account per workspace. Passwords are kept as
//! PBKDF2-HMAC-SHA256 digests; sessions are opaque random tokens with an
//! expiry, stored in the workspace so they survive a daemon restart.

use crate::error::{GradebookError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{Connection, OptionalExtension};
use sha2::Sha256;

pub const PWD_SCHEME: &str = "pbkdf2_sha256";
pub const PBKDF2_ITERS: u32 = 120_000;
pub const MIN_PASSWORD_LEN: usize = 4;
pub const SALT_LEN: usize = 16;
pub const TOKEN_LEN: usize = 32;

struct AdminRecord {
    username: String,
    iterations: u32,
    salt: Vec<u8>,
    pwd_hash: String,
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

fn hash_password(password: &str, salt: &[u8], iterations: u32) -> String {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    to_hex(&out)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn write_admin(conn: &Connection, username: &str, password: &str) -> Result<()> {
    let salt = random_bytes::<SALT_LEN>();
    let pwd_hash = hash_password(password, &salt, PBKDF2_ITERS);
    conn.execute(
        "INSERT INTO admin(username, pwd_scheme, iterations, salt, pwd_hash)
         VALUES(?, ?, ?, ?, ?)",
        (username, PWD_SCHEME, PBKDF2_ITERS, to_hex(&salt), pwd_hash),
    )?;
    Ok(())
}

fn read_admin(conn: &Connection) -> Result<Option<AdminRecord>> {
    let row = conn
        .query_row(
            "SELECT username, iterations, salt, pwd_hash FROM admin LIMIT 1",
            [],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, u32>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((username, iterations, salt_hex, pwd_hash)) = row else {
        return Ok(None);
    };
    let salt = from_hex(&salt_hex).ok_or_else(|| {
        GradebookError::Validation("stored admin salt is not valid hex".into())
    })?;
    Ok(Some(AdminRecord {
        username,
        iterations,
        salt,
        pwd_hash,
    }))
}

/// Seeds the admin account if the workspace has none. Returns true when seeded.
pub fn ensure_admin(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    if read_admin(conn)?.is_some() {
        return Ok(false);
    }
    write_admin(conn, username, password)?;
    Ok(true)
}

fn verify_password(admin: &AdminRecord, password: &str) -> bool {
    let given = hash_password(password, &admin.salt, admin.iterations);
    constant_time_eq(&admin.pwd_hash, &given)
}

pub fn verify_user(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    let Some(admin) = read_admin(conn)? else {
        return Ok(false);
    };
    Ok(admin.username == username && verify_password(&admin, password))
}

pub fn change_password(conn: &Connection, old: &str, new: &str) -> Result<()> {
    let Some(admin) = read_admin(conn)? else {
        return Err(GradebookError::Unauthorized("no admin account".into()));
    };
    if !verify_password(&admin, old) {
        return Err(GradebookError::Unauthorized("current password is incorrect".into()));
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(GradebookError::Validation(format!(
            "new password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM admin", [])?;
    write_admin(&tx, &admin.username, new)?;
    tx.commit()?;
    Ok(())
}

/// Issues a fresh session token valid for `ttl_secs`.
pub fn issue_token(conn: &Connection, ttl_secs: i64) -> Result<String> {
    let token = to_hex(&random_bytes::<TOKEN_LEN>());
    conn.execute(
        "INSERT INTO sessions(token, expires_at) VALUES(?, ?)",
        (&token, now_unix() + ttl_secs),
    )?;
    Ok(token)
}

/// True if `token` names a live session. Expired sessions are dropped.
pub fn validate_token(conn: &Connection, token: &str) -> Result<bool> {
    let expires_at: Option<i64> = conn
        .query_row(
            "SELECT expires_at FROM sessions WHERE token = ?",
            [token],
            |r| r.get(0),
        )
        .optional()?;
    match expires_at {
        None => Ok(false),
        Some(exp) if now_unix() > exp => {
            conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
            Ok(false)
        }
        Some(_) => Ok(true),
    }
}

pub fn revoke_token(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
    Ok(())
}

/// Fails with `Unauthorized` unless `token` is present and live.
pub fn require_session(conn: &Connection, token: Option<&str>) -> Result<()> {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Err(GradebookError::Unauthorized("missing session token".into()));
    };
    if !validate_token(conn, token)? {
        return Err(GradebookError::Unauthorized(
            "invalid or expired session token".into(),
        ));
    }
    Ok(())
}
