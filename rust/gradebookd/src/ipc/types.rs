use crate::config::Config;
use crate::error::{GradebookError, Result};
use crate::{auth, db};
use rusqlite::Connection;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Bearer token of the caller's session, if any.
    #[serde(default)]
    pub token: Option<String>,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
        }
    }

    /// Opens (creating if needed) the workspace store and seeds the admin account.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        if auth::ensure_admin(&conn, &self.config.admin_user, &self.config.admin_password)? {
            tracing::info!(user = %self.config.admin_user, "seeded admin account");
        }
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        Ok(())
    }

    pub fn conn(&self) -> Result<&Connection> {
        self.db.as_ref().ok_or(GradebookError::NoWorkspace)
    }

    /// Connection for a request that needs a live session. Nothing is
    /// touched when the token is missing or dead.
    pub fn session_conn(&self, req: &Request) -> Result<&Connection> {
        let conn = self.conn()?;
        auth::require_session(conn, req.token.as_deref())?;
        Ok(conn)
    }
}
