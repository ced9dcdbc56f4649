use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60 * 4;

/// Command-line configuration of the sidecar.
#[derive(Debug, Clone, Parser)]
#[command(name = "gradebookd", version, about = "Student gradebook sidecar (JSON lines over stdio)")]
pub struct Config {
    /// Workspace directory to open at startup (otherwise use `workspace.select`)
    #[arg(long, env = "GRADEBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Lifetime of issued session tokens, in seconds
    #[arg(long, env = "GRADEBOOKD_TOKEN_TTL_SECS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub token_ttl_secs: i64,

    /// Admin username seeded into a workspace that has none
    #[arg(long, env = "GRADEBOOKD_ADMIN_USER", default_value = "admin")]
    pub admin_user: String,

    /// Admin password seeded into a workspace that has none
    #[arg(long, env = "GRADEBOOKD_ADMIN_PASSWORD", default_value = "1234")]
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            admin_user: "admin".to_string(),
            admin_password: "1234".to_string(),
        }
    }
}
