use clap::Parser;
use gradebookd::config::Config;
use gradebookd::ipc;
use std::io::{self, BufRead, Write};
use std::process;

fn main() {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gradebookd=info")),
        )
        .init();

    let config = Config::parse();
    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);

    if let Some(path) = startup_workspace {
        if let Err(e) = state.open_workspace(&path) {
            tracing::error!(path = %path.to_string_lossy(), "failed to open workspace: {e:#}");
            process::exit(1);
        }
        tracing::info!(path = %path.to_string_lossy(), "workspace opened");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!("bad request line: {e}");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
}
