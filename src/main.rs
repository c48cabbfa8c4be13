//! Stdio control-plane loop (§6.4): reads one `{method, params}` request
//! per line from stdin, dispatches it through `otterindex::control::Controller`,
//! and writes the resulting `{result}`/`{error}` envelope to stdout as a
//! single line. Framing is deliberately the simplest thing that satisfies
//! "one request in, one response out" — the spec leaves transport choice
//! open, and anything richer (sockets, HTTP) is a front-end's job.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use otterindex::config::CoreConfig;
use otterindex::control::{Controller, Response, INVALID_ENVELOPE, PARSE_ERROR};
use otterindex::logging::{self, LoggingConfig};

#[derive(Deserialize)]
struct RequestEnvelope {
    method: String,
    #[serde(default)]
    params: Value,
}

/// Picks the root used only to locate `.otidx/config.toml` and the log
/// directory before any `workspace.add` call has happened. Priority:
/// `--workspace <path>` CLI flag, then `OTTERINDEX_WORKSPACE` env var,
/// then the current directory. Tilde-expanded and canonicalized like the
/// teacher's workspace-root resolution.
fn initial_root() -> PathBuf {
    let args: Vec<String> = env::args().collect();
    let from_flag = args
        .iter()
        .position(|a| a == "--workspace")
        .and_then(|pos| args.get(pos + 1))
        .cloned();
    let candidate = from_flag
        .or_else(|| env::var("OTTERINDEX_WORKSPACE").ok())
        .map(|p| PathBuf::from(shellexpand::tilde(&p).into_owned()));

    let root = candidate
        .filter(|p| p.is_dir())
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    root.canonicalize().unwrap_or(root)
}

fn main() {
    let root = initial_root();
    let config = CoreConfig::load(&root).unwrap_or_default();

    let _guard = logging::init(&LoggingConfig {
        log_dir: Some(root.join(".otidx").join("logs")),
    });

    tracing::info!(root = %root.display(), backend = %config.backend, "otterindex control loop starting");

    let controller = Controller::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "failed to read request line");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Err(e) => Response::from_error(PARSE_ERROR, e.to_string()),
            Ok(value) => match serde_json::from_value::<RequestEnvelope>(value) {
                Err(e) => Response::from_error(INVALID_ENVELOPE, e.to_string()),
                Ok(req) => controller.handle(&req.method, req.params),
            },
        };

        if let Ok(text) = serde_json::to_string(&response) {
            let _ = writeln!(stdout, "{text}");
            let _ = stdout.flush();
        }
    }

    tracing::info!("otterindex control loop stopped");
}
