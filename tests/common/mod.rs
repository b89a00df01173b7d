//! Shared test infrastructure for integration tests.
//!
//! Provides a scripted axum stub standing in for both the identifier source
//! and the chat completions API, plus helpers to run the built binary.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

/// Path prefix the stub serves chat completions under.
pub const API_BASE_PATH: &str = "/v1";
/// Chat completions route under [`API_BASE_PATH`].
pub const CHAT_PATH: &str = "/v1/chat/completions";

/// A scripted reply: status code plus JSON body.
pub type Reply = (StatusCode, String);

#[derive(Default)]
struct Script {
    queues: HashMap<String, VecDeque<Reply>>,
    seen: Vec<String>,
}

type StubState = Arc<Mutex<Script>>;

/// HTTP stub that answers each request path from its own reply queue.
///
/// Paths without a remaining reply get a 404.
pub struct StubServer {
    pub base_url: String,
    state: StubState,
}

impl StubServer {
    pub fn start(routes: Vec<(&'static str, Vec<Reply>)>) -> Self {
        let queues = routes
            .into_iter()
            .map(|(path, replies)| (path.to_string(), replies.into_iter().collect()))
            .collect();
        let state: StubState = Arc::new(Mutex::new(Script {
            queues,
            seen: Vec::new(),
        }));
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");
        listener
            .set_nonblocking(true)
            .expect("stub listener nonblocking");
        let app = Router::new()
            .fallback(scripted_reply)
            .with_state(Arc::clone(&state));
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build stub runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("adopt stub listener");
                axum::serve(listener, app).await.expect("serve stub");
            });
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Paths requested so far, in arrival order.
    pub fn finish(self) -> Vec<String> {
        self.state.lock().expect("stub state").seen.clone()
    }
}

async fn scripted_reply(State(state): State<StubState>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    let mut script = state.lock().expect("stub state");
    let reply = script
        .queues
        .get_mut(&path)
        .and_then(VecDeque::pop_front)
        .unwrap_or((StatusCode::NOT_FOUND, "{}".to_string()));
    script.seen.push(path);
    (reply.0, [(header::CONTENT_TYPE, "application/json")], reply.1).into_response()
}

/// `{"uuid": ...}` reply.
pub fn uuid_reply(uuid: &str) -> Reply {
    (StatusCode::OK, serde_json::json!({ "uuid": uuid }).to_string())
}

/// Chat completion reply whose message content is `content`.
pub fn chat_reply(content: &str) -> Reply {
    (
        StatusCode::OK,
        serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
        .to_string(),
    )
}

/// Command for the built binary with a clean pipeline environment.
pub fn binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_enrich-pipeline"));
    for key in [
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "PIPELINE_DB_PATH",
        "PIPELINE_IDENTIFIER_URL",
        "PIPELINE_MODEL",
        "PIPELINE_AUDIT_RECIPIENT",
        "PIPELINE_BIND",
    ] {
        command.env_remove(key);
    }
    command.env("RUST_LOG", "info");
    command
}

/// Run `enrich-pipeline run` against `stub`, storing into `db_path`.
pub fn run_pipeline(stub: &StubServer, db_path: &Path, source: &str) -> Output {
    binary()
        .args(["run", "--email", "user@example.com", "--source", source])
        .arg("--db-path")
        .arg(db_path)
        .env("OPENAI_API_KEY", "sk-test")
        .env("PIPELINE_IDENTIFIER_URL", format!("{}/uuid", stub.base_url))
        .env("OPENAI_BASE_URL", format!("{}{API_BASE_PATH}", stub.base_url))
        .output()
        .expect("run enrich-pipeline")
}

/// Parse stdout of a successful command as JSON.
pub fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
