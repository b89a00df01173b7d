//! Shared fixtures for unit tests: a scripted HTTP stub and fake collaborators.
use crate::enrich::{EnrichmentResult, Enricher};
use crate::identifier::IdentifierSource;
use crate::notify::Notifier;
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Mutex;
use std::thread;

/// A request captured by [`spawn_http_stub`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serve one scripted `(status line, body)` per connection, then stop.
///
/// Returns the base URL and a handle yielding every captured request.
pub fn spawn_http_stub(
    responses: Vec<(&'static str, String)>,
) -> (String, thread::JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for (status_line, payload) in responses {
            let (mut stream, _) = listener.accept().expect("accept stub connection");
            captured.push(read_request(&mut stream));
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
            stream
                .write_all(response.as_bytes())
                .expect("write stub response");
            let _ = stream.flush();
        }
        captured
    });
    (format!("http://{addr}"), handle)
}

fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("read request line");
    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header line");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            if key.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((key, value));
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("read request body");
    CapturedRequest {
        request_line: request_line.trim_end().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

/// Identifier source replaying a fixed script of outcomes.
pub struct ScriptedIdentifiers {
    script: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedIdentifiers {
    pub fn new(script: Vec<Result<&str, &str>>) -> Self {
        let script = script
            .into_iter()
            .map(|step| step.map(str::to_string).map_err(str::to_string))
            .collect();
        Self {
            script: Mutex::new(script),
        }
    }

    pub fn always(identifier: &str) -> Self {
        Self::new(vec![Ok(identifier); crate::config::FAN_OUT])
    }
}

impl IdentifierSource for ScriptedIdentifiers {
    fn fetch_identifier(&self) -> Result<String> {
        let next = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err("identifier script exhausted".to_string()));
        next.map_err(|description| anyhow!(description))
    }
}

/// Enricher returning the same result for every input.
pub struct FixedEnricher {
    result: EnrichmentResult,
    pub seen: Mutex<Vec<String>>,
}

impl FixedEnricher {
    pub fn new(analysis: &str, sentiment: &str) -> Self {
        Self::with_result(EnrichmentResult {
            analysis: Some(analysis.to_string()),
            sentiment: Some(sentiment.to_string()),
            error: None,
        })
    }

    pub fn with_result(result: EnrichmentResult) -> Self {
        Self {
            result,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Enricher for FixedEnricher {
    fn enrich(&self, text: &str) -> EnrichmentResult {
        self.seen.lock().expect("seen lock").push(text.to_string());
        self.result.clone()
    }
}

/// Notifier that records every recipient it was asked to notify.
#[derive(Default)]
pub struct RecordingNotifier {
    pub recipients: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: &str) {
        self.recipients
            .lock()
            .expect("recipients lock")
            .push(recipient.to_string());
    }
}
