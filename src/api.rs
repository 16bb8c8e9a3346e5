//! Optional HTTP façade delegating to the orchestrator.
//!
//! A deliberately small hand-rolled server: accept, read one request, parse
//! the request line, route, write one JSON response. The agent lives behind
//! an async mutex so concurrent requests serialize onto a single writer;
//! the scan/fix pipeline is not safe to interleave against the same files.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::agent::Agent;

pub type SharedAgent = Arc<Mutex<Agent>>;

/// Bind and serve until the task is cancelled.
pub async fn serve(agent: Agent, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    eprintln!("  agent api listening on http://127.0.0.1:{}", port);

    let shared: SharedAgent = Arc::new(Mutex::new(agent));
    loop {
        let (stream, _addr) = listener.accept().await?;
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, shared).await {
                eprintln!("  connection error: {}", err);
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    agent: SharedAgent,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buf = vec![0u8; 16384];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]).into_owned();

    // "POST /agent/scan HTTP/1.1"
    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Ok(());
    }
    let body = request.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");

    let (status, payload) = route(parts[0], parts[1], body, &agent).await;
    let body = payload.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body,
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Route one request to the orchestrator. Split out from the connection
/// handler so it can be tested without sockets.
pub async fn route(method: &str, path: &str, body: &str, agent: &SharedAgent) -> (&'static str, Value) {
    match (method, path) {
        ("GET", "/agent/status") => ("200 OK", agent.lock().await.status()),

        ("POST", "/agent/scan") => {
            let mut agent = agent.lock().await;
            let errors = agent.scan().await;
            let preview: Vec<Value> = errors
                .iter()
                .take(20)
                .filter_map(|e| serde_json::to_value(e).ok())
                .collect();
            ("200 OK", json!({ "count": errors.len(), "errors": preview }))
        }

        ("POST", "/agent/fix") => {
            let mut agent = agent.lock().await;
            let batch = agent.config().monitor_batch;
            let mut errors = agent.scan().await;
            let mut fixes = Vec::new();
            for error in errors.iter_mut().take(batch) {
                if let Some(fix) = agent.fix_error(error).await {
                    fixes.push(fix);
                }
            }
            ("200 OK", json!({ "fixes_applied": fixes.len(), "fixes": fixes }))
        }

        ("POST", "/agent/rebuild") => {
            let report = agent.lock().await.rebuild();
            ("200 OK", serde_json::to_value(report).unwrap_or_else(|_| json!({})))
        }

        ("POST", "/agent/analyze") => {
            let data: Value = serde_json::from_str(body).unwrap_or_else(|_| json!({}));
            let agent = agent.lock().await;
            let classification = agent.analyze_message(
                data.get("type").and_then(Value::as_str).unwrap_or("unknown"),
                data.get("message").and_then(Value::as_str).unwrap_or(""),
                data.get("file_path").and_then(Value::as_str).map(String::from),
                data.get("line").and_then(Value::as_u64).map(|l| l as usize),
            );
            ("200 OK", serde_json::to_value(classification).unwrap_or_else(|_| json!({})))
        }

        ("GET", "/agent/engines") => ("200 OK", agent.lock().await.engines().catalog()),

        ("POST", path) if path.starts_with("/agent/engines/") => {
            // "/agent/engines/<engine>/<task>" with a JSON payload body.
            let rest = &path["/agent/engines/".len()..];
            match rest.split_once('/') {
                Some((engine, task)) => {
                    let payload: Value = serde_json::from_str(body).unwrap_or_else(|_| json!({}));
                    let result = agent.lock().await.engines().dispatch(engine, task, &payload);
                    ("200 OK", result)
                }
                None => ("400 Bad Request", json!({ "error": "expected /agent/engines/<engine>/<task>" })),
            }
        }

        _ => ("404 Not Found", json!({ "error": "not found" })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::engines::{Engine, EngineRegistry};
    use tempfile::tempdir;

    struct HealthEngine;

    impl Engine for HealthEngine {
        fn name(&self) -> &str {
            "recommendations"
        }
        fn supported_tasks(&self) -> &[&str] {
            &["health"]
        }
        fn handle(&self, _task: &str, _payload: &Value) -> Value {
            json!({ "status": "ok" })
        }
    }

    fn shared_agent() -> (tempfile::TempDir, SharedAgent) {
        let dir = tempdir().unwrap();
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(HealthEngine));
        let agent = Agent::new(AgentConfig::load(dir.path())).with_engines(registry);
        (dir, Arc::new(Mutex::new(agent)))
    }

    #[tokio::test]
    async fn test_status_route() {
        let (_dir, agent) = shared_agent();
        let (status, payload) = route("GET", "/agent/status", "", &agent).await;
        assert_eq!(status, "200 OK");
        assert_eq!(payload["status"], "running");
    }

    #[tokio::test]
    async fn test_scan_route_reports_count() {
        let (_dir, agent) = shared_agent();
        let (status, payload) = route("POST", "/agent/scan", "", &agent).await;
        assert_eq!(status, "200 OK");
        assert_eq!(payload["count"], 0);
    }

    #[tokio::test]
    async fn test_analyze_route_classifies_body() {
        let (_dir, agent) = shared_agent();
        let body = r#"{"type": "runtime", "message": "widget is not defined"}"#;
        let (status, payload) = route("POST", "/agent/analyze", body, &agent).await;
        assert_eq!(status, "200 OK");
        assert_eq!(payload["category"], "reference");
        assert_eq!(payload["can_fix"], true);
    }

    #[tokio::test]
    async fn test_engines_catalog_route() {
        let (_dir, agent) = shared_agent();
        let (_, payload) = route("GET", "/agent/engines", "", &agent).await;
        assert_eq!(payload["engines"][0]["name"], "recommendations");
    }

    #[tokio::test]
    async fn test_engine_dispatch_route() {
        let (_dir, agent) = shared_agent();
        let (_, payload) = route("POST", "/agent/engines/recommendations/health", "{}", &agent).await;
        assert_eq!(payload["status"], "ok");
    }

    #[tokio::test]
    async fn test_engine_dispatch_unknown_engine() {
        let (_dir, agent) = shared_agent();
        let (status, payload) = route("POST", "/agent/engines/pricing/health", "{}", &agent).await;
        assert_eq!(status, "200 OK");
        assert!(payload["error"].as_str().unwrap().contains("unknown engine"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_dir, agent) = shared_agent();
        let (status, payload) = route("GET", "/nope", "", &agent).await;
        assert_eq!(status, "404 Not Found");
        assert_eq!(payload["error"], "not found");
    }

    #[tokio::test]
    async fn test_serve_binds_to_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await;
        assert!(listener.is_ok());
    }
}
