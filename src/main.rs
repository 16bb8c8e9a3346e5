use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use codemedic::agent::Agent;
use codemedic::api;
use codemedic::cli::{Args, Mode};
use codemedic::config::AgentConfig;

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries exactly one JSON document.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let document = match run(args).await {
        Ok(document) => document,
        // The JSON payload is the failure signal, not the exit code.
        Err(err) => json!({
            "error": err.to_string(),
            "trace": format!("{:?}", err),
        }),
    };

    match serde_json::to_string_pretty(&document) {
        Ok(text) => println!("{}", text),
        Err(err) => println!("{{\"error\": \"{}\"}}", err),
    }
}

async fn run(args: Args) -> Result<Value, Box<dyn std::error::Error>> {
    let config = AgentConfig::load(args.root.clone());
    let mut agent = Agent::new(config);

    match args.mode {
        Mode::Scan => {
            let errors = agent.scan().await;
            Ok(json!({
                "mode": "scan",
                "count": errors.len(),
                "errors": errors,
            }))
        }

        Mode::Fix => {
            let report = agent.fix_all().await;
            Ok(json!({ "mode": "fix", "report": report }))
        }

        Mode::Rebuild => {
            let report = agent.rebuild();
            Ok(json!({ "mode": "rebuild", "report": report }))
        }

        Mode::Monitor => {
            let stop = agent.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.stop();
                }
            });
            let summary = agent.monitor().await;
            Ok(json!({ "mode": "monitor", "stopped": true, "summary": summary }))
        }

        Mode::Api => {
            tokio::select! {
                result = api::serve(agent, args.port) => {
                    result.map(|_| json!({ "mode": "api", "stopped": true }))
                }
                _ = tokio::signal::ctrl_c() => {
                    Ok(json!({ "mode": "api", "stopped": true }))
                }
            }
        }

        Mode::Analyze => {
            let Some(file) = args.file else {
                return Ok(json!({ "error": "analyze mode requires --file" }));
            };
            if !file.exists() {
                return Ok(json!({ "error": format!("no such file: {}", file.display()) }));
            }
            let issues = agent.analyze_file(&file);
            Ok(json!({
                "mode": "analyze",
                "file": file.display().to_string(),
                "count": issues.len(),
                "issues": issues,
            }))
        }
    }
}
