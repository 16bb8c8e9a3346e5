//! Static registry for the collaborator business-logic engines.
//!
//! The agent never loads engine code from disk at runtime; engines are
//! registered at construction and reached only through this uniform
//! contract: `(engine, task, payload) -> result`. Unknown engines and tasks
//! come back as structured `{"error": ...}` payloads, never as an error
//! type. Callers on the service façade forward the value as-is.

use serde_json::{json, Value};

/// A collaborator engine the agent can delegate tasks to.
///
/// Object-safe so heterogeneous engines can live in one registry.
/// Implementations must not panic; failures are returned as `{"error": ...}`
/// payloads.
pub trait Engine: Send + Sync {
    /// Stable engine name used for dispatch.
    fn name(&self) -> &str;

    /// Tasks this engine accepts, used for catalog output and dispatch
    /// validation.
    fn supported_tasks(&self) -> &[&str];

    /// Execute one task against a JSON payload.
    fn handle(&self, task: &str, payload: &Value) -> Value;
}

#[derive(Default)]
pub struct EngineRegistry {
    engines: Vec<Box<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, engine: Box<dyn Engine>) {
        self.engines.push(engine);
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Dispatch a task. Unknown engine or task yields a structured error
    /// payload rather than a Rust error.
    pub fn dispatch(&self, engine_name: &str, task: &str, payload: &Value) -> Value {
        let Some(engine) = self.engines.iter().find(|e| e.name() == engine_name) else {
            return json!({ "error": format!("unknown engine: {}", engine_name) });
        };
        if !engine.supported_tasks().contains(&task) {
            return json!({
                "error": format!("unknown task '{}' for engine '{}'", task, engine_name)
            });
        }
        engine.handle(task, payload)
    }

    /// The registry contents as JSON, for the service façade.
    pub fn catalog(&self) -> Value {
        let engines: Vec<Value> = self
            .engines
            .iter()
            .map(|e| json!({ "name": e.name(), "tasks": e.supported_tasks() }))
            .collect();
        json!({ "engines": engines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoEngine;

    impl Engine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        fn supported_tasks(&self) -> &[&str] {
            &["health", "echo"]
        }

        fn handle(&self, task: &str, payload: &Value) -> Value {
            match task {
                "health" => json!({ "status": "ok" }),
                _ => json!({ "echo": payload }),
            }
        }
    }

    #[test]
    fn test_dispatch_known_task() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(EchoEngine));
        let result = registry.dispatch("echo", "health", &json!({}));
        assert_eq!(result["status"], "ok");
    }

    #[test]
    fn test_dispatch_passes_payload_through() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(EchoEngine));
        let result = registry.dispatch("echo", "echo", &json!({"n": 3}));
        assert_eq!(result["echo"]["n"], 3);
    }

    #[test]
    fn test_unknown_engine_is_structured_error() {
        let registry = EngineRegistry::new();
        let result = registry.dispatch("pricing", "health", &json!({}));
        assert!(result["error"].as_str().unwrap().contains("unknown engine"));
    }

    #[test]
    fn test_unknown_task_is_structured_error() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(EchoEngine));
        let result = registry.dispatch("echo", "forecast", &json!({}));
        assert!(result["error"].as_str().unwrap().contains("unknown task"));
    }

    #[test]
    fn test_catalog_lists_engines_and_tasks() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(EchoEngine));
        let catalog = registry.catalog();
        assert_eq!(catalog["engines"][0]["name"], "echo");
        assert_eq!(catalog["engines"][0]["tasks"][0], "health");
    }
}
