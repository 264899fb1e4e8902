//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use console::style;

use pollux_adapter_http::RemoteBackend;
use pollux_adapter_sim::SimulatorBackend;
use pollux_engine::{JsonResultStore, Outcome, ResultEntry};
use pollux_hal::{BackendRegistry, ParamValue, Payload};

/// Registry with every backend the CLI knows how to build.
pub fn create_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register::<SimulatorBackend>("simulator");
    registry.register::<RemoteBackend>("http");
    registry
}

/// Open the persistent result store under `state_dir`, creating it if needed.
pub async fn open_store(state_dir: &Path) -> Result<Arc<JsonResultStore>> {
    let store = JsonResultStore::new(state_dir).await.map_err(|e| {
        anyhow::anyhow!("Failed to open result store at {}: {e}", state_dir.display())
    })?;
    Ok(Arc::new(store))
}

/// Interpret a command-line payload as JSON, falling back to plain text.
pub fn parse_payload(raw: &str) -> Payload {
    serde_json::from_str::<serde_json::Value>(raw)
        .map_or_else(|_| Payload::from(raw), Payload::from)
}

/// Parse a `key=value` parameter.
///
/// Values are typed as bool, integer or float where they parse as one, and
/// as text otherwise.
pub fn parse_param(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid parameter '{raw}': expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid parameter '{raw}': empty key");
    }

    let value = if let Ok(b) = value.parse::<bool>() {
        ParamValue::Bool(b)
    } else if let Ok(i) = value.parse::<i64>() {
        ParamValue::Int(i)
    } else if let Ok(x) = value.parse::<f64>() {
        ParamValue::Float(x)
    } else {
        ParamValue::Text(value.to_string())
    };
    Ok((key.to_string(), value))
}

/// Print a result entry in table form (shared by run and result).
pub fn print_entry(entry: &ResultEntry) {
    match &entry.outcome {
        Outcome::Success { result_payload } => {
            println!(
                "\n{} {} completed",
                style("✓").green().bold(),
                style(&entry.work_unit_id).bold()
            );
            println!("  Result: {result_payload}");
        }
        Outcome::Failure {
            error_kind,
            message,
        } => {
            println!(
                "\n{} {} failed ({})",
                style("✗").red().bold(),
                style(&entry.work_unit_id).bold(),
                style(error_kind).yellow()
            );
            println!("  Reason: {message}");
        }
    }
    println!(
        "  Completed at: {}",
        entry.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_json_and_text() {
        assert_eq!(
            parse_payload(r#"{"expr": "2+2"}"#),
            Payload::from(serde_json::json!({"expr": "2+2"}))
        );
        assert_eq!(parse_payload("2+2"), Payload::from("2+2"));
        assert_eq!(parse_payload("42"), Payload::from(serde_json::json!(42)));
    }

    #[test]
    fn test_parse_param_types() {
        assert_eq!(
            parse_param("verbose=true").unwrap(),
            ("verbose".to_string(), ParamValue::Bool(true))
        );
        assert_eq!(
            parse_param("shots=100").unwrap(),
            ("shots".to_string(), ParamValue::Int(100))
        );
        assert_eq!(
            parse_param("angle=0.5").unwrap(),
            ("angle".to_string(), ParamValue::Float(0.5))
        );
        assert_eq!(
            parse_param("target=a=b").unwrap(),
            ("target".to_string(), ParamValue::Text("a=b".into()))
        );
    }

    #[test]
    fn test_parse_param_invalid() {
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=5").is_err());
    }

    #[test]
    fn test_registry_backends() {
        let registry = create_registry();
        assert_eq!(registry.available(), vec!["http", "simulator"]);
    }

    #[tokio::test]
    async fn test_open_store_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("nested").join("state");
        open_store(&state_dir).await.unwrap();
        assert!(state_dir.join("results").is_dir());
    }
}
