//! Operator-facing progress lines.

use async_trait::async_trait;
use deployflow::events::{types, EventSink};
use serde_json::Value;

/// Prints health-check attempts and stage completions to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressPrinter;

impl ProgressPrinter {
    fn line(event_type: &str, data: Option<&Value>) -> Option<String> {
        let data = data?;
        let field = |name: &str| data.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
        match event_type {
            types::HEALTH_ATTEMPT => {
                let attempt = data.get("attempt").and_then(Value::as_u64).unwrap_or_default();
                let outcome = if data.get("succeeded").and_then(Value::as_bool).unwrap_or(false) {
                    "succeeded"
                } else {
                    "failed"
                };
                Some(format!("Attempt {attempt} health check {outcome} for url={}", field("url")))
            }
            types::HEALTH_DOWN => Some(format!("ERROR: {} is DOWN at url={}", field("service"), field("url"))),
            types::STAGE_COMPLETED => Some(format!("Stage {} complete", field("stage"))),
            _ => None,
        }
    }
}

#[async_trait]
impl EventSink for ProgressPrinter {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        if let Some(line) = Self::line(event_type, data.as_ref()) {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attempt_lines() {
        let ok = json!({"service": "jupyterhub", "url": "https://x/hub/api/", "attempt": 2, "succeeded": true});
        let failed = json!({"service": "jupyterhub", "url": "https://x/hub/api/", "attempt": 1, "succeeded": false});

        assert_eq!(
            ProgressPrinter::line(types::HEALTH_ATTEMPT, Some(&ok)).as_deref(),
            Some("Attempt 2 health check succeeded for url=https://x/hub/api/")
        );
        assert_eq!(
            ProgressPrinter::line(types::HEALTH_ATTEMPT, Some(&failed)).as_deref(),
            Some("Attempt 1 health check failed for url=https://x/hub/api/")
        );
    }

    #[test]
    fn test_other_events_are_silent() {
        assert!(ProgressPrinter::line(types::STAGE_STATE, Some(&json!({"stage": "a"}))).is_none());
        assert!(ProgressPrinter::line(types::HEALTH_ATTEMPT, None).is_none());
    }
}
