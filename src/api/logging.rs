//! Structured logging with correlation tracking for SOAP calls
//!
//! Every call gets a correlation id so the request, its outcome and any
//! follow-up SQL can be matched up in the log file.

use crate::error::Error;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::time::Instant;

static SECRET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(pwd|password)\s*=\s*[^;'&<\s]*").expect("valid secret pattern"));

/// Masks `PWD=...` / `password=...` fragments before they reach the log.
pub fn mask_secrets(text: &str) -> String {
    SECRET_PATTERN.replace_all(text, "$1=***").into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct CallLogger {
    log_payloads: bool,
}

/// Context of a single remote call
#[derive(Debug, Clone)]
pub struct CallContext {
    pub correlation_id: String,
    pub service: String,
    pub method: String,
    pub start_time: Instant,
}

impl CallLogger {
    pub fn new(log_payloads: bool) -> Self {
        Self { log_payloads }
    }

    pub fn start_call(&self, service: &str, method: &str) -> CallContext {
        let context = CallContext {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            service: service.to_string(),
            method: method.to_string(),
            start_time: Instant::now(),
        };

        let log_data = json!({
            "event": "soap_call_started",
            "correlation_id": context.correlation_id,
            "service": context.service,
            "method": context.method,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        debug!("SOAP Call Started: {}", log_data);

        context
    }

    pub fn log_payload(&self, context: &CallContext, payload: &str) {
        if !self.log_payloads {
            return;
        }
        let log_data = json!({
            "event": "soap_request",
            "correlation_id": context.correlation_id,
            "payload": mask_secrets(payload),
        });
        debug!("SOAP Request: {}", log_data);
    }

    pub fn complete_call<T>(&self, context: &CallContext, outcome: &Result<T, Error>) {
        let duration = context.start_time.elapsed();
        let error_message = outcome.as_ref().err().map(|e| mask_secrets(&e.to_string()));

        let log_data = json!({
            "event": "soap_call_completed",
            "correlation_id": context.correlation_id,
            "service": context.service,
            "method": context.method,
            "duration_ms": duration.as_millis(),
            "success": outcome.is_ok(),
            "error_message": error_message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if outcome.is_ok() {
            debug!("SOAP Call Completed: {}", log_data);
        } else {
            warn!("SOAP Call Failed: {}", log_data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_connection_string_passwords() {
        let masked = mask_secrets("Driver={X};Server=s;UID=sa;PWD=geheim;");
        assert_eq!(masked, "Driver={X};Server=s;UID=sa;PWD=***;");
        assert_eq!(mask_secrets("password = hunter2&x=1"), "password=***&x=1");
    }

    #[test]
    fn contexts_get_distinct_correlation_ids() {
        let logger = CallLogger::new(false);
        let a = logger.start_call("p2core/Table", "getCompleteSQL");
        let b = logger.start_call("p2core/Table", "getCompleteSQL");
        assert_ne!(a.correlation_id, b.correlation_id);
        logger.complete_call::<()>(&a, &Ok(()));
    }
}
