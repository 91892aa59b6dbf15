use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub json_logs: bool,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| default_service_name.to_string());
        Self {
            service_name,
            json_logs: json_logs(env::var("LOG_FORMAT").ok().as_deref()),
        }
    }
}

/// JSON unless `LOG_FORMAT` asks for a human format.
fn json_logs(format: Option<&str>) -> bool {
    format
        .map(|v| !matches!(v.trim().to_lowercase().as_str(), "text" | "pretty" | "plain"))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_json() {
        assert!(json_logs(None));
        assert!(json_logs(Some("json")));
        assert!(!json_logs(Some("Pretty")));
        assert!(!json_logs(Some(" text ")));
    }
}
