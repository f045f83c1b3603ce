use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    /// The server answered 304 and the cached body was served.
    Revalidated,
    /// The network failed and a cached body was served instead.
    StaleCache,
    /// The write was stored in the offline queue.
    OfflineQueued,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub source: ResponseSource,
}

impl ApiResponse {
    pub fn is_stale(&self) -> bool {
        self.source == ResponseSource::StaleCache
    }

    pub fn is_queued(&self) -> bool {
        self.source == ResponseSource::OfflineQueued
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

/// Human-readable message for an error response body.
///
/// Looks at `detail` (a string, or a list of `{msg}` objects joined with
/// " • "), then `message`, then `error`.
pub fn error_message(status: u16, body: &Value) -> String {
    match body.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => return detail.clone(),
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(msg) => Some(msg.as_str()),
                    other => other.get("msg").and_then(Value::as_str),
                })
                .collect::<Vec<_>>()
                .join(" • ");
            if !joined.is_empty() {
                return joined;
            }
        }
        _ => {}
    }
    for field in ["message", "error"] {
        if let Some(Value::String(text)) = body.get(field) {
            if !text.trim().is_empty() {
                return text.clone();
            }
        }
    }
    format!("Request failed ({status})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_string_wins() {
        let body = json!({"detail": "Token expired", "message": "ignored"});
        assert_eq!(error_message(401, &body), "Token expired");
    }

    #[test]
    fn validation_details_are_joined() {
        let body = json!({"detail": [{"msg": "name required"}, {"msg": "age too low"}]});
        assert_eq!(error_message(422, &body), "name required • age too low");
    }

    #[test]
    fn falls_back_to_message_then_error_then_status() {
        assert_eq!(error_message(400, &json!({"message": "bad"})), "bad");
        assert_eq!(error_message(400, &json!({"error": "worse"})), "worse");
        assert_eq!(error_message(418, &json!("teapot")), "Request failed (418)");
        assert_eq!(error_message(500, &Value::Null), "Request failed (500)");
    }
}
