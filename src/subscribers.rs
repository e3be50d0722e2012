use crate::error::{RelayError, RelayResult};
use crate::types::{DeliveryTarget, InboundCallback};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

fn default_method() -> String {
    "POST".into()
}

/// One subscribed endpoint for a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Read-only token -> subscribers lookup, loaded once at startup.
///
/// File format: `{ "<token>": [ { "url": "...", "method": "POST", "headers": {}, "secret": null } ] }`
#[derive(Debug, Clone, Default)]
pub struct SubscriberDirectory {
    by_token: HashMap<String, Vec<Subscriber>>,
}

impl SubscriberDirectory {
    pub fn new(by_token: HashMap<String, Vec<Subscriber>>) -> Self {
        Self { by_token }
    }

    pub fn load(path: &Path) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Directory(format!("failed to read {}: {e}", path.display()))
        })?;
        let by_token: HashMap<String, Vec<Subscriber>> = serde_json::from_str(&content)
            .map_err(|e| {
                RelayError::Directory(format!("failed to parse {}: {e}", path.display()))
            })?;

        for (token, subscribers) in &by_token {
            if let Some(bad) = subscribers.iter().find(|s| s.url.trim().is_empty()) {
                return Err(RelayError::Directory(format!(
                    "subscriber of token {token} has an empty url (method {})",
                    bad.method
                )));
            }
        }

        Ok(Self::new(by_token))
    }

    pub fn get(&self, token: &str) -> &[Subscriber] {
        self.by_token.get(token).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn token_count(&self) -> usize {
        self.by_token.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.by_token.values().map(Vec::len).sum()
    }

    /// Build one delivery target per subscriber of `callback.token`.
    /// Every subscriber receives the whole callback as its body.
    pub fn targets_for(&self, callback: &InboundCallback) -> RelayResult<Vec<DeliveryTarget>> {
        let subscribers = self.get(&callback.token);
        if subscribers.is_empty() {
            return Ok(Vec::new());
        }

        let data = serde_json::to_value(callback)?;
        Ok(subscribers
            .iter()
            .map(|s| DeliveryTarget {
                url: s.url.clone(),
                method: s.method.clone(),
                headers: s.headers.clone(),
                data: data.clone(),
                secret: s.secret.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_directory(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_applies_defaults() {
        let file = write_directory(
            r#"{
                "tok_a": [
                    { "url": "http://a.test/hook" },
                    { "url": "http://b.test/hook", "method": "PUT", "headers": { "X-Key": "1" }, "secret": "k" }
                ],
                "tok_b": []
            }"#,
        );

        let dir = SubscriberDirectory::load(file.path()).unwrap();
        assert_eq!(dir.token_count(), 2);
        assert_eq!(dir.subscriber_count(), 2);

        let subs = dir.get("tok_a");
        assert_eq!(subs[0].method, "POST");
        assert!(subs[0].headers.is_empty());
        assert_eq!(subs[0].secret, None);
        assert_eq!(subs[1].method, "PUT");
        assert_eq!(subs[1].headers.get("X-Key").map(String::as_str), Some("1"));
        assert_eq!(subs[1].secret.as_deref(), Some("k"));
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let file = write_directory(r#"{ "tok": { "url": "x" } }"#);
        let err = SubscriberDirectory::load(file.path()).unwrap_err();
        assert!(matches!(err, RelayError::Directory(_)));
    }

    #[test]
    fn test_load_rejects_empty_url() {
        let file = write_directory(r#"{ "tok": [ { "url": "  " } ] }"#);
        assert!(SubscriberDirectory::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = SubscriberDirectory::load(Path::new("/nonexistent/subscribers.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_targets_for_carries_callback_as_body() {
        let mut by_token = HashMap::new();
        by_token.insert(
            "tok".to_string(),
            vec![
                Subscriber {
                    url: "http://a.test".into(),
                    method: "POST".into(),
                    headers: BTreeMap::new(),
                    secret: None,
                },
                Subscriber {
                    url: "http://b.test".into(),
                    method: "PATCH".into(),
                    headers: BTreeMap::from([("Authorization".to_string(), "Bearer x".to_string())]),
                    secret: Some("k".into()),
                },
            ],
        );
        let dir = SubscriberDirectory::new(by_token);

        let callback = InboundCallback {
            event: "paid".into(),
            token: "tok".into(),
            data: json!({ "id": 7 }).as_object().cloned().unwrap(),
        };
        let targets = dir.targets_for(&callback).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].method, "PATCH");
        assert_eq!(targets[1].secret.as_deref(), Some("k"));
        for target in &targets {
            assert_eq!(
                target.data,
                json!({ "event": "paid", "token": "tok", "data": { "id": 7 } })
            );
        }
    }

    #[test]
    fn test_targets_for_unknown_token_is_empty() {
        let dir = SubscriberDirectory::default();
        let callback = InboundCallback {
            token: "nobody".into(),
            ..Default::default()
        };
        assert!(dir.targets_for(&callback).unwrap().is_empty());
    }
}
