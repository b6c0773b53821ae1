//! REST source: GET a JSON array and key each element.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::KeyValueStore;
use crate::error::LoadError;

/// Derives the cache key from a deserialized value. An error fails the load.
pub type KeyExtractor<V> = Arc<dyn Fn(&V) -> Result<String, LoadError> + Send + Sync>;

/// Loads a cache from an HTTP endpoint returning a JSON array.
///
/// `{...}` placeholders in the URL are URI-template slots filled, in order,
/// from the path parameters (percent-encoded). Query parameters are appended.
///
/// ```rust
/// # use mimir::source::RestSource;
/// #[derive(serde::Deserialize)]
/// struct User { id: u64, name: String }
///
/// let source = RestSource::new("https://api.example.com/{tenant}/users", |u: &User| u.id.to_string())
///     .path_param("acme")
///     .query_param("active", "true");
/// assert_eq!(source.expanded_url(), "https://api.example.com/acme/users");
/// ```
pub struct RestSource<V> {
    url: String,
    key_extractor: KeyExtractor<V>,
    path_params: Vec<String>,
    query_params: Vec<(String, String)>,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

impl<V> RestSource<V> {
    pub fn new(
        url: impl Into<String>,
        key_extractor: impl Fn(&V) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::try_new(url, move |value: &V| Ok(key_extractor(value)))
    }

    /// Like [`new`](Self::new), for elements that may not carry a key.
    pub fn try_new(
        url: impl Into<String>,
        key_extractor: impl Fn(&V) -> Result<String, LoadError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            url: url.into(),
            key_extractor: Arc::new(key_extractor),
            path_params: Vec::new(),
            query_params: Vec::new(),
            timeout: None,
            client: super::default_client(),
        }
    }

    /// Fill the next `{...}` slot in the URL.
    pub fn path_param(mut self, value: impl ToString) -> Self {
        self.path_params.push(value.to_string());
        self
    }

    /// Append a query parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    /// Bound each request. Without a timeout a hung endpoint keeps the cache
    /// refreshing until the connection gives up.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a shared HTTP client instead of a private one.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The URL template as configured.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL with path parameters substituted.
    pub fn expanded_url(&self) -> String {
        expand_template(&self.url, &self.path_params)
    }
}

impl<V: DeserializeOwned> RestSource<V> {
    pub async fn load(&self, store: &KeyValueStore<V>) -> Result<(), LoadError> {
        let url = self.expanded_url();
        debug!(url = %url, "fetching cache data");

        let mut request = self.client.get(&url);
        if !self.query_params.is_empty() {
            request = request.query(&self.query_params);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LoadError::Http(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LoadError::Http(format!("failed to read response body from {url}: {e}")))?;

        let serde_json::Value::Array(items) = serde_json::from_str::<serde_json::Value>(&body)?
        else {
            return Err(LoadError::NotArray);
        };

        for (index, item) in items.into_iter().enumerate() {
            let value: V =
                serde_json::from_value(item).map_err(|source| LoadError::Element { index, source })?;
            let key = (self.key_extractor)(&value)?;
            store.put(key, value);
        }
        Ok(())
    }
}

/// Read a field of a JSON element as a cache key.
///
/// Strings are taken verbatim, other values use their JSON rendering. A
/// missing or `null` field is an error.
pub fn field_key(item: &serde_json::Value, field: &str) -> Result<String, LoadError> {
    match item.get(field) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Null) | None => Err(LoadError::Extract {
            what: "key",
            message: format!("element has no '{field}' field"),
        }),
        Some(other) => Ok(other.to_string()),
    }
}

/// Substitute `{...}` slots with `params`, in order. Slots beyond the
/// supplied parameters are left untouched.
fn expand_template(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut params = params.iter();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        match params.next() {
            Some(value) => out.push_str(&encode_component(value)),
            None => out.push_str(&rest[open..=open + close]),
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Percent-encode a URI component (spaces as `%20`).
fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
