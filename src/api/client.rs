//! Client for the remote licensing API.
//!
//!   GET {base}/api/get_area.php               regions, boundaries, license holders
//!   GET {base}/api/info.php?location=<key>    contract and parcel details
//!
//! Both respond with JSON and store coordinates as `[lon, lat]`.

use super::cache::InfoCache;
use super::types::ApiError;
use crate::config::Config;
use crate::geometry;
use crate::registry::{Company, LicenseInfo, Region};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("nedra-map/", env!("CARGO_PKG_VERSION"));

/// Anything that can produce license info for a location key.
pub trait InfoSource: Send + Sync {
    fn fetch_info(&self, location: &str) -> Result<LicenseInfo, ApiError>;
}

/// An info source that also lists regions.
pub trait RegionSource: InfoSource {
    fn fetch_regions(&self) -> Result<Vec<Region>, ApiError>;
}

/// Blocking HTTP client with an optional on-disk response cache.
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    cache: Mutex<InfoCache>,
    offline: bool,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, cache: InfoCache) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(cache),
            offline: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let cache = InfoCache::load_from(config.cache_path.clone(), config.cache_ttl_days);
        let mut client = Self::new(
            &config.api_base_url,
            Duration::from_secs(config.http_timeout_secs),
            cache,
        );
        client.set_offline(config.offline);
        client
    }

    /// Offline mode: info comes only from the cache, regions are unavailable.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json(&self, path: &str, query: Option<(&str, &str)>) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.agent.get(&url);
        if let Some((key, value)) = query {
            request = request.query(key, value);
        }
        debug!(url = %url, "requesting");

        match request.call() {
            Ok(response) => response
                .into_json()
                .map_err(|e| ApiError::InvalidResponse(e.to_string())),
            // Error statuses may still carry a JSON body with an `error` field.
            Err(ureq::Error::Status(code, response)) => {
                debug!(url = %url, status = code, "error status from API");
                response
                    .into_json()
                    .map_err(|_| ApiError::Network(format!("HTTP status {} from {}", code, path)))
            }
            Err(e) => Err(ApiError::Network(e.to_string())),
        }
    }
}

impl InfoSource for ApiClient {
    fn fetch_info(&self, location: &str) -> Result<LicenseInfo, ApiError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(location) {
                debug!(location, "info cache hit");
                return Ok(hit);
            }
        }
        if self.offline {
            return Err(ApiError::Offline(location.to_string()));
        }

        let doc = self.get_json("/api/info.php", Some(("location", location)))?;
        let info = info_from_response(&doc, location)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(location, doc);
        }
        Ok(info)
    }
}

impl RegionSource for ApiClient {
    /// Every region with its boundary and license holders.
    fn fetch_regions(&self) -> Result<Vec<Region>, ApiError> {
        if self.offline {
            return Err(ApiError::Network("region list is not available offline".into()));
        }
        let doc = self.get_json("/api/get_area.php", None)?;
        let regions = regions_from_area(&doc);
        info!(count = regions.len(), "fetched regions");
        Ok(regions)
    }
}

/// Regions from a `get_area.php` document.
///
/// Features without at least one boundary point at
/// `region.coordinates[0][0][0]` are skipped; ids follow the kept order.
pub fn regions_from_area(doc: &Value) -> Vec<Region> {
    let Some(features) = doc.get("features").and_then(Value::as_array) else {
        return Vec::new();
    };

    features
        .iter()
        .filter_map(|feature| {
            let ring = feature.pointer("/region/coordinates/0/0")?;
            ring.get(0)?;
            Some((feature, ring))
        })
        .enumerate()
        .map(|(i, (feature, ring))| Region {
            id: format!("region-{}", i),
            name: feature
                .pointer("/properties/name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            companies: companies_of(feature),
            coordinates: geometry::flip_ring(ring),
            url: feature.get("url").and_then(Value::as_str).map(str::to_string),
        })
        .collect()
}

fn companies_of(feature: &Value) -> Vec<Company> {
    feature
        .get("company")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| serde_json::from_value(c.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Decode an `info.php` document; a truthy `error` field means not found.
pub fn info_from_response(doc: &Value, location: &str) -> Result<LicenseInfo, ApiError> {
    if doc.get("error").is_some_and(is_truthy) {
        return Err(ApiError::NotFound(location.to_string()));
    }
    if !doc.is_object() {
        return Err(ApiError::InvalidResponse("expected a JSON object".into()));
    }
    serde_json::from_value(doc.clone()).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::INFO_NOT_FOUND;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`; returns the base URL.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    fn client_for(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5), InfoCache::in_memory(7))
    }

    fn area_doc() -> Value {
        json!({
            "features": [
                {
                    "properties": {"name": "Глубоковский"},
                    "url": "https://example.kz/glubokoe.png",
                    "company": [
                        {"location": "11", "company_title": "ТОО А", "type": "добыча", "category": "ОПИ"},
                        "garbage",
                        {"location": "12", "company_title": "ТОО Б", "type": "разведка", "category": "ТПИ"}
                    ],
                    "region": {"coordinates": [[[[82.1, 50.1], [82.5, 50.1], [82.3, 50.4], [82.1, 50.1]]]]}
                },
                {
                    "properties": {"name": "Без границ"},
                    "company": [],
                    "region": {"coordinates": [[[]]]}
                },
                {
                    "properties": {"name": "Зайсанский"},
                    "region": {"coordinates": [[[[84.8, 47.4], [85.0, 47.5]]]]}
                }
            ]
        })
    }

    #[test]
    fn test_regions_from_area() {
        let regions = regions_from_area(&area_doc());
        assert_eq!(regions.len(), 2);

        assert_eq!(regions[0].id, "region-0");
        assert_eq!(regions[0].name, "Глубоковский");
        assert_eq!(regions[0].companies.len(), 2);
        assert_eq!(regions[0].coordinates[0], [50.1, 82.1]);
        assert_eq!(regions[0].url.as_deref(), Some("https://example.kz/glubokoe.png"));

        assert_eq!(regions[1].id, "region-1");
        assert_eq!(regions[1].name, "Зайсанский");
        assert!(regions[1].companies.is_empty());
        assert!(regions[1].url.is_none());
    }

    #[test]
    fn test_regions_keep_loosely_typed_companies() {
        let doc = json!({
            "features": [{
                "properties": {"name": "Уланский"},
                "company": [
                    {"location": 4471, "company_title": "ТОО А", "type": "добыча", "category": "ОПИ"},
                    {"location": "4472", "company_title": "ТОО Б", "type": null, "category": "ТПИ"},
                    {"location": "4473", "company_title": "ТОО В", "type": "разведка", "category": "ОПИ"}
                ],
                "region": {"coordinates": [[[[82.1, 49.1], [82.5, 49.1], [82.3, 49.4]]]]}
            }]
        });
        let regions = regions_from_area(&doc);
        let companies = &regions[0].companies;
        assert_eq!(companies.len(), 3);
        assert_eq!(companies[0].location, "4471");
        assert_eq!(companies[1].kind, "");
        assert_eq!(crate::registry::count_unique_titles(&regions[0]), 3);
    }

    #[test]
    fn test_regions_from_unexpected_doc() {
        assert!(regions_from_area(&json!({"status": "ok"})).is_empty());
        assert!(regions_from_area(&json!([])).is_empty());
    }

    #[test]
    fn test_info_error_flag() {
        let err = info_from_response(&json!({"error": "not found"}), "55").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref l) if l == "55"));
        assert_eq!(err.user_message(), "Информация не найдена");

        let ok = info_from_response(&json!({"error": false, "deposit": "Риддер"}), "56").unwrap();
        assert_eq!(ok.deposit.as_deref(), Some("Риддер"));
    }

    #[test]
    fn test_info_rejects_non_object() {
        assert!(matches!(
            info_from_response(&json!([1, 2]), "57"),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_offline_client_uses_cache_only() {
        let mut cache = InfoCache::in_memory(7);
        cache.put("42", json!({"nlicense": "777"}));
        let mut client = ApiClient::new("https://example.invalid/", Duration::from_secs(1), cache);
        client.set_offline(true);

        assert_eq!(client.base_url(), "https://example.invalid");
        assert_eq!(client.fetch_info("42").unwrap().nlicense.as_deref(), Some("777"));
        assert!(matches!(client.fetch_info("43"), Err(ApiError::Offline(_))));
        assert!(client.fetch_regions().is_err());
    }

    #[test]
    fn test_error_status_with_json_body_is_not_found() {
        let client = client_for(&serve_once("404 Not Found", r#"{"error":"not found"}"#));
        let err = client.fetch_info("1").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref l) if l == "1"));
        assert_eq!(err.user_message(), INFO_NOT_FOUND);
    }

    #[test]
    fn test_error_status_without_json_is_network() {
        let client = client_for(&serve_once("500 Internal Server Error", "oops"));
        assert!(matches!(client.fetch_info("2"), Err(ApiError::Network(_))));
    }

    #[test]
    fn test_fetch_info_success_is_cached() {
        let client = client_for(&serve_once("200 OK", r#"{"nlicense":"99-ОПИ"}"#));
        assert_eq!(client.fetch_info("3").unwrap().nlicense.as_deref(), Some("99-ОПИ"));
        // the listener is gone; the second call must come from the cache
        assert_eq!(client.fetch_info("3").unwrap().nlicense.as_deref(), Some("99-ОПИ"));
    }
}
