//! Geolocation lookup client.
//!
//! Calls an ipstack-compatible HTTP API: `GET {base}{ip}?access_key={key}`.
//! The decoded payload is stored verbatim with each lookup record, so the
//! field set mirrors what the provider returns; everything except the IP
//! itself is optional.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// One spoken language of the looked-up country.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<String>,
}

/// Extended location block of the provider payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_flag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_flag_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_flag_emoji_unicode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calling_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_eu: Option<bool>,
}

/// Structured geolocation data for one IP address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpInfo {
    pub ip: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ip_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub location: Location,
}

impl IpInfo {
    /// Serialize for storage alongside the lookup record.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the HTML chat summary for this lookup.
    ///
    /// Absent fields render as empty values, mirroring the provider's habit
    /// of omitting whatever it doesn't know.
    pub fn message_string(&self) -> String {
        let mut message = format!("<code>IP:</code> {}", self.ip);
        message += &format!("\n<code>Type:</code> {}", self.ip_type.as_deref().unwrap_or(""));
        message += &format!(
            "\n<code>Continent:</code> {}",
            self.continent_name.as_deref().unwrap_or("")
        );
        message += &format!(
            "\n<code>Country:</code> {} {}",
            self.country_name.as_deref().unwrap_or(""),
            self.location.country_flag_emoji.as_deref().unwrap_or("")
        );
        message += &format!("\n<code>Region:</code> {}", self.region_name.as_deref().unwrap_or(""));
        message += &format!("\n<code>City:</code> {}", self.city.as_deref().unwrap_or(""));
        message
    }
}

/// Black-box lookup seam: IP in, structured location data (or failure) out.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> AppResult<IpInfo>;
}

/// HTTP client for an ipstack-compatible endpoint.
pub struct IpstackClient {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl IpstackClient {
    pub fn new(base_url: String, access_key: String) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config::network::http_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url,
            access_key,
        })
    }

    /// Build the client from IPSTACK_URL / IPSTACK_ACCESS_KEY.
    pub fn from_env() -> AppResult<Self> {
        let access_key = config::ipstack::ACCESS_KEY.clone();
        if access_key.is_empty() {
            log::warn!("IPSTACK_ACCESS_KEY is not set; IP lookups will fail");
        }
        Self::new(config::ipstack::URL.clone(), access_key)
    }
}

#[async_trait]
impl GeoProvider for IpstackClient {
    async fn lookup(&self, ip: IpAddr) -> AppResult<IpInfo> {
        let url = format!("{}{}", self.base_url, ip);
        let response = self
            .http
            .get(&url)
            .query(&[("access_key", self.access_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus(status));
        }

        Ok(response.json::<IpInfo>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_payload() -> serde_json::Value {
        json!({
            "ip": "8.8.8.8",
            "type": "ipv4",
            "continent_code": "NA",
            "continent_name": "North America",
            "country_code": "US",
            "country_name": "United States",
            "region_code": "CA",
            "region_name": "California",
            "city": "Mountain View",
            "zip": "94041",
            "latitude": 37.3861,
            "longitude": -122.0839,
            "location": {
                "geoname_id": 5375480,
                "capital": "Washington D.C.",
                "languages": [{"code": "en", "name": "English", "native": "English"}],
                "country_flag_emoji": "🇺🇸",
                "calling_code": "1",
                "is_eu": false
            }
        })
    }

    #[test]
    fn decodes_full_payload() {
        let info: IpInfo = serde_json::from_value(sample_payload()).expect("decode");

        assert_eq!(info.ip, "8.8.8.8");
        assert_eq!(info.ip_type.as_deref(), Some("ipv4"));
        assert_eq!(info.country_name.as_deref(), Some("United States"));
        assert_eq!(info.location.calling_code.as_deref(), Some("1"));
        assert_eq!(info.location.languages.len(), 1);
    }

    #[test]
    fn tolerates_missing_and_null_fields() {
        let info: IpInfo =
            serde_json::from_value(json!({"ip": "203.0.113.9", "region_name": null})).expect("decode");

        assert_eq!(info.ip, "203.0.113.9");
        assert!(info.region_name.is_none());
        assert!(info.location.languages.is_empty());
    }

    #[test]
    fn message_string_renders_all_lines() {
        let info: IpInfo = serde_json::from_value(sample_payload()).expect("decode");
        let message = info.message_string();

        assert_eq!(
            message,
            "<code>IP:</code> 8.8.8.8\n\
             <code>Type:</code> ipv4\n\
             <code>Continent:</code> North America\n\
             <code>Country:</code> United States 🇺🇸\n\
             <code>Region:</code> California\n\
             <code>City:</code> Mountain View"
        );
    }

    #[test]
    fn stored_payload_round_trips_through_render() {
        let info: IpInfo = serde_json::from_value(sample_payload()).expect("decode");
        let stored = info.to_json().expect("serialize");

        let reloaded: IpInfo = serde_json::from_str(&stored).expect("re-decode");
        let message = reloaded.message_string();

        assert!(message.contains("8.8.8.8"));
        assert!(message.contains("United States"));
        assert!(message.contains("Mountain View"));
    }

    #[tokio::test]
    async fn lookup_hits_endpoint_with_access_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/8.8.8.8"))
            .and(query_param("access_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .mount(&server)
            .await;

        let client =
            IpstackClient::new(format!("{}/", server.uri()), "test-key".to_string()).expect("client");
        let info = client.lookup("8.8.8.8".parse().expect("ip")).await.expect("lookup");

        assert_eq!(info.city.as_deref(), Some("Mountain View"));
    }

    #[tokio::test]
    async fn lookup_maps_error_status_to_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = IpstackClient::new(format!("{}/", server.uri()), "k".to_string()).expect("client");
        let err = client.lookup("1.1.1.1".parse().expect("ip")).await.expect_err("must fail");

        assert!(matches!(err, AppError::HttpStatus(_)));
    }
}
