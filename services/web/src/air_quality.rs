//! Air-quality index lookup against the OpenWeatherMap air pollution API
//!
//! Every failure (transport, timeout, status, payload shape) degrades to
//! [`AirQuality::Unavailable`]. Nothing is retried.

use anyhow::Result;
use serde::Deserialize;
use std::{fmt, time::Duration};
use tracing::warn;

/// Air-quality gateway configuration
#[derive(Debug, Clone)]
pub struct AirQualityConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Coordinate shown on the home page
    pub latitude: f64,
    pub longitude: f64,
}

impl AirQualityConfig {
    /// Create a new AirQualityConfig from environment variables
    ///
    /// # Environment Variables
    /// - `OPENWEATHERMAP_API`: API key (default: empty, requests will fail and degrade)
    /// - `AIR_QUALITY_BASE_URL`: API root (default: "http://api.openweathermap.org")
    /// - `AIR_QUALITY_TIMEOUT_SECONDS`: Request timeout (default: 5)
    /// - `AIR_QUALITY_LAT` / `AIR_QUALITY_LON`: Coordinate (default: Kathmandu)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENWEATHERMAP_API").unwrap_or_default();
        if api_key.is_empty() {
            warn!("OPENWEATHERMAP_API is not set, air quality will be unavailable");
        }

        let base_url = std::env::var("AIR_QUALITY_BASE_URL")
            .unwrap_or_else(|_| "http://api.openweathermap.org".to_string());

        let timeout_seconds = std::env::var("AIR_QUALITY_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let latitude = std::env::var("AIR_QUALITY_LAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(27.7172);

        let longitude = std::env::var("AIR_QUALITY_LON")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(85.3240);

        Ok(Self {
            api_key,
            base_url,
            timeout: Duration::from_secs(timeout_seconds),
            latitude,
            longitude,
        })
    }
}

/// Result of an air-quality lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQuality {
    Index(i64),
    Unavailable,
}

impl fmt::Display for AirQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirQuality::Index(index) => write!(f, "{}", index),
            AirQuality::Unavailable => f.write_str("Unavailable"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct AirPollutionEntry {
    main: AirPollutionMain,
}

#[derive(Debug, Deserialize)]
struct AirPollutionMain {
    aqi: i64,
}

/// Client for the air pollution endpoint
#[derive(Clone)]
pub struct AirQualityClient {
    http: reqwest::Client,
    config: AirQualityConfig,
}

impl AirQualityClient {
    /// Create a new client; the timeout covers the whole request
    pub fn new(config: AirQualityConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Index for the configured coordinate
    pub async fn current(&self) -> AirQuality {
        self.get_index(self.config.latitude, self.config.longitude)
            .await
    }

    /// Index for an arbitrary coordinate
    pub async fn get_index(&self, lat: f64, lon: f64) -> AirQuality {
        match self.fetch_index(lat, lon).await {
            Ok(index) => AirQuality::Index(index),
            Err(e) => {
                warn!("Air quality lookup failed for ({}, {}): {:#}", lat, lon, e);
                AirQuality::Unavailable
            }
        }
    }

    /// Errors never carry the request URL, which holds the API key
    async fn fetch_index(&self, lat: f64, lon: f64) -> Result<i64> {
        let url = format!(
            "{}/data/2.5/air_pollution",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.config.api_key.clone()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .error_for_status()
            .map_err(reqwest::Error::without_url)?;

        let body = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;
        parse_index(&body)
    }
}

/// Extract `list[0].main.aqi` from an air pollution payload
fn parse_index(body: &str) -> Result<i64> {
    let payload: AirPollutionResponse = serde_json::from_str(body)?;
    payload
        .list
        .first()
        .map(|entry| entry.main.aqi)
        .ok_or_else(|| anyhow::anyhow!("Air pollution payload has an empty list"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
    use std::net::SocketAddr;

    const SAMPLE: &str = r#"{"coord":{"lon":85.324,"lat":27.7172},"list":[{"main":{"aqi":4},"components":{"co":1001.36,"pm2_5":60.1},"dt":1700000000}]}"#;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn client_for(base_url: String, timeout: Duration) -> AirQualityClient {
        AirQualityClient::new(AirQualityConfig {
            api_key: "test-key".to_string(),
            base_url,
            timeout,
            latitude: 27.7172,
            longitude: 85.3240,
        })
        .unwrap()
    }

    #[test]
    fn parses_first_entry_index() {
        assert_eq!(parse_index(SAMPLE).unwrap(), 4);
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(parse_index(r#"{"list":[]}"#).is_err());
        assert!(parse_index(r#"{"list":[{"main":{}}]}"#).is_err());
        assert!(parse_index(r#"{"cod":401,"message":"Invalid API key"}"#).is_err());
        assert!(parse_index("not json").is_err());
    }

    #[test]
    fn renders_sentinel_as_text() {
        assert_eq!(AirQuality::Index(2).to_string(), "2");
        assert_eq!(AirQuality::Unavailable.to_string(), "Unavailable");
    }

    #[tokio::test]
    async fn returns_index_from_live_endpoint() {
        let router = Router::new().route("/data/2.5/air_pollution", get(|| async { SAMPLE }));
        let addr = serve(router).await;

        let client = client_for(format!("http://{}", addr), Duration::from_secs(5));
        assert_eq!(client.current().await, AirQuality::Index(4));
    }

    #[tokio::test]
    async fn malformed_json_is_unavailable() {
        let router = Router::new().route(
            "/data/2.5/air_pollution",
            get(|| async { "{\"list\": [ {\"main\": " }),
        );
        let addr = serve(router).await;

        let client = client_for(format!("http://{}", addr), Duration::from_secs(5));
        assert_eq!(client.get_index(1.0, 2.0).await, AirQuality::Unavailable);
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let router = Router::new().route(
            "/data/2.5/air_pollution",
            get(|| async { (StatusCode::UNAUTHORIZED, "Invalid API key").into_response() }),
        );
        let addr = serve(router).await;

        let client = client_for(format!("http://{}", addr), Duration::from_secs(5));
        assert_eq!(client.current().await, AirQuality::Unavailable);
    }

    #[tokio::test]
    async fn timeout_is_unavailable() {
        let router = Router::new().route(
            "/data/2.5/air_pollution",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                SAMPLE
            }),
        );
        let addr = serve(router).await;

        let client = client_for(format!("http://{}", addr), Duration::from_millis(100));
        assert_eq!(client.current().await, AirQuality::Unavailable);
    }

    #[tokio::test]
    async fn failures_do_not_expose_api_key() {
        let router = Router::new().route(
            "/data/2.5/air_pollution",
            get(|| async { (StatusCode::UNAUTHORIZED, "Invalid API key").into_response() }),
        );
        let addr = serve(router).await;
        let client = client_for(format!("http://{}", addr), Duration::from_secs(5));

        let err = client.fetch_index(1.0, 2.0).await.unwrap_err();
        let logged = format!("{:#}", err);
        assert!(logged.contains("401"), "{}", logged);
        assert!(!logged.contains("test-key"), "{}", logged);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(format!("http://{}", dead), Duration::from_secs(2));

        let err = client.fetch_index(1.0, 2.0).await.unwrap_err();
        assert!(!format!("{:#}", err).contains("test-key"));
        assert!(!format!("{:?}", err).contains("test-key"));
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr), Duration::from_secs(2));
        assert_eq!(client.current().await, AirQuality::Unavailable);
    }
}
