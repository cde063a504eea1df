use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{MarketDataSource, PriceChange};
use crate::config::MarketConfig;
use crate::error::MarketFetchError;

/// CoinGecko simple-price client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketFetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| MarketFetchError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Build request with optional API key
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self.client.get(&url);

        if let Some(key) = &self.api_key {
            req = req.header("x-cg-pro-api-key", key);
        }

        req
    }

    async fn request_json(&self, endpoint: &str) -> Result<serde_json::Value, MarketFetchError> {
        let started = Instant::now();

        let response = match tokio::time::timeout(
            self.request_timeout,
            self.build_request(endpoint).send(),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) if e.is_timeout() => {
                return Err(MarketFetchError::Timeout(self.request_timeout.as_secs()))
            }
            Ok(Err(e)) => return Err(MarketFetchError::Api(e.to_string())),
            Err(_) => return Err(MarketFetchError::Timeout(self.request_timeout.as_secs())),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MarketFetchError::Api(format!(
                "CoinGecko API error ({}): {}",
                status, text
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| MarketFetchError::InvalidResponse(e.to_string()))?;

        debug!(
            "CoinGecko {} answered in {}ms",
            endpoint,
            started.elapsed().as_millis()
        );
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn price_and_change(&self, market_id: &str) -> Result<PriceChange, MarketFetchError> {
        let endpoint = format!(
            "/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            market_id
        );
        let response = self.request_json(&endpoint).await?;

        let data = response
            .get(market_id)
            .ok_or_else(|| MarketFetchError::AssetNotFound(market_id.to_string()))?;

        // CoinGecko returns JSON numbers, so an f64 hop is unavoidable
        let price = data
            .get("usd")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| MarketFetchError::InvalidResponse("Missing usd price".to_string()))?;

        let pct_24h_change = data
            .get("usd_24h_change")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        Ok(PriceChange {
            usd_price: Decimal::try_from(price)
                .map_err(|e| MarketFetchError::InvalidResponse(e.to_string()))?,
            pct_24h_change,
        })
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, api_key: Option<&str>) -> MarketConfig {
        MarketConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            request_timeout: Duration::from_secs(2),
            ..MarketConfig::default()
        }
    }

    #[tokio::test]
    async fn test_parses_price_and_change() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "avalanche-2"))
            .and(query_param("include_24hr_change", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "avalanche-2": { "usd": 35.5, "usd_24h_change": -12.5 }
            })))
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(&config(&server, None)).unwrap();
        let quote = client.price_and_change("avalanche-2").await.unwrap();
        assert_eq!(quote.usd_price, Decimal::from_str_exact("35.5").unwrap());
        assert_eq!(quote.pct_24h_change, -12.5);
    }

    #[tokio::test]
    async fn test_sends_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-cg-pro-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "usd-coin": { "usd": 1.0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(&config(&server, Some("secret"))).unwrap();
        let quote = client.price_and_change("usd-coin").await.unwrap();
        assert_eq!(quote.usd_price, Decimal::from(1));
        // Missing change field reads as a flat day
        assert_eq!(quote.pct_24h_change, 0.0);
    }

    #[tokio::test]
    async fn test_error_status_and_missing_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("ids", "avalanche-2"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("ids", "usd-coin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(&config(&server, None)).unwrap();
        assert!(matches!(
            client.price_and_change("avalanche-2").await,
            Err(MarketFetchError::Api(_))
        ));
        assert!(matches!(
            client.price_and_change("usd-coin").await,
            Err(MarketFetchError::AssetNotFound(_))
        ));
    }
}
