use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, Level};

use super::{RateSource, SourceError, UsdRates};
use crate::Currency;

/// Connection and read timeouts applied to each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to establish a connection
    pub connect: Duration,

    /// Maximum time to wait for the response once connected
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(8),
            read: Duration::from_secs(8),
        }
    }
}

/// Where to find a JSON document of USD-based rates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// A short name, used for logging
    pub name: String,

    /// The endpoint to `GET`
    pub url: String,

    /// The key of the object holding the rates, keyed by currency code
    #[serde(default = "default_root_key")]
    pub root_key: String,
}

fn default_root_key() -> String {
    "rates".to_string()
}

impl SourceConfig {
    /// The built-in sources, in the order they should be tried
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "exchangerate.host".to_string(),
                url: "https://api.exchangerate.host/latest?base=USD&symbols=JPY,RUB".to_string(),
                root_key: default_root_key(),
            },
            Self {
                name: "open.er-api.com".to_string(),
                url: "https://open.er-api.com/v6/latest/USD".to_string(),
                root_key: default_root_key(),
            },
        ]
    }
}

/// A [`RateSource`] backed by a JSON HTTP endpoint
#[derive(Debug)]
pub struct HttpRateSource {
    client: Client,
    config: SourceConfig,
}

impl HttpRateSource {
    /// Create a source for the given endpoint
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client can't be built, for instance when the TLS
    /// backend can't be initialised
    pub fn new(config: SourceConfig, timeouts: Timeouts) -> Result<Self, reqwest::Error> {
        let client = client_builder(timeouts).build()?;
        Ok(Self::with_client(client, config))
    }

    fn with_client(client: Client, config: SourceConfig) -> Self {
        Self { client, config }
    }
}

fn client_builder(timeouts: Timeouts) -> ClientBuilder {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .read_timeout(timeouts.read)
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    #[instrument(skip(self), fields(source = %self.config.name))]
    async fn fetch(&self) -> Result<UsdRates, SourceError> {
        let body = self
            .client
            .get(&self.config.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        tracing::event!(Level::DEBUG, bytes = body.len(), "received response");

        extract_rates(&body, &self.config.root_key)
    }
}

/// Read the JPY and RUB rates out of a JSON document such as
/// `{"rates": {"JPY": 150.1, "RUB": 90.2}}`.
///
/// # Errors
///
/// Fails if the body isn't JSON, if there is no object under `root_key`, or if
/// either rate is missing, non-numeric, or not positive.
pub fn extract_rates(body: &str, root_key: &str) -> Result<UsdRates, SourceError> {
    let document: Value = serde_json::from_str(body)?;

    let rates = document
        .get(root_key)
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::MissingRoot(root_key.to_string()))?;

    let rate = |currency: Currency| {
        let code = currency.code();
        rates
            .get(code)
            .and_then(Value::as_f64)
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or(SourceError::MissingRate(code))
    };

    Ok(UsdRates {
        usd_to_jpy: rate(Currency::Jpy)?,
        usd_to_rub: rate(Currency::Rub)?,
    })
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::RateFetcher;

    const QUICK: Timeouts = Timeouts {
        connect: Duration::from_millis(500),
        read: Duration::from_millis(200),
    };

    const RATES_BODY: &str = r#"{"rates": {"JPY": 150.5, "RUB": 90}}"#;

    fn reply(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Answer every request with `response`, returning the endpoint
    async fn serve(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/latest", listener.local_addr().unwrap());

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        url
    }

    /// Accept connections but never answer, returning the endpoint
    async fn silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/latest", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        url
    }

    fn source(name: &str, url: String) -> HttpRateSource {
        let client = client_builder(QUICK).no_proxy().build().unwrap();
        HttpRateSource::with_client(
            client,
            SourceConfig {
                name: name.to_string(),
                url,
                root_key: default_root_key(),
            },
        )
    }

    #[tokio::test]
    async fn fetches_rates() {
        let url = serve(reply("200 OK", RATES_BODY)).await;

        let rates = source("local", url).fetch().await.unwrap();

        assert_eq!(rates.usd_to_jpy, 150.5);
        assert_eq!(rates.usd_to_rub, 90.0);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let url = silent().await;

        let result = source("silent", url).fetch().await;

        assert!(matches!(result, Err(SourceError::Http(_))));
    }

    #[tokio::test]
    async fn error_status_is_a_failure() {
        let url = serve(reply("500 Internal Server Error", "")).await;

        let result = source("broken", url).fetch().await;

        assert!(matches!(
            result,
            Err(SourceError::Http(e))
                if e.status() == Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }

    #[tokio::test]
    async fn html_body_is_malformed() {
        let url = serve(reply("200 OK", "<html>maintenance</html>")).await;

        let result = source("proxy", url).fetch().await;

        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[tokio::test]
    async fn falls_back_past_silent_source() {
        let fetcher = RateFetcher::new(vec![
            Box::new(source("silent", silent().await)),
            Box::new(source("backup", serve(reply("200 OK", RATES_BODY)).await)),
        ]);

        let rates = fetcher.fetch_usd_rates().await.unwrap();

        assert_eq!(rates.usd_to_jpy, 150.5);
    }

    #[test]
    fn builds_from_config() {
        let config = SourceConfig::defaults().remove(0);
        assert!(HttpRateSource::new(config, Timeouts::default()).is_ok());
    }

    #[test]
    fn complete_response() {
        let body = r#"{"result": "success", "base_code": "USD", "rates": {"USD": 1, "JPY": 149.87, "RUB": 92}}"#;

        let rates = extract_rates(body, "rates").unwrap();

        assert_eq!(rates.usd_to_jpy, 149.87);
        assert_eq!(rates.usd_to_rub, 92.0);
    }

    #[test]
    fn partial_response_is_a_failure() {
        let body = r#"{"rates": {"JPY": 149.87}}"#;
        assert!(matches!(
            extract_rates(body, "rates"),
            Err(SourceError::MissingRate("RUB"))
        ));
    }

    #[test]
    fn non_numeric_rate() {
        let body = r#"{"rates": {"JPY": "149.87", "RUB": 92.0}}"#;
        assert!(matches!(
            extract_rates(body, "rates"),
            Err(SourceError::MissingRate("JPY"))
        ));
    }

    #[test]
    fn zero_rate() {
        let body = r#"{"rates": {"JPY": 0, "RUB": 92.0}}"#;
        assert!(matches!(
            extract_rates(body, "rates"),
            Err(SourceError::MissingRate("JPY"))
        ));
    }

    #[test]
    fn missing_root() {
        let body = r#"{"success": false, "error": {"code": 101}}"#;
        assert!(matches!(
            extract_rates(body, "rates"),
            Err(SourceError::MissingRoot(key)) if key == "rates"
        ));
    }

    #[test]
    fn custom_root_key() {
        let body = r#"{"quotes": {"JPY": 150, "RUB": 90}}"#;
        assert!(extract_rates(body, "quotes").is_ok());
    }

    #[test]
    fn not_json() {
        assert!(matches!(
            extract_rates("<html>502 Bad Gateway</html>", "rates"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn deserialise_yaml() {
        let raw = r#"
        name: backup
        url: https://example.com/latest/USD
        "#;

        let config: SourceConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.root_key, "rates");
    }

    #[test]
    fn default_sources_are_ordered() {
        let names: Vec<_> = SourceConfig::defaults()
            .into_iter()
            .map(|source| source.name)
            .collect();
        assert_eq!(names, ["exchangerate.host", "open.er-api.com"]);
    }
}
