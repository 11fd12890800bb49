//! USD-based exchange rates from remote sources
//!
//! A [`RateFetcher`] holds an ordered list of [`RateSource`]s. Sources are
//! tried in order and the first complete answer wins; a failing source is
//! logged and the next one is tried. Only when every source has failed does
//! the fetcher report [`Error::RateUnavailable`].

use async_trait::async_trait;
use tracing::{instrument, Level};

use crate::Currency;

mod http;
pub use http::{extract_rates, HttpRateSource, SourceConfig, Timeouts};

/// How many JPY and RUB equal one US dollar at the time of fetching
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsdRates {
    /// Yen per dollar
    pub usd_to_jpy: f64,

    /// Rubles per dollar
    pub usd_to_rub: f64,
}

impl UsdRates {
    /// The number of major units of `currency` that equal one dollar
    #[must_use]
    pub fn usd_to(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Usd => 1.0,
            Currency::Jpy => self.usd_to_jpy,
            Currency::Rub => self.usd_to_rub,
        }
    }
}

/// The reason a single source failed to produce rates
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request failed, timed out, or returned an error status
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The body was not valid JSON
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The response had no object under the expected key
    #[error("response has no '{0}' object")]
    MissingRoot(String),

    /// A required rate was absent or not a positive number
    #[error("response has no usable {0} rate")]
    MissingRate(&'static str),
}

/// A single failed attempt, kept for diagnostics
#[derive(Debug)]
pub struct Failure {
    /// The name of the source that failed
    pub source: String,

    /// Why it failed
    pub error: SourceError,
}

/// Errors returned by the [`RateFetcher`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Every configured source failed
    #[error("could not retrieve exchange rates, check connectivity")]
    RateUnavailable {
        /// One entry per source, in the order they were tried
        failures: Vec<Failure>,
    },

    /// An HTTP client for a configured source couldn't be built
    #[error("failed to set up rate source client")]
    Client(#[from] reqwest::Error),
}

/// A remote service that quotes JPY and RUB against the dollar
#[async_trait]
pub trait RateSource: std::fmt::Debug + Send + Sync {
    /// A short name, used for logging
    fn name(&self) -> &str;

    /// Fetch a complete set of rates.
    ///
    /// # Errors
    ///
    /// A source fails if it can't be reached, or if its answer is missing
    /// either rate. Partial answers are failures.
    async fn fetch(&self) -> Result<UsdRates, SourceError>;
}

/// Fetches rates from an ordered list of sources, falling back from one to the
/// next.
#[derive(Debug)]
pub struct RateFetcher {
    sources: Vec<Box<dyn RateSource>>,
}

impl RateFetcher {
    /// Create a fetcher that tries `sources` in order
    #[must_use]
    pub fn new(sources: Vec<Box<dyn RateSource>>) -> Self {
        Self { sources }
    }

    /// Create a fetcher of HTTP sources from configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Client`] if an HTTP client can't be built
    pub fn from_config(sources: &[SourceConfig], timeouts: Timeouts) -> Result<Self, Error> {
        let sources = sources
            .iter()
            .map(|config| -> Result<Box<dyn RateSource>, Error> {
                Ok(Box::new(HttpRateSource::new(config.clone(), timeouts)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(sources))
    }

    /// Fetch the current rates from the first source that can provide them.
    ///
    /// There are no retries within a source. The worst-case duration is the
    /// sum of each source's timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateUnavailable`] if every source fails, or if there
    /// are no sources.
    #[instrument(skip(self))]
    pub async fn fetch_usd_rates(&self) -> Result<UsdRates, Error> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.fetch().await {
                Ok(rates) => {
                    tracing::event!(Level::INFO, source = source.name(), ?rates, "received rates");
                    return Ok(rates);
                }
                Err(error) => {
                    tracing::event!(Level::WARN, source = source.name(), %error, "rate source failed");
                    failures.push(Failure {
                        source: source.name().to_string(),
                        error,
                    });
                }
            }
        }

        Err(Error::RateUnavailable { failures })
    }
}
