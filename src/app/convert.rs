use std::{fmt, sync::Arc};

use moneytracker_lib::{convert::Plan, Currency, Outcome};
use tracing::{instrument, Level};

use super::App;
use crate::Error;

/// Progress of a currency conversion, for display by the UI shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Rates are being fetched
    FetchingRates,

    /// Every amount is now held in this currency
    Converted(Currency),

    /// The conversion failed and nothing was changed
    Failed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchingRates => write!(f, "fetching exchange rates…"),
            Self::Converted(currency) => write!(f, "converted to {}", currency),
            Self::Failed(cause) => write!(f, "exchange rate error: {}", cause),
        }
    }
}

impl App {
    /// Convert every stored amount into `target`.
    ///
    /// Rates are fetched first, without holding the store, so edits made while
    /// waiting on the network still go through and are converted along with
    /// everything else. The store is then held for the rewrite and the single
    /// save. Notices report progress; [`Notice::Converted`] is only sent once
    /// the store has been rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConversionInProgress`] if another conversion hasn't
    /// finished yet, and [`Error::Rates`] if no rate source could be reached.
    /// On any error the records are left as they were.
    #[instrument(skip(self))]
    pub async fn convert_to(&self, target: Currency) -> Result<Outcome, Error> {
        if self.active_currency()? == target {
            return Ok(Outcome::Unchanged);
        }

        let _in_flight = self
            .in_flight
            .try_lock()
            .map_err(|_| Error::ConversionInProgress)?;

        self.notify(Notice::FetchingRates);

        let result = self.fetch_and_apply(target).await;

        match &result {
            Ok(Outcome::Converted { .. }) => self.notify(Notice::Converted(target)),
            Ok(Outcome::Unchanged) => {}
            Err(error) => {
                tracing::event!(Level::WARN, %error, "conversion failed");
                self.notify(Notice::Failed(error.to_string()));
            }
        }

        result
    }

    async fn fetch_and_apply(&self, target: Currency) -> Result<Outcome, Error> {
        let current = self.active_currency()?;
        let plan = Plan::fetch(&self.fetcher, current, target).await?;

        // the rewrite ends in a synced file write
        let store = Arc::clone(&self.store);
        let persistence = Arc::clone(&self.persistence);
        tokio::task::spawn_blocking(move || -> Result<Outcome, Error> {
            let mut store = super::lock(&store)?;
            Ok(plan.apply(&mut store, persistence.as_ref())?)
        })
        .await?
    }

    fn notify(&self, notice: Notice) {
        tracing::event!(Level::DEBUG, %notice);
        if let Some(sender) = &self.notices {
            // the receiver may have been dropped by the UI
            let _ = sender.send(notice);
        }
    }
}
