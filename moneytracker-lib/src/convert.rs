//! Converting every stored amount to a new currency
//!
//! Conversion is split in two. [`Plan::fetch`] does the slow part: it fetches
//! exchange rates and computes the conversion factor, without touching the
//! store. [`Plan::apply`] then rewrites the store and saves it in one
//! synchronous step, which the caller runs while holding exclusive access to
//! the store.

use tracing::{instrument, Level};

use crate::{
    factor,
    money::round_half_up,
    persistence::{self, Persistence},
    rates, Currency, RateFetcher, Store,
};

/// The result of a conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// The store already held the target currency. Nothing was changed or
    /// saved.
    Unchanged,

    /// Every amount was rewritten and the store saved
    Converted {
        /// The currency the amounts were held in before
        from: Currency,

        /// The currency the amounts are held in now
        to: Currency,

        /// The factor every amount was multiplied by
        factor: f64,
    },
}

/// Errors that can occur when applying a conversion
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The plan was made for a currency the store no longer holds
    #[error("conversion was planned from {planned}, but amounts are now held in {actual}")]
    Stale {
        /// The currency the plan converts from
        planned: Currency,

        /// The store's active currency
        actual: Currency,
    },

    /// The converted store couldn't be saved. The store is left as it was
    /// before the conversion.
    #[error("failed to save converted amounts")]
    Persistence(#[from] persistence::Error),
}

/// Multiply every amount in the store by `factor` and make `target` the
/// active currency, then save the store once.
///
/// Each amount is rounded half-up to a whole number of the target's minor
/// units. Nothing happens if `target` is already the active currency.
///
/// # Errors
///
/// If the save fails, the store is restored to its state before the call and
/// the error is returned, so memory and disk never disagree about which
/// currency the amounts are in.
#[instrument(skip(store, persistence), fields(from = %store.currency()))]
pub fn convert_all(
    store: &mut Store,
    target: Currency,
    factor: f64,
    persistence: &dyn Persistence,
) -> Result<Outcome, Error> {
    let from = store.currency();
    if target == from {
        tracing::event!(Level::DEBUG, "already in target currency");
        return Ok(Outcome::Unchanged);
    }

    let before = store.clone();

    #[allow(clippy::cast_precision_loss)]
    for amount in store.amounts_mut() {
        *amount = round_half_up(*amount as f64 * factor);
    }
    store.set_currency(target);

    if let Err(error) = persistence.save(store) {
        tracing::event!(Level::ERROR, %error, "save failed, rolling back conversion");
        *store = before;
        return Err(error.into());
    }

    tracing::event!(Level::INFO, "converted all amounts");

    Ok(Outcome::Converted {
        from,
        to: target,
        factor,
    })
}

/// A conversion that is ready to apply: the factor has been computed from
/// freshly fetched rates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    from: Currency,
    to: Currency,
    factor: f64,
}

impl Plan {
    /// Fetch rates and compute the factor for converting `from` into `to`.
    ///
    /// No rates are fetched when the currencies are the same.
    ///
    /// # Errors
    ///
    /// Fails if no rate source could be reached
    #[instrument(skip(fetcher))]
    pub async fn fetch(
        fetcher: &RateFetcher,
        from: Currency,
        to: Currency,
    ) -> Result<Self, rates::Error> {
        if from == to {
            return Ok(Self {
                from,
                to,
                factor: 1.0,
            });
        }

        let rates = fetcher.fetch_usd_rates().await?;

        Ok(Self {
            from,
            to,
            factor: factor(from, to, &rates),
        })
    }

    /// The currency being converted from
    #[must_use]
    pub fn from(&self) -> Currency {
        self.from
    }

    /// The currency being converted to
    #[must_use]
    pub fn to(&self) -> Currency {
        self.to
    }

    /// The multiplier applied to every amount
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Convert the store, see [`convert_all`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stale`] if the store's active currency is not the one
    /// this plan converts from, and otherwise fails as [`convert_all`] does.
    pub fn apply(
        &self,
        store: &mut Store,
        persistence: &dyn Persistence,
    ) -> Result<Outcome, Error> {
        if store.currency() != self.from {
            return Err(Error::Stale {
                planned: self.from,
                actual: store.currency(),
            });
        }

        convert_all(store, self.to, self.factor, persistence)
    }
}
