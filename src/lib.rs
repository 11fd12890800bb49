//! Personal budget cards whose amounts can be converted between currencies
//!
//! This crate is the layer a UI shell links against. It owns the record store
//! for the lifetime of a session, saves it after every edit, and runs currency
//! conversions off the UI context, reporting progress as [`Notice`]s.

#![deny(
    clippy::all,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic)]

mod app;
pub use app::{App, Notice};
pub mod config;
pub use config::Config;
pub mod logging;

pub use moneytracker_lib::{
    convert::Outcome, money, Amount, Currency, Expense, Person, PersonId, Store,
};
use moneytracker_lib::{convert, persistence, rates, store};

use confy::ConfyError;

/// Errors surfaced to the UI shell
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config")]
    Config(#[from] ConfyError),

    #[error("failed to set up logging")]
    Logging(#[from] logging::Error),

    #[error(transparent)]
    Store(#[from] store::Error),

    #[error("failed to load or save records: {0}")]
    Persistence(#[from] persistence::Error),

    #[error(transparent)]
    Rates(#[from] rates::Error),

    #[error("failed to convert records: {0}")]
    Convert(#[from] convert::Error),

    #[error("a currency conversion is already in progress")]
    ConversionInProgress,

    #[error("the record store is unavailable after a panic")]
    Poisoned,

    #[error("conversion task failed")]
    Task(#[from] tokio::task::JoinError),
}
