//! A library for tracking personal budgets and converting every stored amount
//! between currencies using live exchange rates

#![deny(
    clippy::all,
    missing_debug_implementations,
    missing_copy_implementations,
    missing_docs
)]
#![warn(clippy::pedantic)]

mod currency;
pub use currency::{Currency, UnknownCurrency};
pub mod money;
#[doc(inline)]
pub use money::Amount;
pub mod rates;
#[doc(inline)]
pub use rates::{RateFetcher, UsdRates};
pub mod factor;
pub use factor::factor;
pub mod store;
#[doc(inline)]
pub use store::{Expense, Person, PersonId, Store};
pub mod persistence;
#[doc(inline)]
pub use persistence::{JsonFile, Persistence};
pub mod convert;
#[doc(inline)]
pub use convert::{convert_all, Outcome, Plan};
