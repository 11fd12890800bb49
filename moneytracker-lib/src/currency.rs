use std::{fmt, str::FromStr};

use rusty_money::iso;
use serde::{Deserialize, Serialize};

/// One of the currencies a budget can be kept in.
///
/// Exactly one currency is active for the whole [`Store`](crate::Store) at
/// any time, and every stored amount is a count of its minor units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar
    #[default]
    Usd,

    /// Japanese yen. Stored without a subunit.
    Jpy,

    /// Russian ruble
    Rub,
}

impl Currency {
    /// Every supported currency, in menu order
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Jpy, Currency::Rub];

    fn iso(self) -> &'static iso::Currency {
        match self {
            Self::Usd => iso::USD,
            Self::Jpy => iso::JPY,
            Self::Rub => iso::RUB,
        }
    }

    /// The three-letter ISO 4217 code
    #[must_use]
    pub fn code(self) -> &'static str {
        self.iso().iso_alpha_code
    }

    /// The display symbol, e.g. `$`
    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.iso().symbol
    }

    /// Number of decimal digits in the minor unit (2 for cents, 0 for yen)
    #[must_use]
    pub fn exponent(self) -> u32 {
        self.iso().exponent
    }

    /// How many minor units make up one major unit
    #[must_use]
    pub fn minor_scale(self) -> i64 {
        10_i64.pow(self.exponent())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Returned when parsing a currency code that isn't supported
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unsupported currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|currency| currency.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCurrency(s.to_string()))
    }
}
