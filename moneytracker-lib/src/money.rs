//! Conversion between user-facing decimal text and integer minor units
//!
//! Amounts are stored as a count of the active currency's minor units. For
//! dollars and rubles that is cents; the yen has no subunit in common use, so a
//! yen amount is stored as whole yen. Every function here is pure and
//! infallible: text that can't be read as a number is treated as zero.

use std::fmt;

use crate::Currency;

/// An amount of minor units, tagged with the currency it is denominated in.
///
/// Stored amounts carry no currency of their own (the store has a single
/// active currency). The tag exists so that edits entering the store can be
/// checked against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    /// Count of minor units
    pub minor: i64,

    /// The currency the minor units belong to
    pub currency: Currency,
}

impl Amount {
    /// Create an amount from a count of minor units
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Parse user input, see [`parse_to_minor_units`]
    #[must_use]
    pub fn parse(text: &str, currency: Currency) -> Self {
        Self::new(parse_to_minor_units(text, currency), currency)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format(self.minor, self.currency))
    }
}

/// Read a decimal string as a count of minor units of `currency`.
///
/// For currencies with a subunit, either `,` or `.` may be used as the
/// decimal separator. Any other non-numeric characters are stripped and the
/// remainder is scaled to minor units, rounding half-up. For the yen, every
/// non-digit is stripped and the digits are taken as whole yen.
///
/// Unparseable or empty input yields `0`.
#[must_use]
pub fn parse_to_minor_units(text: &str, currency: Currency) -> i64 {
    if currency.exponent() == 0 {
        let digits: String = text.chars().filter(char::is_ascii_digit).collect();
        return digits.parse().unwrap_or(0);
    }

    let decimal: String = text
        .chars()
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let scale = currency.minor_scale() as f64;

    decimal
        .parse::<f64>()
        .map_or(0, |major| round_half_up(major * scale))
}

/// Render a count of minor units with the currency symbol, e.g. `$12.50` or
/// `¥11250`.
#[must_use]
pub fn format(minor: i64, currency: Currency) -> String {
    format!("{}{}", currency.symbol(), digits(minor, currency))
}

/// The text an amount input field is pre-filled with: empty for zero,
/// otherwise the formatted value without its symbol.
#[must_use]
pub fn edit_text(minor: i64, currency: Currency) -> String {
    if minor == 0 {
        String::new()
    } else {
        digits(minor, currency)
    }
}

fn digits(minor: i64, currency: Currency) -> String {
    let exponent = currency.exponent() as usize;
    if exponent == 0 {
        return minor.to_string();
    }

    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let scale = currency.minor_scale().unsigned_abs();

    format!(
        "{sign}{}.{:0width$}",
        abs / scale,
        abs % scale,
        width = exponent
    )
}

/// Round to the nearest integer, with halves going up
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i64
}
