//! The multiplier that moves a minor-unit amount from one currency to another

use crate::{Currency, UsdRates};

/// Compute the factor that converts minor units of `current` into minor units
/// of `target`.
///
/// The amount goes from minor to major units of `current`, into dollars, into
/// major units of `target`, and finally into its minor units, all in one
/// multiplication. No rounding happens here.
///
/// Converting a currency to itself is exactly `1.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn factor(current: Currency, target: Currency, rates: &UsdRates) -> f64 {
    if current == target {
        return 1.0;
    }

    let to_usd = 1.0 / rates.usd_to(current);
    let from_usd = rates.usd_to(target);
    let scale = target.minor_scale() as f64 / current.minor_scale() as f64;

    to_usd * from_usd * scale
}
