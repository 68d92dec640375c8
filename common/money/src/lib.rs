use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};

/// Round a monetary value half-up to 2 decimal places.
///
/// Applied once, when a price is written; aggregation sums the stored
/// values without re-rounding so totals stay exact and reproducible.
pub fn round_to_cents(value: &BigDecimal) -> BigDecimal {
    let half = BigDecimal::new(BigInt::from(5), 1);
    let scaled = value * BigDecimal::from(100);
    let adjusted = if scaled >= BigDecimal::zero() {
        scaled + half
    } else {
        scaled - half
    };
    // with_scale(0) truncates toward zero, completing the half-up round.
    let (cents, _) = adjusted.with_scale(0).into_bigint_and_exponent();
    BigDecimal::new(cents, 2)
}

/// Compare two monetary values allowing a tolerance (in cents).
pub fn nearly_equal(a: &BigDecimal, b: &BigDecimal, cents_tolerance: i64) -> bool {
    let diff = (round_to_cents(a) - round_to_cents(b)).with_scale(2);
    let cents = diff.to_f64().unwrap_or(0.0) * 100.0;
    cents.abs() <= cents_tolerance as f64
}
