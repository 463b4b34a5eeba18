//! Money and percentage helpers.
//!
//! Every amount in the system is expressed in thousands of the base currency unit:
//! a stored `13400.0` means 13,400,000. Accumulation keeps full `f64` precision;
//! rounding happens only when a value is shown or exported.

/// Number of base currency units represented by one stored unit.
pub const BASE_UNITS_PER_STORED_UNIT: i64 = 1_000;

/// Tolerance used when deciding whether a computed amount is zero.
pub const ZERO_TOLERANCE: f64 = 1e-9;

/// Rounds half away from negative infinity, matching a display `round()`:
/// `2.5 -> 3`, `-2.5 -> -2`.
#[must_use]
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Whether an amount is zero within [`ZERO_TOLERANCE`].
#[must_use]
pub fn is_zero(value: f64) -> bool {
    value.abs() < ZERO_TOLERANCE
}

/// Returns `percentage` percent of `amount`, without rounding.
#[must_use]
pub fn percent_of(amount: f64, percentage: f64) -> f64 {
    amount * percentage / 100.0
}

/// Sums amounts with full precision.
pub fn sum<I>(amounts: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    amounts.into_iter().sum()
}

/// Formats a stored amount rounded to a whole thousand with `,` separators: `13,400`.
#[must_use]
pub fn format_amount(value: f64) -> String {
    format_amount_with(value, ',')
}

/// Formats a stored amount rounded to a whole thousand with the given separator.
///
/// `format_amount_with(1234567.4, '.')` gives `1.234.567`.
#[must_use]
pub fn format_amount_with(value: f64, separator: char) -> String {
    // Cast safety: display amounts are far inside the i64 range.
    #[allow(clippy::cast_possible_truncation)]
    let rounded = round_half_up(value) as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }

    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Formats a stored amount in base currency units: `13400.0 -> 13,400,000`.
#[must_use]
pub fn format_base_units(value: f64, separator: char) -> String {
    // Cast safety: BASE_UNITS_PER_STORED_UNIT is a small constant.
    #[allow(clippy::cast_precision_loss)]
    let scaled = value * BASE_UNITS_PER_STORED_UNIT as f64;
    format_amount_with(scaled, separator)
}

/// Formats a signed amount with an explicit sign: `+50`, `-1,200`.
#[must_use]
pub fn format_signed(value: f64) -> String {
    if round_half_up(value) >= 0.0 {
        format!("+{}", format_amount(value))
    } else {
        format_amount(value)
    }
}

/// Formats a percentage without trailing zeros: `25%`, `12.5%`.
#[must_use]
pub fn format_percentage(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}%")
}
