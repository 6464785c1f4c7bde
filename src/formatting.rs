const TEN_THOUSANDS_PER_HUNDRED_MILLION: f64 = 10_000.0;

/// Signed two-decimal value, folding tiny magnitudes to `+0.00`.
pub fn format_signed(value: Option<f64>) -> String {
    value.map_or_else(
        || "-".to_string(),
        |value| {
            let normalized = if value.abs() < 0.005 { 0.0 } else { value };
            format!("{normalized:+.2}")
        },
    )
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(_) => format!("{}%", format_signed(value)),
        None => "-".to_string(),
    }
}

pub fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "-".to_string(),
    }
}

/// Market value given in units of 10k, shown in hundred-millions.
pub fn format_market_value(total_mv_10k: f64) -> String {
    format!("{:.0}", total_mv_10k / TEN_THOUSANDS_PER_HUNDRED_MILLION)
}

/// Compact volume display: `1.20M`, `950.00K`, `420`.
pub fn format_large_number(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.2}K", value / 1_000.0)
    } else {
        format!("{value}")
    }
}

/// `up`, `down` or `neutral`, matching the sign `format_signed` prints.
pub fn trend_class(value: Option<f64>) -> &'static str {
    match value {
        Some(v) if v >= 0.005 => "up",
        Some(v) if v <= -0.005 => "down",
        _ => "neutral",
    }
}
