//! Shared primitive types and numeric helpers used across the engine.

/// Stable identifier of a quotable service ("drains", "window_washing", ...).
pub type ServiceId = String;

/// Identifier of one quote session (uuid v4 string).
pub type SessionId = String;

/// Coerce an operator-entered quantity: NaN, infinities and negatives become 0.
pub fn sanitize_quantity(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Round a monetary amount to cents. Only applied to result-boundary fields.
pub fn round_money(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_garbage() {
        assert_eq!(sanitize_quantity(f64::NAN), 0.0);
        assert_eq!(sanitize_quantity(f64::INFINITY), 0.0);
        assert_eq!(sanitize_quantity(-3.0), 0.0);
        assert_eq!(sanitize_quantity(4.5), 4.5);
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(round_money(173.2 * 12.0), 2078.4);
        assert_eq!(round_money(10.005_1), 10.01);
        assert_eq!(round_money(f64::NAN), 0.0);
    }
}
