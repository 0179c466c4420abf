//! Mathematical utility functions.

/// Safe division: returns 0 if the denominator is zero.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den.abs() > 1e-30 {
        num / den
    } else {
        0.0
    }
}

/// `count / total` as a rate, 0 when `total` is 0.
pub fn rate(count: usize, total: usize) -> f64 {
    safe_div(count as f64, total as f64)
}

/// Whether `a` and `b` differ by at most `tol` (plus rounding slack).
pub fn within(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol + 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 2.0), 0.5);
        assert_eq!(safe_div(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(1, 4), 0.25);
        assert_eq!(rate(3, 0), 0.0);
    }

    #[test]
    fn test_within() {
        assert!(within(0.1, 0.1 + 1e-15, 0.0));
        assert!(!within(0.1, 0.2, 0.05));
        assert!(within(0.1, 0.15, 0.05));
    }
}
