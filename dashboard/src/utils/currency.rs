//! Rupee amount helpers.
//!
//! The gateway reports amounts in paise (minor units). Conversion to rupees
//! happens only at display time.

pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Convert a rupee amount entered by the user into paise.
///
/// Returns `None` for non-finite, zero or negative amounts.
pub fn major_to_minor(amount_major: f64) -> Option<u64> {
    if !amount_major.is_finite() || amount_major <= 0.0 {
        return None;
    }
    let minor = (amount_major * MINOR_UNITS_PER_MAJOR as f64).round();
    if minor < 1.0 || minor > u64::MAX as f64 {
        return None;
    }
    Some(minor as u64)
}

/// Format paise as a rupee string with thousands separators, e.g. `₹1,234.5`.
pub fn format_rupees(amount_minor: u64) -> String {
    let whole = amount_minor / MINOR_UNITS_PER_MAJOR;
    let fraction = amount_minor % MINOR_UNITS_PER_MAJOR;

    let mut out = format!("₹{}", group_thousands(whole));
    if fraction != 0 {
        let digits = format!("{:02}", fraction);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// Format a whole-rupee amount (loan reminders store rupees, not paise).
pub fn format_whole_rupees(amount_major: f64) -> String {
    match major_to_minor(amount_major) {
        Some(minor) => format_rupees(minor),
        None => "₹0".to_string(),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_to_minor() {
        assert_eq!(major_to_minor(20.0), Some(2000));
        assert_eq!(major_to_minor(0.1 + 0.2), Some(30));
        assert_eq!(major_to_minor(0.0), None);
        assert_eq!(major_to_minor(-5.0), None);
        assert_eq!(major_to_minor(f64::NAN), None);
        assert_eq!(major_to_minor(0.001), None);
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(0), "₹0");
        assert_eq!(format_rupees(11500), "₹115");
        assert_eq!(format_rupees(3550), "₹35.5");
        assert_eq!(format_rupees(3505), "₹35.05");
        assert_eq!(format_rupees(2_500_000), "₹25,000");
        assert_eq!(format_rupees(123_456_789), "₹1,234,567.89");
    }

    #[test]
    fn test_format_whole_rupees() {
        assert_eq!(format_whole_rupees(12000.0), "₹12,000");
        assert_eq!(format_whole_rupees(25.5), "₹25.5");
    }
}
