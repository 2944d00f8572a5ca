// SPDX-License-Identifier: GPL-3.0-only

//! Size helpers shared by the system layer and the command line

use num_format::{Locale, ToFormattedString};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeParseError {
    #[error("invalid size format: {0} (use format like 1G, 100M, 500K)")]
    InvalidFormat(String),

    #[error("size too large: {0}")]
    Overflow(String),
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val >= 1024. && steps < 6 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        _ => "EB",
    };

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}

/// Parse a size argument such as `100M`, `20G` or `4096` into bytes.
///
/// Units are binary (K = 1024) and case-insensitive; a trailing `B`/`iB` is accepted.
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let normalized = input.trim().to_ascii_uppercase();
    let unit_part = normalized
        .strip_suffix("IB")
        .or_else(|| normalized.strip_suffix('B'))
        .unwrap_or(&normalized);

    let split = unit_part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unit_part.len());
    let (digits, unit) = unit_part.split_at(split);
    if digits.is_empty() {
        return Err(SizeParseError::InvalidFormat(input.to_string()));
    }

    let multiplier: u64 = match unit {
        "" => 1,
        "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        "T" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(SizeParseError::InvalidFormat(input.to_string())),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| SizeParseError::Overflow(input.to_string()))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::Overflow(input.to_string()))
}

/// Percentage of `used` in `size`, zero when the size is unknown
pub fn usage_percent(used: u64, size: u64) -> f64 {
    if size == 0 {
        return 0.0;
    }
    used as f64 / size as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_units() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("500K"), Ok(500 * 1024));
        assert_eq!(parse_size("100M"), Ok(104_857_600));
        assert_eq!(parse_size("200m"), Ok(209_715_200));
        assert_eq!(parse_size("1G"), Ok(1_073_741_824));
        assert_eq!(parse_size("1GiB"), Ok(1_073_741_824));
        assert_eq!(parse_size("1GB"), Ok(1_073_741_824));
        assert_eq!(parse_size("512B"), Ok(512));
        assert_eq!(parse_size(" 2T "), Ok(2 * 1024 * 1024 * 1024 * 1024));
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert!(matches!(parse_size(""), Err(SizeParseError::InvalidFormat(_))));
        assert!(matches!(parse_size("G"), Err(SizeParseError::InvalidFormat(_))));
        assert!(matches!(parse_size("1.5G"), Err(SizeParseError::InvalidFormat(_))));
        assert!(matches!(parse_size("10X"), Err(SizeParseError::InvalidFormat(_))));
        assert!(matches!(parse_size("100BBB"), Err(SizeParseError::InvalidFormat(_))));
        assert!(matches!(parse_size("5KIBIB"), Err(SizeParseError::InvalidFormat(_))));
        assert!(matches!(
            parse_size("99999999999999T"),
            Err(SizeParseError::Overflow(_))
        ));
    }

    #[test]
    fn formats_human_readable_sizes() {
        assert_eq!(bytes_to_pretty(&512, false), "512.00 B");
        assert_eq!(bytes_to_pretty(&104_857_600, false), "100.00 MB");
        assert_eq!(
            bytes_to_pretty(&1_073_741_824, true),
            "1.00 GB (1,073,741,824 bytes)"
        );
    }

    #[test]
    fn usage_percent_handles_unknown_size() {
        assert_eq!(usage_percent(10, 0), 0.0);
        assert_eq!(usage_percent(50, 200), 25.0);
    }
}
