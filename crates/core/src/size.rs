const UNIT: u64 = 1024;
const PREFIXES: &[u8] = b"KMGTPE";

/// Format a byte count with 1024-based units and one decimal place.
///
/// Values below 1 KB are printed as whole bytes.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp + 1 < PREFIXES.len() {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64 / div as f64;
    format!("{value:.1} {}B", char::from(PREFIXES[exp]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_unit() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2 * 1024), "2.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_size(4 * 1024 * 1024 * 1024), "4.0 GB");
    }

    #[test]
    fn largest_values_stay_in_exabytes() {
        assert!(format_size(u64::MAX).ends_with("EB"));
    }
}
