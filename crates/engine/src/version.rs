//! Version constraint evaluation
//!
//! Versions are dot-separated numeric sequences. Comparison right-pads
//! the shorter side with zeros, so `"1.2" == "1.2.0"`. Non-numeric
//! segments compare as zero, which keeps the comparator total.

use std::cmp::Ordering;

/// A parsed version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `"1.2.3"` - installed must equal this
    Exact(String),
    /// `">=1.2.3"` - installed must be at least this
    AtLeast(String),
}

impl Constraint {
    /// Parse a constraint string from a manifest
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix(">=").map_or_else(
            || Self::Exact(raw.trim().to_string()),
            |rest| Self::AtLeast(rest.trim().to_string()),
        )
    }

    /// Whether an installed version satisfies this constraint
    pub fn satisfied_by(&self, installed: &str) -> bool {
        match self {
            Self::Exact(wanted) => compare(installed, wanted) == Ordering::Equal,
            Self::AtLeast(minimum) => compare(installed, minimum) != Ordering::Less,
        }
    }
}

/// Segment-wise numeric comparison with zero right-padding
pub fn compare(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<u64> = segments(a);
    let b_parts: Vec<u64> = segments(b);
    let len = a_parts.len().max(b_parts.len());

    for i in 0..len {
        let x = a_parts.get(i).copied().unwrap_or(0);
        let y = b_parts.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Convenience wrapper: does `installed` satisfy `constraint`?
pub fn satisfies(installed: &str, constraint: &str) -> bool {
    Constraint::parse(constraint).satisfied_by(installed)
}

fn segments(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|s| {
            // Tolerate suffixes like "3-beta": leading digits count
            let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorter_version_is_zero_padded() {
        assert_eq!(compare("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare("1.2", "1.2.1"), Ordering::Less);
        assert_eq!(compare("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn exact_constraint() {
        assert!(satisfies("1.2.3", "1.2.3"));
        assert!(satisfies("1.2.0", "1.2"));
        assert!(!satisfies("1.2.4", "1.2.3"));
    }

    #[test]
    fn minimum_constraint() {
        assert!(satisfies("2.0", ">=1.9"));
        assert!(satisfies("1.9", ">=1.9"));
        assert!(!satisfies("1.8.9", ">=1.9"));
    }

    #[test]
    fn non_numeric_segments_compare_as_zero() {
        assert_eq!(compare("1.beta", "1.0"), Ordering::Equal);
        assert!(satisfies("1.2.3-beta", ">=1.2.3"));
    }
}
