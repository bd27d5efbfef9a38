//! Utility modules.

pub mod exec;
pub mod fs;
pub mod mime;

/// Return "s" suffix for plural counts.
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Format count with noun, handling pluralization (`3 files`, `1 file`).
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, plural_s(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_count() {
        assert_eq!(plural_count(0, "step"), "0 steps");
        assert_eq!(plural_count(1, "step"), "1 step");
        assert_eq!(plural_count(12, "step"), "12 steps");
    }
}
