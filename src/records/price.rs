//! Fixed-point currency amounts with exactly two fraction digits

use serde::{Serialize, Serializer};
use std::fmt;

/// A non-negative currency amount held as integer hundredths
///
/// Displays and serializes as a plain decimal string such as `"51.77"`,
/// so no value ever passes through a binary float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price {
    cents: u64,
}

impl Price {
    /// Creates a price from a count of hundredths
    pub const fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    /// Returns the amount in hundredths
    pub const fn cents(&self) -> u64 {
        self.cents
    }

    /// Parses a plain decimal string (`"51.77"`, `"3"`, `".5"`)
    ///
    /// Returns `None` for anything that is not digits with at most one
    /// decimal point, or that overflows. More than two fraction digits are
    /// rounded half-up.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelf_harvest::Price;
    ///
    /// assert_eq!(Price::parse("51.77"), Some(Price::from_cents(5177)));
    /// assert_eq!(Price::parse("1.2.3"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (text, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            // Also rejects a second '.' left inside the fraction part
            return None;
        }

        let mut cents: u64 = 0;
        for digit in whole.bytes() {
            cents = cents.checked_mul(10)?.checked_add(u64::from(digit - b'0'))?;
        }

        let mut digits = fraction.bytes().map(|b| u64::from(b - b'0'));
        let tenths = digits.next().unwrap_or(0);
        let hundredths = digits.next().unwrap_or(0);
        let round_up = digits.next().is_some_and(|d| d >= 5);

        cents = cents
            .checked_mul(100)?
            .checked_add(tenths * 10 + hundredths)?;
        if round_up {
            cents = cents.checked_add(1)?;
        }

        Some(Self { cents })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
