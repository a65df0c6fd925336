//! Display formatting for KPI numbers.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Maximum fraction digits shown for non-integer values.
const MAX_FRACTION_DIGITS: usize = 3;

/// Grouping and decimal separators used when displaying numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub group: char,
    pub decimal: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            group: ',',
            decimal: '.',
        }
    }
}

impl NumberFormat {
    /// Formats a JSON number for display.
    ///
    /// Integers are grouped in thousands; fractions are rounded to at most
    /// three digits with trailing zeros dropped.
    pub fn format(&self, number: &Number) -> String {
        if let Some(i) = number.as_i64() {
            return self.format_integer(i < 0, &i.unsigned_abs().to_string());
        }
        if let Some(u) = number.as_u64() {
            return self.format_integer(false, &u.to_string());
        }
        match number.as_f64() {
            Some(f) => self.format_float(f),
            None => number.to_string(),
        }
    }

    fn format_float(&self, value: f64) -> String {
        let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, value.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
        let frac_part = frac_part.trim_end_matches('0');
        let is_zero = int_part.bytes().all(|b| b == b'0') && frac_part.is_empty();

        let mut out = self.format_integer(value < 0.0 && !is_zero, int_part);
        if !frac_part.is_empty() {
            out.push(self.decimal);
            out.push_str(frac_part);
        }
        out
    }

    fn format_integer(&self, negative: bool, digits: &str) -> String {
        let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
        if negative {
            out.push('-');
        }
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(self.group);
            }
            out.push(ch);
        }
        out
    }
}
