use std::{cmp::Ordering, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

/// A single record keyed by column name, in column order.
pub type Record = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }

    /// Leading-prefix float parse of the cell's textual form (`"12abc"` is 12).
    pub fn parse_float(&self) -> Option<f64> {
        match self {
            Value::Null | Value::Boolean(_) => None,
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_float(s),
        }
    }

    /// Like [`Value::parse_float`] but rejects infinities.
    pub fn parse_finite(&self) -> Option<f64> {
        self.parse_float().filter(|n| n.is_finite())
    }

    /// Whole-value numeric coercion used by loose comparisons. Blank text is
    /// zero, booleans are 0/1 and anything unparseable is NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => f64::NAN,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Text(s) if s.trim().is_empty() => 0.0,
            Value::Text(s) => parse_exact(s).unwrap_or(f64::NAN),
        }
    }

    /// Interprets one raw CSV cell: blank is null, a fully numeric cell becomes
    /// a number and everything else stays text.
    pub fn from_cell(raw: &str) -> Value {
        if raw.trim().is_empty() {
            return Value::Null;
        }
        match parse_exact(raw) {
            Some(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(raw.to_string()),
        }
    }
}

/// Largest magnitude an `f64` holds without skipping integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Whole numbers are written without a fraction (`30`, not `30.0`). NaN and
/// infinities go through `serialize_f64`, which JSON renders as `null`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Parses the longest numeric prefix of `text` after leading whitespace.
/// Returns `None` when no digits lead the string.
pub fn parse_float(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if rest.starts_with("Infinity") {
        return Some(sign * f64::INFINITY);
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    rest[..end].parse::<f64>().ok().map(|value| sign * value)
}

fn parse_exact(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if trimmed
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E'))
    {
        return None;
    }
    trimmed.parse().ok()
}

/// Coercive equality: null only equals null, text compares exactly against
/// text, every other pairing compares numerically.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        _ => left.to_number() == right.to_number(),
    }
}

/// Text pairs order lexicographically, anything else numerically. `None` when
/// either side is not a number.
pub fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Same variant and same value; the membership test used by `in`/`nin`.
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_float_reads_numeric_prefix() {
        assert_eq!(parse_float("42"), Some(42.0));
        assert_eq!(parse_float("  -3.5kg"), Some(-3.5));
        assert_eq!(parse_float("12abc"), Some(12.0));
        assert_eq!(parse_float(".5"), Some(0.5));
        assert_eq!(parse_float("1e3x"), Some(1000.0));
        assert_eq!(parse_float("2e"), Some(2.0));
        assert_eq!(parse_float("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float("."), None);
        assert_eq!(parse_float(""), None);
    }

    #[test]
    fn from_cell_casts_whole_numbers_only() {
        assert_eq!(Value::from_cell("10"), Value::Number(10.0));
        assert_eq!(Value::from_cell(" 2.5 "), Value::Number(2.5));
        assert_eq!(Value::from_cell("12abc"), Value::Text("12abc".into()));
        assert_eq!(Value::from_cell("nan"), Value::Text("nan".into()));
        assert_eq!(Value::from_cell("   "), Value::Null);
    }

    #[test]
    fn loose_eq_coerces_numbers_and_text() {
        assert!(loose_eq(&Value::from("10"), &Value::Number(10.0)));
        assert!(loose_eq(&Value::Boolean(true), &Value::Number(1.0)));
        assert!(!loose_eq(&Value::from("East"), &Value::from("east")));
        assert!(!loose_eq(&Value::Null, &Value::Number(0.0)));
        assert!(loose_eq(&Value::Null, &Value::Null));
        assert!(!loose_eq(&Value::from("abc"), &Value::Number(f64::NAN)));
    }

    #[test]
    fn loose_cmp_orders_text_lexicographically() {
        assert_eq!(
            loose_cmp(&Value::from("10"), &Value::from("9")),
            Some(Ordering::Less)
        );
        assert_eq!(
            loose_cmp(&Value::Number(10.0), &Value::from("9")),
            Some(Ordering::Greater)
        );
        assert_eq!(loose_cmp(&Value::Null, &Value::Number(1.0)), None);
    }

    #[test]
    fn strict_eq_distinguishes_variants() {
        assert!(!strict_eq(&Value::from("10"), &Value::Number(10.0)));
        assert!(strict_eq(&Value::Number(10.0), &Value::Number(10.0)));
    }

    #[test]
    fn display_drops_integral_fraction() {
        assert_eq!(Value::Number(30.0).as_display(), "30");
        assert_eq!(Value::Number(4.5).as_display(), "4.5");
        assert_eq!(Value::Number(-0.0).as_display(), "0");
        assert_eq!(Value::Null.as_display(), "");
    }

    #[test]
    fn untagged_serde_round_trips_json_scalars() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 3, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Number(3.0),
                Value::Text("x".into())
            ]
        );
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"[null,true,3,"x"]"#);
    }

    #[test]
    fn serialized_numbers_keep_fractions_and_null_out_non_finite() {
        let values = vec![
            Value::Number(30.0),
            Value::Number(-0.0),
            Value::Number(2.5),
            Value::Number(1e300),
            Value::Number(f64::INFINITY),
            Value::Number(f64::NAN),
        ];
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            "[30,0,2.5,1e300,null,null]"
        );
    }
}
