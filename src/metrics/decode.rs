//! Single-cell result decoding.

use crate::error::MetricError;

/// How the single cell returned by a metric query is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Integer,
    Float,
    String,
}

impl std::fmt::Display for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decoder::Integer => write!(f, "integer"),
            Decoder::Float => write!(f, "float"),
            Decoder::String => write!(f, "string"),
        }
    }
}

/// Decoded metric value, tagged by representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Integer(i64),
    /// Integral value above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Text(String),
    /// SQL NULL, empty text, or no row at all.
    Null,
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Integer(v) => write!(f, "{}", v),
            ScalarValue::Unsigned(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Text(s) => f.write_str(s),
            ScalarValue::Null => Ok(()),
        }
    }
}

/// Decodes a cell's text under `decoder`.
///
/// `None` and empty or whitespace-only text decode to [`ScalarValue::Null`]
/// for every decoder, so aggregates over zero rows are not errors.
pub fn decode(decoder: Decoder, value: Option<&str>) -> Result<ScalarValue, MetricError> {
    let text = match value {
        None => return Ok(ScalarValue::Null),
        Some(s) if s.trim().is_empty() => return Ok(ScalarValue::Null),
        Some(s) => s,
    };

    match decoder {
        Decoder::String => Ok(ScalarValue::Text(text.to_string())),
        Decoder::Float => parse_float(text)
            .map(ScalarValue::Float)
            .ok_or_else(|| decode_error(decoder, text)),
        Decoder::Integer => decode_integer(text).ok_or_else(|| decode_error(decoder, text)),
    }
}

/// Integer decoding with fallbacks: i64, then u64, then a rounded float.
///
/// `pg_class.reltuples` is a `real` estimate and comes back as text such as
/// `3.14028e+06`.
fn decode_integer(text: &str) -> Option<ScalarValue> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Some(ScalarValue::Integer(v));
    }
    if let Ok(v) = text.parse::<u64>() {
        return Some(ScalarValue::Unsigned(v));
    }

    let rounded = parse_float(text)?.round();
    if rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(ScalarValue::Integer(rounded as i64))
    } else if rounded >= 0.0 && rounded < u64::MAX as f64 {
        Some(ScalarValue::Unsigned(rounded as u64))
    } else {
        None
    }
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn decode_error(decoder: Decoder, text: &str) -> MetricError {
    MetricError::Decode {
        decoder,
        value: text.to_string(),
    }
}
