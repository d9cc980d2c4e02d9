//! Agent item-key parsing: `pg.table.size[host,port,db,user,passwd,orders]`.
//!
//! Quoting follows the agent's rules: a param may be wrapped in double
//! quotes (then it may contain `,` and `]`, and `\"` is an escaped quote);
//! unquoted params have leading spaces dropped and run to the next `,` or
//! the closing `]`.

use crate::error::MetricError;

/// Parsed item key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub key: String,
    pub params: Vec<String>,
}

impl AgentRequest {
    /// Param at `idx`, `None` when missing or empty.
    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params
            .get(idx)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

fn invalid(msg: impl Into<String>) -> MetricError {
    MetricError::InvalidItemKey(msg.into())
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Parses an item key with optional bracketed params.
pub fn parse_item_key(input: &str) -> Result<AgentRequest, MetricError> {
    let input = input.trim();
    let (key, rest) = match input.find('[') {
        Some(pos) => (&input[..pos], Some(&input[pos + 1..])),
        None => (input, None),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if let Some(c) = key.chars().find(|c| !is_key_char(*c)) {
        return Err(invalid(format!("unexpected character '{}' in key", c)));
    }

    let params = match rest {
        Some(rest) => parse_params(rest)?,
        None => Vec::new(),
    };

    Ok(AgentRequest {
        key: key.to_string(),
        params,
    })
}

/// Parses everything after `[`, which must end with the matching `]`.
fn parse_params(input: &str) -> Result<Vec<String>, MetricError> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') if chars.peek() == Some(&'"') => {
                        chars.next();
                        value.push('"');
                    }
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err(invalid("unterminated quoted parameter")),
                }
            }
            while chars.peek() == Some(&' ') {
                chars.next();
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' || c == ']' {
                    break;
                }
                if c == '[' {
                    return Err(invalid("nested parameter arrays are not supported"));
                }
                value.push(c);
                chars.next();
            }
        }
        params.push(value);

        match chars.next() {
            Some(',') => continue,
            Some(']') => break,
            Some(c) => return Err(invalid(format!("unexpected character '{}' after parameter", c))),
            None => return Err(invalid("missing closing ']'")),
        }
    }

    if chars.next().is_some() {
        return Err(invalid("trailing characters after ']'"));
    }
    Ok(params)
}
