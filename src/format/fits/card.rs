//! FITS header cards.
//!
//! A header is a sequence of 80-character ASCII cards. Value cards have the
//! fixed layout
//!
//! ```text
//! Columns 1-8:   keyword, left-justified
//! Columns 9-10:  value indicator "= "
//! Columns 11-80: value, optionally followed by " / comment"
//! ```
//!
//! Two conventions extend this layout and both are supported:
//!
//! - **HIERARCH**: `HIERARCH LONG.KEYWORD = value / comment`, used for
//!   keywords longer than 8 characters (mask plane names, for instance).
//! - **CONTINUE**: long string values end with `&` and continue on the
//!   following `CONTINUE` cards.

use std::fmt;

/// Length of a header card in bytes.
pub const CARD_SIZE: usize = 80;

const HIERARCH_PREFIX: &str = "HIERARCH ";
const CONTINUE_KEYWORD: &str = "CONTINUE";

/// Width of the fixed-format value field for numbers and logicals.
const FIXED_VALUE_WIDTH: usize = 20;

/// Longest value text a CONTINUE card can carry (`CONTINUE  '...&'`).
const CONTINUE_CAPACITY: usize = CARD_SIZE - 10 - 3;

// =============================================================================
// Value
// =============================================================================

/// Value of a header keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Complex(f64, f64),
    String(String),
    /// Keyword present with a blank value field
    Undefined,
}

impl Value {
    /// Numeric value as f64 (integers are widened).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Integer value. Reals are accepted when they hold an exact integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(r) if r.fract() == 0.0 && r.abs() < i64::MAX as f64 => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Complex(re, im) => write!(f, "({}, {})", re, im),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Undefined => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Logical(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

// =============================================================================
// Card
// =============================================================================

/// One logical header card.
///
/// Commentary cards (`COMMENT`, `HISTORY`, blank keywords and any keyword
/// without a value indicator) have `value == None` and carry their text in
/// `comment`.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            keyword: keyword.into(),
            value: Some(value.into()),
            comment: None,
        }
    }

    pub fn commentary(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            value: None,
            comment: Some(text.into()),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_commentary(&self) -> bool {
        self.value.is_none()
    }

    pub(crate) fn is_continue(&self) -> bool {
        self.keyword == CONTINUE_KEYWORD
    }

    /// Parse a raw 80-byte card.
    ///
    /// Returns the keyword `END` for the end card; the caller stops there.
    pub fn parse(raw: &[u8]) -> Result<Self, String> {
        if raw.len() != CARD_SIZE {
            return Err(format!("expected {} bytes, got {}", CARD_SIZE, raw.len()));
        }
        if !raw.iter().all(|b| (0x20..=0x7E).contains(b)) {
            return Err("card contains non-printable or non-ASCII bytes".to_string());
        }
        // Checked above: printable ASCII is valid UTF-8
        let text = std::str::from_utf8(raw).map_err(|e| e.to_string())?;

        if let Some(rest) = text.strip_prefix(HIERARCH_PREFIX) {
            if let Some(eq) = rest.find('=') {
                let keyword = rest[..eq].trim().to_string();
                let (value, comment) = parse_value_field(&rest[eq + 1..])?;
                return Ok(Self {
                    keyword,
                    value: Some(value),
                    comment,
                });
            }
        }

        let keyword = text[..8].trim_end().to_string();

        if keyword == CONTINUE_KEYWORD {
            let (value, comment) = parse_value_field(&text[8..])?;
            return Ok(Self {
                keyword,
                value: Some(value),
                comment,
            });
        }

        let is_commentary_keyword = matches!(keyword.as_str(), "COMMENT" | "HISTORY" | "");
        if !is_commentary_keyword && &text[8..10] == "= " {
            let (value, comment) = parse_value_field(&text[10..])?;
            return Ok(Self {
                keyword,
                value: Some(value),
                comment,
            });
        }

        let body = text[8..].trim_end();
        Ok(Self {
            keyword,
            value: None,
            comment: (!body.is_empty()).then(|| body.to_string()),
        })
    }

    /// Format this card as one or more 80-character card images.
    ///
    /// Long string values spill onto CONTINUE cards and long commentary
    /// text is wrapped onto repeated commentary cards.
    pub fn to_card_images(&self) -> Vec<String> {
        match &self.value {
            None => self.commentary_images(),
            Some(value) => self.value_images(value),
        }
    }

    fn commentary_images(&self) -> Vec<String> {
        let text = sanitize(self.comment.as_deref().unwrap_or(""));
        let keyword = sanitize(&self.keyword);
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return vec![pad_card(format!("{:<8}", keyword))];
        }
        chars
            .chunks(CARD_SIZE - 8)
            .map(|chunk| {
                let chunk: String = chunk.iter().collect();
                pad_card(format!("{:<8}{}", keyword, chunk))
            })
            .collect()
    }

    fn value_images(&self, value: &Value) -> Vec<String> {
        let keyword = sanitize(&self.keyword);
        let hierarch = !is_standard_keyword(&keyword);
        let prefix = if hierarch {
            format!("{}{} = ", HIERARCH_PREFIX, keyword)
        } else {
            format!("{:<8}= ", keyword)
        };

        let mut images = match value {
            Value::String(s) => string_images(&prefix, &sanitize(s)),
            other => {
                let text = format_scalar(other);
                let text = if hierarch {
                    text
                } else {
                    format!("{:>width$}", text, width = FIXED_VALUE_WIDTH)
                };
                vec![format!("{}{}", prefix, text)]
            }
        };

        if let (Some(comment), Some(last)) = (&self.comment, images.last_mut()) {
            let comment = sanitize(comment);
            if last.len() + 3 < CARD_SIZE && !comment.is_empty() {
                last.push_str(" / ");
                last.push_str(&comment);
            }
        }

        images.into_iter().map(pad_card).collect()
    }
}

// =============================================================================
// Value parsing
// =============================================================================

/// Parse the value field (everything after `= `) into a value and comment.
fn parse_value_field(field: &str) -> Result<(Value, Option<String>), String> {
    let trimmed = field.trim_start();

    if let Some(quoted) = trimmed.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = quoted.char_indices().peekable();
        let mut end = None;
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    value.push('\'');
                    chars.next();
                } else {
                    end = Some(i + 1);
                    break;
                }
            } else {
                value.push(c);
            }
        }
        let end = end.ok_or_else(|| "unterminated string value".to_string())?;
        let comment = extract_comment(&quoted[end..]);
        return Ok((Value::String(value.trim_end().to_string()), comment));
    }

    let (token, comment) = match trimmed.find('/') {
        Some(pos) => (&trimmed[..pos], extract_comment(&trimmed[pos..])),
        None => (trimmed, None),
    };

    Ok((parse_scalar(token.trim())?, comment))
}

fn extract_comment(rest: &str) -> Option<String> {
    let pos = rest.find('/')?;
    let comment = rest[pos + 1..].trim();
    (!comment.is_empty()).then(|| comment.to_string())
}

fn parse_scalar(token: &str) -> Result<Value, String> {
    match token {
        "" => return Ok(Value::Undefined),
        "T" => return Ok(Value::Logical(true)),
        "F" => return Ok(Value::Logical(false)),
        _ => {}
    }

    if let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        let mut parts = inner.split(',');
        if let (Some(re), Some(im), None) = (parts.next(), parts.next(), parts.next()) {
            if let (Some(re), Some(im)) = (parse_real(re.trim()), parse_real(im.trim())) {
                return Ok(Value::Complex(re, im));
            }
        }
        return Err(format!("invalid complex value '{}'", token));
    }

    if let Ok(i) = token.parse::<i64>() {
        return Ok(Value::Integer(i));
    }

    parse_real(token)
        .map(Value::Real)
        .ok_or_else(|| format!("unrecognized value '{}'", token))
}

/// Parse a FITS real, accepting the Fortran `D` exponent.
fn parse_real(token: &str) -> Option<f64> {
    token.replace(['D', 'd'], "E").parse::<f64>().ok()
}

// =============================================================================
// Value formatting
// =============================================================================

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Logical(b) => if *b { "T" } else { "F" }.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => format_real(*r).unwrap_or_default(),
        Value::Complex(re, im) => match (format_real(*re), format_real(*im)) {
            (Some(re), Some(im)) => format!("({}, {})", re, im),
            _ => String::new(),
        },
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Undefined => String::new(),
    }
}

/// Format a real in exponential notation with a mandatory decimal point.
///
/// Non-finite values have no FITS representation and yield `None`; the card
/// is then written with an undefined value.
pub(crate) fn format_real(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let text = format!("{:E}", value);
    match text.find('E') {
        Some(pos) if !text[..pos].contains('.') => {
            Some(format!("{}.0{}", &text[..pos], &text[pos..]))
        }
        _ => Some(text),
    }
}

/// Card images for a string value, spilling onto CONTINUE cards as needed.
fn string_images(prefix: &str, value: &str) -> Vec<String> {
    let escaped = value.replace('\'', "''");
    if prefix.len() + escaped.len().max(8) + 2 <= CARD_SIZE {
        return vec![format!("{}'{:<8}'", prefix, escaped)];
    }

    let first_capacity = CARD_SIZE.saturating_sub(prefix.len() + 3).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut capacity = first_capacity;
    for c in value.chars() {
        let width = if c == '\'' { 2 } else { 1 };
        if current.len() + width > capacity {
            chunks.push(std::mem::take(&mut current));
            capacity = CONTINUE_CAPACITY;
        }
        if c == '\'' {
            current.push_str("''");
        } else {
            current.push(c);
        }
    }
    chunks.push(current);

    let last = chunks.len() - 1;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let amp = if i == last { "" } else { "&" };
            if i == 0 {
                format!("{}'{}{}'", prefix, chunk, amp)
            } else {
                format!("{:<8}  '{}{}'", CONTINUE_KEYWORD, chunk, amp)
            }
        })
        .collect()
}

fn is_standard_keyword(keyword: &str) -> bool {
    !keyword.is_empty()
        && keyword.len() <= 8
        && keyword
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

fn pad_card(mut image: String) -> String {
    image.truncate(CARD_SIZE);
    format!("{:<width$}", image, width = CARD_SIZE)
}
