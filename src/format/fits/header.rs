use crate::error::FitsError;

use super::card::{Card, Value};

/// An ordered FITS header.
///
/// Cards keep their file order so a header read from one file can be
/// written back with only the edited keywords changed. Lookups return the
/// first value card with the requested keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Append a parsed card.
    ///
    /// CONTINUE cards are folded into the preceding long string value. A
    /// CONTINUE card with nothing to continue is kept as commentary.
    pub fn push(&mut self, card: Card) {
        if card.is_continue() {
            let continuation = card.value.as_ref().and_then(Value::as_str);
            let previous = self.cards.last_mut().and_then(|prev| match &mut prev.value {
                Some(Value::String(s)) if s.ends_with('&') => Some((s, &mut prev.comment)),
                _ => None,
            });

            if let (Some(text), Some((value, comment))) = (continuation, previous) {
                value.pop();
                value.push_str(text);
                if let Some(extra) = card.comment {
                    match comment {
                        Some(existing) => {
                            existing.push(' ');
                            existing.push_str(&extra);
                        }
                        None => *comment = Some(extra),
                    }
                }
                return;
            }

            let text = card.value.map(|v| v.to_string()).unwrap_or_default();
            self.cards.push(Card::commentary("CONTINUE", text));
            return;
        }

        self.cards.push(card);
    }

    /// First card carrying a value for `keyword`.
    pub fn card(&self, keyword: &str) -> Option<&Card> {
        self.cards
            .iter()
            .find(|c| !c.is_commentary() && c.keyword == keyword)
    }

    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.card(keyword).and_then(|c| c.value.as_ref())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.card(keyword).is_some()
    }

    /// Required numeric keyword.
    pub fn f64(&self, keyword: &str) -> Result<f64, FitsError> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value
            .as_f64()
            .ok_or_else(|| invalid(keyword, "expected a number", value))
    }

    /// Required integer keyword.
    pub fn i64(&self, keyword: &str) -> Result<i64, FitsError> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value
            .as_i64()
            .ok_or_else(|| invalid(keyword, "expected an integer", value))
    }

    /// Required string keyword.
    pub fn str(&self, keyword: &str) -> Result<&str, FitsError> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value
            .as_str()
            .ok_or_else(|| invalid(keyword, "expected a string", value))
    }

    /// Optional numeric keyword. Present with the wrong type is an error.
    pub fn opt_f64(&self, keyword: &str) -> Result<Option<f64>, FitsError> {
        match self.get(keyword) {
            None | Some(Value::Undefined) => Ok(None),
            Some(_) => self.f64(keyword).map(Some),
        }
    }

    /// Optional integer keyword. Present with the wrong type is an error.
    pub fn opt_i64(&self, keyword: &str) -> Result<Option<i64>, FitsError> {
        match self.get(keyword) {
            None | Some(Value::Undefined) => Ok(None),
            Some(_) => self.i64(keyword).map(Some),
        }
    }

    /// Optional logical keyword, `false` when absent.
    pub fn flag(&self, keyword: &str) -> bool {
        self.get(keyword).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Set `keyword`, replacing the first existing value in place (its
    /// comment is kept) or appending a new card.
    pub fn set(&mut self, keyword: &str, value: impl Into<Value>) {
        let value = value.into();
        match self
            .cards
            .iter_mut()
            .find(|c| !c.is_commentary() && c.keyword == keyword)
        {
            Some(card) => card.value = Some(value),
            None => self.cards.push(Card {
                keyword: keyword.to_string(),
                value: Some(value),
                comment: None,
            }),
        }
    }

    /// Remove every value card for `keyword`. Returns whether any was removed.
    pub fn remove(&mut self, keyword: &str) -> bool {
        let before = self.cards.len();
        self.cards
            .retain(|c| c.is_commentary() || c.keyword != keyword);
        self.cards.len() != before
    }

    /// Value cards whose keyword starts with `prefix`, in header order.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.cards.iter().filter_map(move |c| match &c.value {
            Some(value) if c.keyword.starts_with(prefix) => Some((c.keyword.as_str(), value)),
            _ => None,
        })
    }
}

impl FromIterator<Card> for Header {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        let mut header = Header::new();
        for card in iter {
            header.push(card);
        }
        header
    }
}

fn invalid(keyword: &str, expected: &str, value: &Value) -> FitsError {
    FitsError::InvalidKeywordValue {
        keyword: keyword.to_string(),
        message: format!("{}, got {:?}", expected, value),
    }
}
