//! PHI masking — field-level redaction of function results.
//!
//! Each field name is classified once into a [`FieldCategory`]; the category
//! selects the transform. Masking walks lists, records and nested structures
//! alike. Strings that hold JSON are decoded, masked and re-encoded; strings
//! that do not parse pass through untouched.

use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";

/// What kind of personal data a field holds, judged from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Patient name → initials
    Name,
    /// Medical record number → last 4 digits
    Identifier,
    /// Phone or contact number → area code only
    Phone,
    /// Email → first and last character of the local part
    Email,
    /// Clinician name → first initial and full surname
    Provider,
    /// Not PHI
    Plain,
}

impl FieldCategory {
    /// Classify a field name.
    ///
    /// The name is split into lowercase tokens on non-alphanumeric
    /// characters. When several categories could apply the most specific one
    /// wins: email, phone, identifier, provider, name.
    pub fn classify(field: &str) -> Self {
        let lower = field.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let has_pair = |first: &str, second: &str| {
            tokens.windows(2).any(|w| w[0] == first && w[1] == second)
        };

        if any_token(&tokens, |t| t.contains("email")) {
            Self::Email
        } else if any_token(&tokens, |t| t.contains("phone") || t == "contact") {
            Self::Phone
        } else if any_token(&tokens, |t| t.contains("mrn")) {
            Self::Identifier
        } else if has_pair("provider", "name") || has_pair("pcp", "name") {
            Self::Provider
        } else if has_pair("patient", "name") || lower == "name" {
            Self::Name
        } else {
            Self::Plain
        }
    }

    /// Apply this category's transform to a field's text.
    pub fn mask(self, text: &str) -> String {
        match self {
            Self::Name => mask_name(text),
            Self::Identifier => mask_identifier(text),
            Self::Phone => mask_phone(text),
            Self::Email => mask_email(text),
            Self::Provider => mask_provider(text),
            Self::Plain => text.to_string(),
        }
    }
}

fn any_token(tokens: &[&str], pred: impl Fn(&str) -> bool) -> bool {
    tokens.iter().any(|t| pred(*t))
}

/// "John Smith" → "J*** S***"
pub fn mask_name(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [] => REDACTED.to_string(),
        [only] => format!("{}***", initial(only)),
        [first, .., last] => format!("{}*** {}***", initial(first), initial(last)),
    }
}

/// "123456789" → "****6789". Shorter than 4 keeps the last 2.
pub fn mask_identifier(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let keep = if chars.len() < 4 { 2 } else { 4 };
    let tail: String = chars[chars.len().saturating_sub(keep)..].iter().collect();
    format!("****{tail}")
}

/// "(555) 123-4567" → "(555) ***-****"
pub fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= 10 {
        format!("({}) ***-****", &digits[..3])
    } else {
        "***-****".to_string()
    }
}

/// "john.smith@email.com" → "j***h@email.com"
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return REDACTED.to_string();
    };
    let chars: Vec<char> = local.chars().collect();
    let masked_local = match chars.as_slice() {
        [] => return REDACTED.to_string(),
        [first] | [first, _] => format!("{first}***"),
        [first, .., last] => format!("{first}***{last}"),
    };
    format!("{masked_local}@{domain}")
}

/// "Dr. Jane Smith" → "J*** Smith"
pub fn mask_provider(name: &str) -> String {
    let name = name.strip_prefix("Dr. ").unwrap_or(name);
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [] => REDACTED.to_string(),
        [only] => (*only).to_string(),
        [first, .., last] => format!("{}*** {last}", initial(first)),
    }
}

fn initial(word: &str) -> String {
    word.chars().next().map(String::from).unwrap_or_default()
}

/// Applies [`FieldCategory`] transforms across a whole payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhiMasker;

impl PhiMasker {
    pub fn new() -> Self {
        Self
    }

    /// Mask every PHI field anywhere in `value`.
    pub fn mask(&self, value: Value) -> Value {
        match value {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(parsed @ (Value::Array(_) | Value::Object(_))) => {
                    let masked = self.mask(parsed);
                    serde_json::to_string(&masked)
                        .map(Value::String)
                        .unwrap_or(Value::String(text))
                }
                _ => Value::String(text),
            },
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.mask(v)).collect()),
            Value::Object(record) => Value::Object(self.mask_record(record)),
            other => other,
        }
    }

    fn mask_record(&self, record: Map<String, Value>) -> Map<String, Value> {
        record
            .into_iter()
            .map(|(field, value)| {
                let category = FieldCategory::classify(&field);
                let masked = if category != FieldCategory::Plain && is_truthy(&value) {
                    Value::String(category.mask(&display_text(&value)))
                } else {
                    match value {
                        nested @ (Value::Array(_) | Value::Object(_)) => self.mask(nested),
                        other => other,
                    }
                };
                (field, masked)
            })
            .collect()
    }
}

/// Empty strings, zero, false, null and empty containers are left alone.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
