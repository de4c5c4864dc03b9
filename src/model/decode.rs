//! Field extraction helpers shared by the record decoders.

use serde_json::Value;

use crate::error::DecodeError;
use crate::ports::Record;

/// Reads a text field; absent, null and empty all decode to `None`.
///
/// Numbers are accepted and rendered as text, since ids are stored either way.
pub(crate) fn opt_text(
    record: &Record,
    field: &'static str,
) -> Result<Option<String>, DecodeError> {
    match record.field(field) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(wrong_type(record, field, "text")),
    }
}

/// Reads a required text field.
pub(crate) fn text(record: &Record, field: &'static str) -> Result<String, DecodeError> {
    opt_text(record, field)?
        .ok_or_else(|| DecodeError::MissingField { record: record.id.clone(), field })
}

/// Reads a non-negative whole number, accepting `12`, `12.0` and `"12"`.
pub(crate) fn opt_whole_number(
    record: &Record,
    field: &'static str,
) -> Result<Option<u64>, DecodeError> {
    let parsed = match record.field(field) {
        None => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let whole = f as u64;
                whole
            })
        }),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    parsed.map(Some).ok_or_else(|| wrong_type(record, field, "a whole number"))
}

/// Reads a boolean flag; absent and null decode to `false`.
pub(crate) fn flag(record: &Record, field: &'static str) -> Result<bool, DecodeError> {
    match record.field(field) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(wrong_type(record, field, "a boolean")),
    }
}

/// Reads a user list field as lowercased, de-duplicated email addresses.
///
/// Entries may be bare strings or person objects carrying an `Email` or
/// `email` key. Order of first appearance is kept.
pub(crate) fn user_emails(
    record: &Record,
    field: &'static str,
) -> Result<Vec<String>, DecodeError> {
    let entries = match record.field(field) {
        None => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(wrong_type(record, field, "a list of users")),
    };

    let mut emails: Vec<String> = Vec::new();
    for entry in entries {
        let email = match entry {
            Value::String(s) => s.as_str(),
            Value::Object(person) => person
                .get("Email")
                .or_else(|| person.get("email"))
                .and_then(Value::as_str)
                .ok_or_else(|| wrong_type(record, field, "users with an email"))?,
            _ => return Err(wrong_type(record, field, "a list of users")),
        };
        let email = email.trim().to_lowercase();
        if !email.is_empty() && !emails.contains(&email) {
            emails.push(email);
        }
    }
    Ok(emails)
}

/// Reads a field holding serialized JSON and parses it.
///
/// The field may hold the JSON as a string (the usual case) or already as a
/// structured value.
pub(crate) fn opt_json_payload(
    record: &Record,
    field: &'static str,
) -> Result<Option<Value>, DecodeError> {
    match record.field(field) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => serde_json::from_str(s).map(Some).map_err(|e| {
            DecodeError::MalformedPayload {
                record: record.id.clone(),
                field,
                reason: e.to_string(),
            }
        }),
        Some(other) => Ok(Some(other.clone())),
    }
}

pub(crate) fn malformed(record: &Record, field: &'static str, reason: String) -> DecodeError {
    DecodeError::MalformedPayload { record: record.id.clone(), field, reason }
}

fn wrong_type(record: &Record, field: &'static str, expected: &'static str) -> DecodeError {
    DecodeError::WrongType { record: record.id.clone(), field, expected }
}
