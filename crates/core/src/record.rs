//! Field access over the loosely typed property lists the disk utilities emit.
//!
//! Every accessor returns `None` for an absent key or a value of the wrong
//! shape, so callers can apply per-field defaults.

use plist::Value;

pub type Record = plist::Dictionary;

pub fn string_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_string)
}

pub fn integer_field(record: &Record, key: &str) -> Option<i64> {
    let value = record.get(key)?.as_signed_integer();
    value.or_else(|| {
        record
            .get(key)?
            .as_unsigned_integer()
            .and_then(|unsigned| i64::try_from(unsigned).ok())
    })
}

pub fn real_field(record: &Record, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Real(real) => Some(*real),
        Value::Integer(_) => integer_field(record, key).map(|value| value as f64),
        _ => None,
    }
}

/// A list containing anything other than dictionaries is the wrong shape.
pub fn record_list<'a>(record: &'a Record, key: &str) -> Option<Vec<&'a Record>> {
    record
        .get(key)?
        .as_array()?
        .iter()
        .map(Value::as_dictionary)
        .collect()
}

pub fn string_or<'a>(record: &'a Record, key: &str, default: &str) -> String {
    string_field(record, key).unwrap_or(default).to_string()
}
