//! Coercion of raw strings into typed flag values.

use super::{FlagType, FlagValueKind};
use crate::errors::SchemaError;

const TRUE_VALUES: [&str; 6] = ["1", "t", "T", "TRUE", "true", "True"];
const FALSE_VALUES: [&str; 6] = ["0", "f", "F", "FALSE", "false", "False"];

/// Parses a boolean the way command line flags accept them.
pub fn parse_bool(raw: &str) -> Option<bool> {
    if TRUE_VALUES.contains(&raw) {
        Some(true)
    } else if FALSE_VALUES.contains(&raw) {
        Some(false)
    } else {
        None
    }
}

/// Coerces a raw string into a value of `flag_type`.
///
/// `flag` only names the flag in the error.
pub fn coerce(flag: &str, flag_type: FlagType, raw: &str) -> Result<FlagValueKind, SchemaError> {
    let failed = || SchemaError::Coercion {
        flag: flag.to_string(),
        value: raw.to_string(),
        expected: flag_type.to_string(),
    };

    let value = match flag_type {
        FlagType::String => FlagValueKind::String(raw.to_string()),
        FlagType::Int => FlagValueKind::Int(raw.parse().map_err(|_| failed())?),
        FlagType::Int64 => FlagValueKind::Int64(raw.parse().map_err(|_| failed())?),
        FlagType::Uint64 => FlagValueKind::Uint64(raw.parse().map_err(|_| failed())?),
        FlagType::Float64 => FlagValueKind::Float64(raw.parse().map_err(|_| failed())?),
        FlagType::Bool => FlagValueKind::Bool(parse_bool(raw).ok_or_else(failed)?),
        FlagType::Rune => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => FlagValueKind::Rune(c),
                _ => return Err(failed()),
            }
        }
        FlagType::StringSlice => {
            FlagValueKind::StringSlice(raw.split(',').map(str::to_string).collect())
        }
        FlagType::StringArray => FlagValueKind::StringArray(vec![raw.to_string()]),
    };

    Ok(value)
}
