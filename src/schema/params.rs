//! Typed parameter maps produced for one invocation or CSV row.

use super::{FlagType, FlagValueKind};
use crate::errors::SchemaError;
use std::collections::BTreeMap;

/// A resolved flag value.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagValue {
    /// The typed value.
    pub value: FlagValueKind,
    /// Declared type.
    pub flag_type: FlagType,
    /// Whether the user set the flag.
    pub changed: bool,
    /// 1-based CSV column the value came from; 0 when not read from a column.
    pub column: usize,
    /// Whether the value came from the flag's `_ALL` variant.
    pub all: bool,
}

impl FlagValue {
    /// A value the user did not set.
    pub fn default_value(value: FlagValueKind) -> Self {
        Self {
            flag_type: value.flag_type(),
            value,
            changed: false,
            column: 0,
            all: false,
        }
    }

    /// A value set directly on a one-shot invocation.
    pub fn literal(value: FlagValueKind) -> Self {
        Self {
            changed: true,
            ..Self::default_value(value)
        }
    }

    /// A value read from a CSV column.
    pub fn from_column(value: FlagValueKind, column: usize) -> Self {
        Self {
            changed: true,
            column,
            ..Self::default_value(value)
        }
    }

    /// A value applied to every row through the `_ALL` variant.
    pub fn from_all(value: FlagValueKind) -> Self {
        Self {
            changed: true,
            all: true,
            ..Self::default_value(value)
        }
    }
}

/// Flag name to value for one invocation or CSV row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    command: String,
    values: BTreeMap<String, FlagValue>,
}

macro_rules! typed_getter {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty, $flag_type:expr) => {
        $(#[$doc])*
        pub fn $name(&self, flag: &str) -> Result<$ty, SchemaError> {
            match &self.lookup(flag)?.value {
                FlagValueKind::$variant(value) => Ok(value.clone()),
                other => Err(self.wrong_type(flag, $flag_type, other.flag_type())),
            }
        }
    };
}

impl ParameterMap {
    /// Creates an empty map for a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            values: BTreeMap::new(),
        }
    }

    /// Returns the command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Sets a flag value.
    pub fn insert(&mut self, flag: impl Into<String>, value: FlagValue) {
        self.values.insert(flag.into(), value);
    }

    /// Returns a flag value.
    pub fn get(&self, flag: &str) -> Option<&FlagValue> {
        self.values.get(flag)
    }

    /// Returns true if the user set the flag.
    pub fn changed(&self, flag: &str) -> bool {
        self.values.get(flag).map(|v| v.changed).unwrap_or(false)
    }

    /// Number of flags.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the map holds no flags.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn lookup(&self, flag: &str) -> Result<&FlagValue, SchemaError> {
        self.values.get(flag).ok_or_else(|| SchemaError::UnknownFlag {
            flag: flag.to_string(),
            command: self.command.clone(),
        })
    }

    fn wrong_type(&self, flag: &str, requested: FlagType, actual: FlagType) -> SchemaError {
        SchemaError::WrongType {
            flag: flag.to_string(),
            requested: requested.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Returns a string flag.
    pub fn get_string(&self, flag: &str) -> Result<&str, SchemaError> {
        match &self.lookup(flag)?.value {
            FlagValueKind::String(value) => Ok(value),
            other => Err(self.wrong_type(flag, FlagType::String, other.flag_type())),
        }
    }

    typed_getter!(
        /// Returns an int flag.
        get_int, Int, i64, FlagType::Int
    );
    typed_getter!(
        /// Returns an int64 flag.
        get_int64, Int64, i64, FlagType::Int64
    );
    typed_getter!(
        /// Returns a uint64 flag.
        get_uint64, Uint64, u64, FlagType::Uint64
    );
    typed_getter!(
        /// Returns a float64 flag.
        get_float64, Float64, f64, FlagType::Float64
    );
    typed_getter!(
        /// Returns a bool flag.
        get_bool, Bool, bool, FlagType::Bool
    );
    typed_getter!(
        /// Returns a rune flag.
        get_rune, Rune, char, FlagType::Rune
    );
    typed_getter!(
        /// Returns a string slice flag.
        get_string_slice, StringSlice, Vec<String>, FlagType::StringSlice
    );
    typed_getter!(
        /// Returns a string array flag.
        get_string_array, StringArray, Vec<String>, FlagType::StringArray
    );
}
