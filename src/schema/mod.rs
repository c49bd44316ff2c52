//! Typed flag declarations and their resolution into parameter maps.
//!
//! A [`FlagSpec`] declares a flag's type, per-command defaults and the
//! commands that accept or require it. A [`CommandSchema`] collects the flags
//! of one command and derives an `<name>_ALL` variant for every flag not
//! excluded from it, so one constant value can be applied to every CSV row.

use crate::errors::SchemaError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

mod coerce;
mod params;

pub use coerce::{coerce, parse_bool};
pub use params::{FlagValue, ParameterMap};

/// Suffix of the batch-wide variant of a flag.
pub const ALL_SUFFIX: &str = "_ALL";

/// Declared type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagType {
    /// UTF-8 string.
    String,
    /// Signed integer.
    Int,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    Uint64,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// Single Unicode code point.
    Rune,
    /// Comma separated list.
    StringSlice,
    /// Single-element list.
    StringArray,
}

impl FlagType {
    /// Returns the type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::String => "string",
            FlagType::Int => "int",
            FlagType::Int64 => "int64",
            FlagType::Uint64 => "uint64",
            FlagType::Float64 => "float64",
            FlagType::Bool => "bool",
            FlagType::Rune => "rune",
            FlagType::StringSlice => "stringSlice",
            FlagType::StringArray => "stringArray",
        }
    }

    /// Returns the zero value of the type.
    pub fn zero(&self) -> FlagValueKind {
        match self {
            FlagType::String => FlagValueKind::String(String::new()),
            FlagType::Int => FlagValueKind::Int(0),
            FlagType::Int64 => FlagValueKind::Int64(0),
            FlagType::Uint64 => FlagValueKind::Uint64(0),
            FlagType::Float64 => FlagValueKind::Float64(0.0),
            FlagType::Bool => FlagValueKind::Bool(false),
            FlagType::Rune => FlagValueKind::Rune('\0'),
            FlagType::StringSlice => FlagValueKind::StringSlice(Vec::new()),
            FlagType::StringArray => FlagValueKind::StringArray(Vec::new()),
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed flag value.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValueKind {
    /// String value.
    String(String),
    /// Int value.
    Int(i64),
    /// Int64 value.
    Int64(i64),
    /// Uint64 value.
    Uint64(u64),
    /// Float64 value.
    Float64(f64),
    /// Bool value.
    Bool(bool),
    /// Rune value.
    Rune(char),
    /// String slice value.
    StringSlice(Vec<String>),
    /// String array value.
    StringArray(Vec<String>),
}

impl FlagValueKind {
    /// Returns the type of the value.
    pub fn flag_type(&self) -> FlagType {
        match self {
            FlagValueKind::String(_) => FlagType::String,
            FlagValueKind::Int(_) => FlagType::Int,
            FlagValueKind::Int64(_) => FlagType::Int64,
            FlagValueKind::Uint64(_) => FlagType::Uint64,
            FlagValueKind::Float64(_) => FlagType::Float64,
            FlagValueKind::Bool(_) => FlagType::Bool,
            FlagValueKind::Rune(_) => FlagType::Rune,
            FlagValueKind::StringSlice(_) => FlagType::StringSlice,
            FlagValueKind::StringArray(_) => FlagType::StringArray,
        }
    }
}

/// Declaration of one flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    name: String,
    flag_type: FlagType,
    description: String,
    defaults: HashMap<String, FlagValueKind>,
    commands: Vec<String>,
    required: Vec<String>,
    recursive: Vec<String>,
    exclude_from_all: bool,
}

impl FlagSpec {
    /// Starts a declaration.
    pub fn builder(name: impl Into<String>, flag_type: FlagType) -> FlagSpecBuilder {
        FlagSpecBuilder {
            spec: FlagSpec {
                name: name.into(),
                flag_type,
                description: String::new(),
                defaults: HashMap::new(),
                commands: Vec::new(),
                required: Vec::new(),
                recursive: Vec::new(),
                exclude_from_all: false,
            },
        }
    }

    /// Flag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn flag_type(&self) -> FlagType {
        self.flag_type
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the flag has no `_ALL` variant.
    pub fn exclude_from_all(&self) -> bool {
        self.exclude_from_all
    }

    /// Returns true if `command` accepts the flag.
    pub fn applies_to(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    /// Returns true if `command` requires the flag.
    pub fn is_required(&self, command: &str) -> bool {
        self.required.iter().any(|c| c == command)
    }

    /// Returns true if the recursive variant of `command` accepts the flag.
    pub fn applies_recursively(&self, command: &str) -> bool {
        self.recursive.iter().any(|c| c == command)
    }

    /// Returns the default for `command`, or the type's zero value.
    pub fn default_for(&self, command: &str) -> FlagValueKind {
        self.defaults
            .get(command)
            .cloned()
            .unwrap_or_else(|| self.flag_type.zero())
    }
}

/// Builder for [`FlagSpec`].
pub struct FlagSpecBuilder {
    spec: FlagSpec,
}

impl FlagSpecBuilder {
    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = description.into();
        self
    }

    /// Adds commands accepting the flag.
    pub fn commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Adds commands requiring the flag.
    pub fn required<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.required.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Adds commands whose recursive variant accepts the flag.
    pub fn recursive<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.recursive.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Sets the default for one command.
    pub fn default_value(mut self, command: impl Into<String>, value: FlagValueKind) -> Self {
        self.spec.defaults.insert(command.into(), value);
        self
    }

    /// Excludes the flag from the `_ALL` variants.
    pub fn exclude_from_all(mut self) -> Self {
        self.spec.exclude_from_all = true;
        self
    }

    /// Finishes the declaration, checking every default against the declared type.
    pub fn build(self) -> Result<FlagSpec, SchemaError> {
        let spec = self.spec;
        let mut commands: Vec<_> = spec.defaults.keys().collect();
        commands.sort();
        for command in commands {
            let actual = spec.defaults[command].flag_type();
            if actual != spec.flag_type {
                return Err(SchemaError::DefaultTypeMismatch {
                    flag: spec.name.clone(),
                    command: command.clone(),
                    declared: spec.flag_type.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(spec)
    }
}

/// The flags of one command.
#[derive(Debug, Clone)]
pub struct CommandSchema {
    command: String,
    flags: BTreeMap<String, FlagSpec>,
}

/// Where a batch flag takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// The 1-based CSV column.
    Column(usize),
    /// The same value on every row.
    All(FlagValueKind),
    /// The declared default.
    Default(FlagValueKind),
}

/// Flags set by the caller, by name, as raw strings.
///
/// In batch mode a plain flag carries its 1-based column index and an
/// `_ALL` flag carries a literal; in a one-shot call every value is a literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    values: BTreeMap<String, String>,
}

impl Invocation {
    /// Creates an empty invocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a flag.
    pub fn set(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(flag.into(), value.into());
        self
    }

    /// Returns true if the flag was set.
    pub fn is_set(&self, flag: &str) -> bool {
        self.values.contains_key(flag)
    }

    /// Iterates set flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Per-flag value sources of a batch, fixed before any I/O.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    command: String,
    sources: BTreeMap<String, (FlagType, ValueSource)>,
}

impl CommandSchema {
    /// Collects the flags accepting `command`.
    pub fn new<'a>(command: impl Into<String>, flags: impl IntoIterator<Item = &'a FlagSpec>) -> Self {
        let command = command.into();
        let flags = flags
            .into_iter()
            .filter(|spec| spec.applies_to(&command))
            .map(|spec| (spec.name.clone(), spec.clone()))
            .collect();
        Self { command, flags }
    }

    /// Collects the flags accepted by the recursive variant of `command`.
    pub fn recursive<'a>(command: impl Into<String>, flags: impl IntoIterator<Item = &'a FlagSpec>) -> Self {
        let command = command.into();
        let flags = flags
            .into_iter()
            .filter(|spec| spec.applies_recursively(&command))
            .map(|spec| (spec.name.clone(), spec.clone()))
            .collect();
        Self { command, flags }
    }

    /// Command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns a declared flag.
    pub fn flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.get(name)
    }

    /// Iterates declared flags in name order.
    pub fn flags(&self) -> impl Iterator<Item = &FlagSpec> {
        self.flags.values()
    }

    /// Names of the derived `_ALL` flags.
    pub fn all_flag_names(&self) -> Vec<String> {
        self.flags
            .values()
            .filter(|spec| !spec.exclude_from_all)
            .map(|spec| format!("{}{}", spec.name, ALL_SUFFIX))
            .collect()
    }

    fn unknown(&self, flag: &str) -> SchemaError {
        SchemaError::UnknownFlag {
            flag: flag.to_string(),
            command: self.command.clone(),
        }
    }

    fn check_required(&self, is_set: impl Fn(&str) -> bool) -> Result<(), SchemaError> {
        for spec in self.flags.values() {
            if spec.is_required(&self.command) && !is_set(&spec.name) {
                return Err(SchemaError::MissingRequired {
                    flag: spec.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolves a batch invocation.
    ///
    /// Rejects a flag set together with its `_ALL` variant, unset required
    /// flags and undeclared flags. `_ALL` literals are coerced here so a bad
    /// constant fails before the CSV is opened.
    pub fn resolve_batch(&self, invocation: &Invocation) -> Result<BatchPlan, SchemaError> {
        let mut columns: HashMap<&str, usize> = HashMap::new();
        let mut all: HashMap<&str, &str> = HashMap::new();

        for (flag, raw) in invocation.iter() {
            if let Some(base) = flag.strip_suffix(ALL_SUFFIX) {
                match self.flags.get(base) {
                    Some(spec) if !spec.exclude_from_all => {
                        all.insert(spec.name.as_str(), raw);
                        continue;
                    }
                    _ if !self.flags.contains_key(flag) => return Err(self.unknown(flag)),
                    _ => {}
                }
            }

            let spec = self.flags.get(flag).ok_or_else(|| self.unknown(flag))?;
            let column = raw.trim().parse::<usize>().map_err(|_| SchemaError::Coercion {
                flag: flag.to_string(),
                value: raw.to_string(),
                expected: "column index".to_string(),
            })?;
            columns.insert(spec.name.as_str(), column);
        }

        for flag in columns.keys() {
            if all.contains_key(flag) {
                return Err(SchemaError::Conflict {
                    flag: flag.to_string(),
                });
            }
        }

        // Column 0 selects the default, so it does not satisfy a required flag.
        self.check_required(|flag| {
            columns.get(flag).is_some_and(|&column| column > 0) || all.contains_key(flag)
        })?;

        let mut sources = BTreeMap::new();
        for spec in self.flags.values() {
            let name = spec.name.as_str();
            let source = match (columns.get(name), all.get(name)) {
                (Some(&column), _) if column > 0 => ValueSource::Column(column),
                (_, Some(raw)) => ValueSource::All(coerce(name, spec.flag_type, raw)?),
                _ => ValueSource::Default(spec.default_for(&self.command)),
            };
            sources.insert(spec.name.clone(), (spec.flag_type, source));
        }

        Ok(BatchPlan {
            command: self.command.clone(),
            sources,
        })
    }

    /// Resolves a one-shot invocation into its parameter map.
    pub fn resolve_single(&self, invocation: &Invocation) -> Result<ParameterMap, SchemaError> {
        for (flag, _) in invocation.iter() {
            if !self.flags.contains_key(flag) {
                return Err(self.unknown(flag));
            }
        }
        self.check_required(|flag| invocation.is_set(flag))?;

        let mut params = ParameterMap::new(self.command.clone());
        for spec in self.flags.values() {
            let value = match invocation.values.get(&spec.name) {
                Some(raw) => FlagValue::literal(coerce(&spec.name, spec.flag_type, raw)?),
                None => FlagValue::default_value(spec.default_for(&self.command)),
            };
            params.insert(spec.name.clone(), value);
        }
        Ok(params)
    }
}

impl BatchPlan {
    /// Command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the value source of a flag.
    pub fn source(&self, flag: &str) -> Option<&ValueSource> {
        self.sources.get(flag).map(|(_, source)| source)
    }

    /// Highest column index used, 0 if none.
    pub fn max_column(&self) -> usize {
        self.sources
            .values()
            .filter_map(|(_, source)| match source {
                ValueSource::Column(column) => Some(*column),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Checks every column index against the number of columns in the file.
    pub fn validate_columns(&self, columns: usize) -> Result<(), SchemaError> {
        for (flag, (_, source)) in &self.sources {
            if let ValueSource::Column(column) = source {
                if *column < 1 || *column > columns {
                    return Err(SchemaError::ColumnOutOfRange {
                        flag: flag.clone(),
                        column: *column,
                        columns,
                    });
                }
            }
        }
        Ok(())
    }

    /// Builds the parameter map of one CSV row.
    pub fn row<S: AsRef<str>>(&self, record: &[S]) -> Result<ParameterMap, SchemaError> {
        let mut params = ParameterMap::new(self.command.clone());
        for (flag, (flag_type, source)) in &self.sources {
            let value = match source {
                ValueSource::Column(column) => {
                    let cell = record.get(column - 1).ok_or_else(|| {
                        SchemaError::ColumnOutOfRange {
                            flag: flag.clone(),
                            column: *column,
                            columns: record.len(),
                        }
                    })?;
                    FlagValue::from_column(coerce(flag, *flag_type, cell.as_ref())?, *column)
                }
                ValueSource::All(value) => FlagValue::from_all(value.clone()),
                ValueSource::Default(value) => FlagValue::default_value(value.clone()),
            };
            params.insert(flag.clone(), value);
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> Vec<FlagSpec> {
        vec![
            FlagSpec::builder("groupKey", FlagType::String)
                .commands(["insert", "delete"])
                .required(["insert"])
                .build()
                .unwrap(),
            FlagSpec::builder("email", FlagType::String)
                .commands(["insert"])
                .required(["insert"])
                .build()
                .unwrap(),
            FlagSpec::builder("role", FlagType::String)
                .commands(["insert"])
                .default_value("insert", FlagValueKind::String("MEMBER".into()))
                .build()
                .unwrap(),
            FlagSpec::builder("fields", FlagType::String)
                .commands(["insert", "list"])
                .recursive(["list"])
                .exclude_from_all()
                .build()
                .unwrap(),
        ]
    }

    fn schema() -> CommandSchema {
        CommandSchema::new("insert", &flags())
    }

    #[test]
    fn test_default_type_checked() {
        let result = FlagSpec::builder("maxResults", FlagType::Int64)
            .commands(["list"])
            .default_value("list", FlagValueKind::Int(10))
            .build();
        assert_eq!(
            result.unwrap_err(),
            SchemaError::DefaultTypeMismatch {
                flag: "maxResults".into(),
                command: "list".into(),
                declared: "int64".into(),
                actual: "int".into(),
            }
        );
    }

    #[test]
    fn test_schema_selects_command_flags() {
        let flags = flags();
        let list = CommandSchema::new("list", &flags);
        assert_eq!(list.flags().count(), 1);
        assert!(list.flag("fields").is_some());
        assert!(list.all_flag_names().is_empty());

        let recursive = CommandSchema::recursive("list", &flags);
        assert!(recursive.flag("fields").is_some());

        let mut names = schema().all_flag_names();
        names.sort();
        assert_eq!(names, vec!["email_ALL", "groupKey_ALL", "role_ALL"]);
    }

    #[test]
    fn test_conflict_rejected() {
        let invocation = Invocation::new()
            .set("email", "1")
            .set("email_ALL", "a@x")
            .set("groupKey_ALL", "g@x");
        assert_eq!(
            schema().resolve_batch(&invocation).unwrap_err(),
            SchemaError::Conflict {
                flag: "email".into()
            }
        );
    }

    #[test]
    fn test_missing_required_and_unknown() {
        let invocation = Invocation::new().set("email", "1");
        assert_eq!(
            schema().resolve_batch(&invocation).unwrap_err(),
            SchemaError::MissingRequired {
                flag: "groupKey".into()
            }
        );

        let invocation = Invocation::new().set("groupKey", "0").set("email", "1");
        assert_eq!(
            schema().resolve_batch(&invocation).unwrap_err(),
            SchemaError::MissingRequired {
                flag: "groupKey".into()
            }
        );

        let invocation = Invocation::new().set("nope", "1");
        assert!(matches!(
            schema().resolve_batch(&invocation),
            Err(SchemaError::UnknownFlag { .. })
        ));

        let invocation = Invocation::new()
            .set("groupKey", "1")
            .set("email", "2")
            .set("fields_ALL", "id");
        assert!(matches!(
            schema().resolve_batch(&invocation),
            Err(SchemaError::UnknownFlag { .. })
        ));
    }

    #[test]
    fn test_batch_plan_rows() {
        let invocation = Invocation::new()
            .set("groupKey_ALL", "grp@x")
            .set("email", "1");
        let plan = schema().resolve_batch(&invocation).unwrap();

        assert_eq!(plan.max_column(), 1);
        assert!(plan.validate_columns(1).is_ok());
        assert_eq!(
            plan.validate_columns(0).unwrap_err(),
            SchemaError::ColumnOutOfRange {
                flag: "email".into(),
                column: 1,
                columns: 0
            }
        );

        let params = plan.row(&["a@x"]).unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params.get_string("groupKey").unwrap(), "grp@x");
        assert!(params.get("groupKey").unwrap().all);
        assert_eq!(params.get_string("email").unwrap(), "a@x");
        assert_eq!(params.get("email").unwrap().column, 1);
        assert_eq!(params.get_string("role").unwrap(), "MEMBER");
        assert!(!params.changed("role"));
    }

    #[test]
    fn test_column_zero_uses_default() {
        let invocation = Invocation::new()
            .set("groupKey_ALL", "grp@x")
            .set("email", "1")
            .set("role", "0");
        let plan = schema().resolve_batch(&invocation).unwrap();
        assert_eq!(
            plan.source("role"),
            Some(&ValueSource::Default(FlagValueKind::String("MEMBER".into())))
        );
    }

    #[test]
    fn test_bad_all_literal_rejected_before_io() {
        let flags = vec![FlagSpec::builder("suspended", FlagType::Bool)
            .commands(["update"])
            .build()
            .unwrap()];
        let schema = CommandSchema::new("update", &flags);
        let invocation = Invocation::new().set("suspended_ALL", "maybe");
        assert!(matches!(
            schema.resolve_batch(&invocation),
            Err(SchemaError::Coercion { .. })
        ));
    }

    #[test]
    fn test_resolve_single() {
        let invocation = Invocation::new()
            .set("groupKey", "grp@x")
            .set("email", "a@x");
        let params = schema().resolve_single(&invocation).unwrap();
        assert_eq!(params.command(), "insert");
        assert_eq!(params.get_string("email").unwrap(), "a@x");
        assert!(params.changed("email"));
        assert_eq!(params.get("email").unwrap().column, 0);
        assert_eq!(params.get_string("role").unwrap(), "MEMBER");

        let invocation = Invocation::new().set("groupKey", "grp@x");
        assert!(matches!(
            schema().resolve_single(&invocation),
            Err(SchemaError::MissingRequired { .. })
        ));
    }
}
