//! Error types for the Google Workspace client.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Result type for Google Workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Message fragments that mark a 403 as quota or rate exhaustion.
const TRANSIENT_MARKERS: [&str; 6] = ["quota", "Quota", "limit", "Limit", "rate", "Rate"];

/// Top-level error type for the Google Workspace client.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Error reported by an upstream Google API.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Response error.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Flag schema misuse or coercion failure.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Batch input error.
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// An error attributed to a call site by its error key.
    #[error("{key}: {source}")]
    Keyed {
        /// The error key of the failing call.
        key: String,
        /// The underlying error.
        #[source]
        source: Box<WorkspaceError>,
    },
}

impl WorkspaceError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        WorkspaceError::Configuration(ConfigurationError::InvalidConfiguration(msg.into()))
    }

    /// Creates an API error from a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        WorkspaceError::Api(ApiError::new(status, message))
    }

    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        WorkspaceError::Network(NetworkError::ConnectionFailed(msg.into()))
    }

    /// Creates a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        WorkspaceError::Response(ResponseError::DeserializationError(msg.into()))
    }

    /// Attaches an error key, unless the error already carries one.
    pub fn with_key(self, key: &ErrorKey) -> Self {
        match self {
            keyed @ WorkspaceError::Keyed { .. } => keyed,
            other => WorkspaceError::Keyed {
                key: key.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the error beneath any error-key wrapper.
    pub fn root(&self) -> &WorkspaceError {
        match self {
            WorkspaceError::Keyed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the error key, if one was attached.
    pub fn key(&self) -> Option<&str> {
        match self {
            WorkspaceError::Keyed { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Returns true for quota, rate and limit exhaustion reported as HTTP 403.
    ///
    /// Every other error, network failures included, is terminal.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            WorkspaceError::Api(api) => api.is_transient(),
            _ => false,
        }
    }

    /// Returns true for any HTTP 403 response.
    pub fn is_forbidden(&self) -> bool {
        matches!(self.root(), WorkspaceError::Api(api) if api.status == 403)
    }

    /// Returns the HTTP status code if applicable.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self.root() {
            WorkspaceError::Api(api) => StatusCode::from_u16(api.status).ok(),
            WorkspaceError::Authentication(_) => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}

/// An error response from a Google API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("googleapi: Error {status}: {message}")]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Human readable message from the response body.
    pub message: String,
    /// Machine readable reason of the first error item, if any.
    pub reason: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reason: None,
        }
    }

    /// Sets the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns true when the status is 403 and the message names a quota, rate or limit.
    pub fn is_transient(&self) -> bool {
        self.status == 403
            && TRANSIENT_MARKERS
                .iter()
                .any(|marker| self.message.contains(marker))
    }
}

/// Identifier of a call site and its inputs, used to attribute errors and retry logs.
///
/// Tokens are joined with `" - "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ErrorKey(String);

impl ErrorKey {
    /// Separator placed between tokens.
    pub const SEPARATOR: &'static str = " - ";

    /// Creates a key from its tokens.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key = Self::default();
        for token in tokens {
            key = key.push(token);
        }
        key
    }

    /// Appends a token.
    pub fn push(mut self, token: impl AsRef<str>) -> Self {
        if !self.0.is_empty() {
            self.0.push_str(Self::SEPARATOR);
        }
        self.0.push_str(token.as_ref());
        self
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No HTTP transport was injected before services were requested.
    #[error("No HTTP transport configured; inject one before obtaining services")]
    MissingTransport,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Profile not found.
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile file could not be read or written.
    #[error("Profile I/O error: {0}")]
    Io(String),

    /// Profile file is not valid YAML.
    #[error("Profile format error: {0}")]
    Format(String),
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// Invalid token.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Expired token.
    #[error("Expired token: {0}")]
    ExpiredToken(String),
}

/// Network errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// Response errors.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Unexpected format.
    #[error("Unexpected response format: {0}")]
    UnexpectedFormat(String),

    /// Malformed XML.
    #[error("XML parse error: {0}")]
    XmlParseError(String),
}

/// Flag declaration and resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A default does not match the declared flag type.
    #[error("Default for flag {flag} in command {command} is {actual}, declared {declared}")]
    DefaultTypeMismatch {
        /// Flag name.
        flag: String,
        /// Command name.
        command: String,
        /// Declared type.
        declared: String,
        /// Type of the supplied default.
        actual: String,
    },

    /// A flag and its `_ALL` variant were both set.
    #[error("Flags {flag} and {flag}_ALL are mutually exclusive")]
    Conflict {
        /// Flag name.
        flag: String,
    },

    /// A required flag was not set.
    #[error("Required flag {flag} (or {flag}_ALL) not set")]
    MissingRequired {
        /// Flag name.
        flag: String,
    },

    /// A flag is not declared for the command.
    #[error("Unknown flag {flag} for command {command}")]
    UnknownFlag {
        /// Flag name.
        flag: String,
        /// Command name.
        command: String,
    },

    /// A column index is outside the CSV header.
    #[error("Column index {column} for flag {flag} out of range 1..={columns}")]
    ColumnOutOfRange {
        /// Flag name.
        flag: String,
        /// Requested column.
        column: usize,
        /// Number of columns in the file.
        columns: usize,
    },

    /// A value could not be coerced into the declared type.
    #[error("Cannot parse {value:?} as {expected} for flag {flag}")]
    Coercion {
        /// Flag name.
        flag: String,
        /// Raw value.
        value: String,
        /// Declared type.
        expected: String,
    },

    /// A typed accessor was used on a flag of another type.
    #[error("Flag {flag} is {actual}, not {requested}")]
    WrongType {
        /// Flag name.
        flag: String,
        /// Requested type.
        requested: String,
        /// Actual type.
        actual: String,
    },
}

/// Batch input errors.
#[derive(Debug, Error)]
pub enum BatchError {
    /// CSV file could not be opened.
    #[error("Cannot open batch file {path}: {message}")]
    Open {
        /// File path.
        path: String,
        /// Underlying message.
        message: String,
    },

    /// CSV file has no records.
    #[error("Batch file {0} is empty")]
    Empty(String),

    /// A CSV line could not be read.
    #[error("Cannot read line {line}: {message}")]
    Read {
        /// 1-based line number.
        line: u64,
        /// Underlying message.
        message: String,
    },
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Network(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

impl From<TransportError> for WorkspaceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => WorkspaceError::Network(NetworkError::Timeout(msg)),
            TransportError::Network(msg) => {
                WorkspaceError::Network(NetworkError::ConnectionFailed(msg))
            }
            TransportError::Http(msg) => {
                WorkspaceError::Response(ResponseError::UnexpectedFormat(msg))
            }
        }
    }
}
