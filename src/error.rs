use thiserror::Error;

/// Error types for the extraction pipeline
#[derive(Error, Debug)]
pub enum ScrapeError {
    // Navigation errors
    #[error("Failed to load {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Invalid target address for '{target}': {message}")]
    InvalidTarget { target: String, message: String },

    // Locator errors
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Attribute '{attribute}' missing on {selector}")]
    AttributeMissing { selector: String, attribute: String },

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Interaction failed: {message}")]
    InteractionFailed { message: String },

    #[error("Required field '{field}' is empty for {target}")]
    MissingRequiredField { field: String, target: String },

    // Session errors
    #[error("Browser session error: {message}")]
    Session { message: String },

    #[error("HTTP request failed: {url} - {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Sink errors
    #[error("Sink '{sink}' failed for {path}: {message}")]
    Sink { sink: String, path: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Create a navigation error
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation { url: url.into(), message: message.into() }
    }

    /// Create an element-not-found error
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound { selector: selector.into() }
    }

    /// Create an interaction error
    pub fn interaction(message: impl Into<String>) -> Self {
        Self::InteractionFailed { message: message.into() }
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session { message: message.into() }
    }

    /// Create a sink error
    pub fn sink(sink: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink { sink: sink.into(), path: path.into(), message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether the error only costs the current target and the run goes on.
    pub fn skips_target(&self) -> bool {
        match self {
            Self::Navigation { .. } |
            Self::InvalidTarget { .. } |
            Self::ElementNotFound { .. } |
            Self::AttributeMissing { .. } |
            Self::InteractionFailed { .. } |
            Self::MissingRequiredField { .. } |
            Self::HttpStatus { .. } |
            Self::Http(_) => true,

            Self::Session { .. } |
            Self::Configuration { .. } |
            Self::InvalidSelector { .. } => false,

            Self::Sink { .. } |
            Self::Io(_) |
            Self::Serialization(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Navigation { .. } | Self::InvalidTarget { .. } => "navigation",
            Self::ElementNotFound { .. } | Self::AttributeMissing { .. } | Self::InvalidSelector { .. } => "locator",
            Self::InteractionFailed { .. } => "interaction",
            Self::MissingRequiredField { .. } => "extraction",
            Self::Session { .. } => "session",
            Self::HttpStatus { .. } | Self::Http(_) => "network",
            Self::Sink { .. } | Self::Io(_) | Self::Serialization(_) => "sink",
            Self::Configuration { .. } => "configuration",
        }
    }
}

/// Result type alias for the pipeline
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
