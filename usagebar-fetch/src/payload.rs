//! Raw payloads as returned by fetchers.

use serde::{Deserialize, Serialize};

/// How a payload body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// JSON document.
    Json,
    /// Human-oriented CLI output.
    Text,
}

impl PayloadFormat {
    /// Guesses the format from the body.
    pub fn detect(body: &str) -> Self {
        if body.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Unparsed upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    body: String,
    format: PayloadFormat,
}

impl RawPayload {
    /// Creates a payload with an explicit format.
    pub fn new(body: impl Into<String>, format: PayloadFormat) -> Self {
        Self {
            body: body.into(),
            format,
        }
    }

    /// Creates a JSON payload.
    pub fn json(body: impl Into<String>) -> Self {
        Self::new(body, PayloadFormat::Json)
    }

    /// Creates a text payload.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(body, PayloadFormat::Text)
    }

    /// Creates a payload, detecting the format from the body.
    pub fn detect(body: impl Into<String>) -> Self {
        let body = body.into();
        let format = PayloadFormat::detect(&body);
        Self { body, format }
    }

    /// The raw body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The body format.
    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Returns true if the body is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}
