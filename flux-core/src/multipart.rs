use std::collections::HashMap;

use bytes::Bytes;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can occur while reading a multipart form.
#[derive(Debug, Clone)]
pub enum MultipartError {
    /// The form could not be parsed at all.
    Malformed(String),
    /// A required field was not present in the form.
    MissingField(String),
    /// A text field could not be parsed to the expected type.
    ParseError { field: String, message: String },
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "multipart error: {msg}"),
            Self::MissingField(name) => write!(f, "missing required field: {name}"),
            Self::ParseError { field, message } => {
                write!(f, "failed to parse field '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for MultipartError {}

// ── UploadedFile ─────────────────────────────────────────────────────────────

/// A file received from a multipart form upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// The field name in the form.
    pub name: String,
    /// The original file name provided by the client, if any.
    pub file_name: Option<String>,
    /// The content type (MIME type) of the file, if provided.
    pub content_type: Option<String>,
    /// The raw file data.
    pub data: Bytes,
}

impl UploadedFile {
    /// Returns the size of the file data in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file data is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── MultipartForm ────────────────────────────────────────────────────────────

/// A fully parsed `multipart/form-data` request body.
///
/// Produced by the transport adapter via
/// [`Context::multipart_form`](crate::Context::multipart_form). Multiple
/// values per field name are supported for both text and file parts.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    /// Text fields, keyed by field name.
    pub text: HashMap<String, Vec<String>>,
    /// File fields, keyed by field name.
    pub files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field value (builder style, for adapters and tests).
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.text
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Add a file field (builder style, for adapters and tests).
    pub fn with_file(mut self, name: &str, file_name: &str, data: Bytes) -> Self {
        self.files.entry(name.to_string()).or_default().push(UploadedFile {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: None,
            data,
        });
        self
    }

    /// Take a single required text value for the given field name.
    pub fn take_text(&mut self, name: &str) -> Result<String, MultipartError> {
        self.text
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
            .ok_or_else(|| MultipartError::MissingField(name.to_string()))
    }

    /// Take an optional text value for the given field name.
    pub fn take_text_opt(&mut self, name: &str) -> Option<String> {
        self.text
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
    }

    /// Take a single required file for the given field name.
    pub fn take_file(&mut self, name: &str) -> Result<UploadedFile, MultipartError> {
        self.files
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
            .ok_or_else(|| MultipartError::MissingField(name.to_string()))
    }

    /// Take an optional file for the given field name.
    pub fn take_file_opt(&mut self, name: &str) -> Option<UploadedFile> {
        self.files
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
    }

    /// Take all files for the given field name.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Take raw bytes for the given field name (from either a file or a
    /// text part).
    pub fn take_bytes(&mut self, name: &str) -> Result<Bytes, MultipartError> {
        if let Some(file) = self.take_file_opt(name) {
            return Ok(file.data);
        }
        if let Some(text) = self.take_text_opt(name) {
            return Ok(Bytes::from(text));
        }
        Err(MultipartError::MissingField(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_text_consumes_in_order() {
        let mut form = MultipartForm::new()
            .with_text("tag", "first")
            .with_text("tag", "second");
        assert_eq!(form.take_text("tag").unwrap(), "first");
        assert_eq!(form.take_text("tag").unwrap(), "second");
        assert!(matches!(
            form.take_text("tag"),
            Err(MultipartError::MissingField(_))
        ));
    }

    #[test]
    fn take_bytes_prefers_file() {
        let mut form = MultipartForm::new()
            .with_text("data", "text-value")
            .with_file("data", "blob.bin", Bytes::from_static(b"\x00\x01"));
        assert_eq!(form.take_bytes("data").unwrap(), Bytes::from_static(b"\x00\x01"));
        assert_eq!(form.take_bytes("data").unwrap(), Bytes::from("text-value"));
    }

    #[test]
    fn missing_field_names_the_field() {
        let mut form = MultipartForm::new();
        let err = form.take_file("avatar").unwrap_err();
        assert_eq!(err.to_string(), "missing required field: avatar");
    }
}
