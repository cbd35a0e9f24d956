//! Dynamic agent inputs and their form/multipart encoding.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use roe_common::{is_http_url, is_uuid_string, looks_like_path};
use roe_domain::{Result, RoeError};
use serde_json::Value;
use tokio::io::AsyncRead;

use super::file::{FilePart, FileUpload, UploadReader};

/// One input value for an agent run.
pub enum InputValue {
    /// Classified before sending: UUIDs stay text, existing local files are
    /// uploaded, and anything else that looks like a path is rejected.
    Text(String),
    /// Sent verbatim as a form value, strings unquoted.
    Value(Value),
    Upload(FileUpload),
    /// Uploaded with the field name as filename.
    Bytes(Bytes),
    /// Uploaded with the field name as filename.
    Stream(UploadReader),
}

impl fmt::Debug for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Upload(upload) => f.debug_tuple("Upload").field(upload).finish(),
            Self::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl InputValue {
    /// Upload drained from an async reader.
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<FileUpload> for InputValue {
    fn from(value: FileUpload) -> Self {
        Self::Upload(value)
    }
}

impl From<Vec<u8>> for InputValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for InputValue {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

macro_rules! scalar_inputs {
    ($($ty:ty),*) => {
        $(impl From<$ty> for InputValue {
            fn from(value: $ty) -> Self {
                Self::Value(Value::from(value))
            }
        })*
    };
}

scalar_inputs!(bool, i32, i64, u32, u64, f64);

/// Field name to value mapping for one agent run. A key set twice keeps the
/// last value.
#[derive(Debug, Default)]
pub struct DynamicInputs {
    fields: BTreeMap<String, InputValue>,
}

impl DynamicInputs {
    /// Empty input set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, replacing an earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<InputValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Number of inputs.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no inputs are set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Input names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Classify every value and read every file part into memory.
    ///
    /// Fails before anything is sent if a text value names a local file that
    /// does not exist or an upload cannot be read.
    pub async fn encode(self) -> Result<EncodedInputs> {
        let mut fields = Vec::new();
        let mut files = Vec::new();

        for (key, value) in self.fields {
            match value {
                InputValue::Upload(upload) if upload.url().is_some() => {
                    let url = upload.url().unwrap_or_default().to_owned();
                    fields.push((key, url));
                }
                InputValue::Upload(upload) => files.push(upload.into_part(&key).await?),
                InputValue::Bytes(data) => {
                    let upload = FileUpload::from_bytes(data).with_filename(key.clone());
                    files.push(upload.into_part(&key).await?);
                }
                InputValue::Stream(reader) => {
                    let upload = FileUpload::from_reader(reader).with_filename(key.clone());
                    files.push(upload.into_part(&key).await?);
                }
                InputValue::Text(text) => match classify_text(&key, &text).await? {
                    TextKind::Field => fields.push((key, text)),
                    TextKind::File => files.push(FileUpload::from_path(text).into_part(&key).await?),
                },
                InputValue::Value(Value::String(text)) => fields.push((key, text)),
                InputValue::Value(other) => fields.push((key, other.to_string())),
            }
        }

        if files.is_empty() {
            Ok(EncodedInputs::Form(fields))
        } else {
            Ok(EncodedInputs::Multipart { fields, files })
        }
    }
}

impl<K, V> FromIterator<(K, V)> for DynamicInputs
where
    K: Into<String>,
    V: Into<InputValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut inputs = Self::new();
        for (key, value) in iter {
            inputs.insert(key, value);
        }
        inputs
    }
}

impl From<BTreeMap<String, InputValue>> for DynamicInputs {
    fn from(fields: BTreeMap<String, InputValue>) -> Self {
        Self { fields }
    }
}

/// Wire shape of a set of inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedInputs {
    /// No files: sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// Sent as `multipart/form-data`, text fields first.
    Multipart { fields: Vec<(String, String)>, files: Vec<FilePart> },
}

enum TextKind {
    Field,
    File,
}

async fn classify_text(key: &str, value: &str) -> Result<TextKind> {
    if is_uuid_string(value) {
        return Ok(TextKind::Field);
    }
    if let Ok(metadata) = tokio::fs::metadata(value).await {
        if !metadata.is_dir() {
            return Ok(TextKind::File);
        }
    }
    if looks_like_path(value) && !is_http_url(value) {
        return Err(RoeError::invalid_input(format!(
            "input {key} references a file that was not found: {value}"
        )));
    }
    Ok(TextKind::Field)
}
