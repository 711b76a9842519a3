//! Shared call, argument, fault, and record types for the relay interception layer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fault kind reported when an envelope carries no underlying cause.
pub const ENVELOPE_FAULT_KIND: &str = "InvocationEnvelope";

/// A delivered message object that may expose its body as text.
pub trait Message: Send + Sync + fmt::Debug {
    /// Zero-argument text accessor. `None` when the message has no text body.
    fn text(&self) -> Option<String>;
}

/// One argument of an intercepted call.
#[derive(Clone, Debug)]
pub enum Arg {
    Null,
    Text(String),
    Value(Value),
    Message(Arc<dyn Message>),
}

impl Arg {
    pub fn message(message: impl Message + 'static) -> Self {
        Arg::Message(Arc::new(message))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null | Arg::Value(Value::Null))
    }

    /// The argument itself, when it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Text(text) => Some(text),
            Arg::Value(Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl<T> From<Option<T>> for Arg
where
    T: Into<Arg>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Null)
    }
}

/// A named capability interface and the methods it declares.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Interface {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl Interface {
    pub fn new<I, S>(name: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    pub fn declares(&self, method: &str) -> bool {
        self.methods.iter().any(|declared| declared == method)
    }
}

#[derive(Clone, Debug)]
pub struct Invocation {
    pub method: String,
    pub args: Vec<Arg>,
}

impl Invocation {
    pub fn new(method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// A fault raised by a target implementation: its type name and optional message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fault {
    pub kind: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: Some(message.into()),
        }
    }

    pub fn bare(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => f.write_str(&self.kind),
        }
    }
}

impl std::error::Error for Fault {}

/// Error produced by a dispatch mechanism.
///
/// `Envelope` is the indirection layer's wrapper around whatever the real
/// implementation raised; `Fault` is a fault that arrived unwrapped.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invocation envelope: {message}")]
    Envelope {
        message: String,
        #[source]
        cause: Option<Fault>,
    },
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl DispatchError {
    pub fn wrapping(cause: Fault) -> Self {
        DispatchError::Envelope {
            message: format!("target raised {}", cause.kind),
            cause: Some(cause),
        }
    }

    /// Unwraps exactly one envelope level. An envelope without a cause
    /// becomes a fault of kind [`ENVELOPE_FAULT_KIND`].
    pub fn into_fault(self) -> Fault {
        match self {
            DispatchError::Envelope {
                cause: Some(cause), ..
            } => cause,
            DispatchError::Envelope {
                message,
                cause: None,
            } => Fault::new(ENVELOPE_FAULT_KIND, message),
            DispatchError::Fault(fault) => fault,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecordKind {
    #[serde(rename = "s3Pointer")]
    S3Pointer,
    #[serde(rename = "reportResponse")]
    ReportResponse,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::S3Pointer => "s3Pointer",
            RecordKind::ReportResponse => "reportResponse",
        }
    }
}

/// Schema-specific fields of one captured artifact, in insertion order.
///
/// The timestamp is stamped by the capture store at write time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedRecord {
    kind: RecordKind,
    fields: Vec<(&'static str, Option<String>)>,
}

impl CapturedRecord {
    pub fn s3_pointer(bucket: Option<String>, key: Option<String>) -> Self {
        Self {
            kind: RecordKind::S3Pointer,
            fields: vec![("bucket", bucket), ("key", key)],
        }
    }

    pub fn report_response(report_name: Option<String>, report_result_xml: Option<String>) -> Self {
        Self {
            kind: RecordKind::ReportResponse,
            fields: vec![
                ("reportName", report_name),
                ("reportResultXml", report_result_xml),
            ],
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn fields(&self) -> &[(&'static str, Option<String>)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// True when at least one schema field carries a value.
    pub fn has_values(&self) -> bool {
        self.fields.iter().any(|(_, value)| value.is_some())
    }

    /// `type` discriminator followed by the schema fields.
    pub fn entries(&self) -> Vec<(&str, Option<&str>)> {
        let mut entries = Vec::with_capacity(self.fields.len() + 1);
        entries.push(("type", Some(self.kind.as_str())));
        entries.extend(
            self.fields
                .iter()
                .map(|(name, value)| (*name, value.as_deref())),
        );
        entries
    }
}
