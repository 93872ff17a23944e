use std::str::Utf8Error;
use std::string::FromUtf8Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, GpxError>;

#[derive(Debug)]
pub enum GpxError {
    /// A namespace prefix is already registered for another URI.
    DuplicatePrefix {
        prefix: String,
        registered_uri: String,
        requested_uri: String,
    },
    /// The document starts with `<?xml` but the declaration is never closed.
    MalformedProlog,
    UnsupportedPolicy(String),
    /// The binding engine produced no usable document.
    DeserializationFailed {
        reason: String,
        source: Option<Box<GpxError>>,
    },
    /// A second default namespace survived the save-path namespace rewrite.
    UnknownDefaultNamespace(String),
    XmlParse(quick_xml::Error),
    Xml(String),
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    InvalidValue {
        element: &'static str,
        value: String,
    },
    UnexpectedRoot(String),
    UnsupportedXmlVersion(String),
    Io(std::io::Error),
    Encoding(Utf8Error),
    Task(String),
}

impl GpxError {
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Wrap a structural error the way the load pipeline reports it.
    pub fn deserialization(source: GpxError) -> Self {
        match source {
            e @ Self::DeserializationFailed { .. } => e,
            other => Self::DeserializationFailed {
                reason: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl std::fmt::Display for GpxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePrefix {
                prefix,
                registered_uri,
                requested_uri,
            } => write!(
                f,
                "Namespace prefix '{prefix}' is already registered for {registered_uri} (requested {requested_uri})"
            ),
            Self::MalformedProlog => write!(f, "Unable to process XML declaration: missing '?>'"),
            Self::UnsupportedPolicy(name) => write!(f, "Unsupported load policy '{name}'"),
            Self::DeserializationFailed { reason, .. } => {
                write!(f, "Unable to deserialize GPX document: {reason}")
            }
            Self::UnknownDefaultNamespace(uri) => write!(f, "Unknown default namespace {uri}"),
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::Xml(message) => write!(f, "XML error: {message}"),
            Self::MissingAttribute { element, attribute } => {
                write!(f, "Missing attribute '{attribute}' on <{element}>")
            }
            Self::InvalidAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "Invalid value '{value}' for attribute '{attribute}' on <{element}>"
            ),
            Self::InvalidValue { element, value } => {
                write!(f, "Invalid value '{value}' in <{element}>")
            }
            Self::UnexpectedRoot(name) => write!(f, "Unexpected root element <{name}>"),
            Self::UnsupportedXmlVersion(version) => {
                write!(f, "Unsupported XML version '{version}' in declaration")
            }
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Encoding(e) => write!(f, "Encoding error: {e}"),
            Self::Task(message) => write!(f, "Worker task failed: {message}"),
        }
    }
}

impl std::error::Error for GpxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DeserializationFailed {
                source: Some(inner),
                ..
            } => Some(inner.as_ref()),
            Self::XmlParse(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for GpxError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

impl From<std::io::Error> for GpxError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Utf8Error> for GpxError {
    fn from(e: Utf8Error) -> Self {
        Self::Encoding(e)
    }
}

impl From<FromUtf8Error> for GpxError {
    fn from(e: FromUtf8Error) -> Self {
        Self::Encoding(e.utf8_error())
    }
}

impl From<GpxError> for JsValue {
    fn from(e: GpxError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}
