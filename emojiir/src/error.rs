use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Unable to resolve {0}")]
    UnresolvedReference(String),
    #[error(transparent)]
    EncodingOverflow(#[from] emojidrasil::error::Error),
    #[error("Shape '{0}' was never added to the reusable parts")]
    ReuseUnregistered(String),
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("Invalid color '{0}'")]
    InvalidColor(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Error parsing XML: '{0}'")]
    Xml(#[from] quick_xml::Error),
    #[error("Error parsing XML attribute: '{0}'")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }
}
