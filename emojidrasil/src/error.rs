use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{what} cannot be encoded, {value} is out of range")]
    EncodingOverflow { what: &'static str, value: String },
}
