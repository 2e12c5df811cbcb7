use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A provider could not be read or its values did not fit the schema.
    #[display("could not load configuration")]
    Load,
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}
