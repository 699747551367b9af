use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load the configuration")]
    Config,
    /// A configured collaborator could not be built.
    #[display("could not set up {_0}")]
    Setup(#[error(not(source))] &'static str),
    #[display("record operation failed")]
    Records,
    #[display("could not write output")]
    Output,
}
