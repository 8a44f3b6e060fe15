use thiserror::Error;

/// Errors from the firmware line codec.
///
/// Inbound noise never produces an error; the decoder drops and counts
/// it. Only transport I/O failures and unencodable outbound commands
/// surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying transport failure.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A command could not be parsed from its wire form, or would not
    /// render as a single line.
    #[error("malformed command line '{line}'")]
    MalformedCommand { line: String },
}

pub type Result<T> = std::result::Result<T, Error>;
