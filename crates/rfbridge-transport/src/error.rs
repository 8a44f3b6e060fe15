use thiserror::Error;

/// Errors raised while opening or driving a transport.
#[derive(Error, Debug)]
pub enum Error {
    /// The serial port could not be opened.
    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// I/O failure on an established transport.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an `Open` error for the given port path.
    pub fn open(port: impl Into<String>, source: tokio_serial::Error) -> Self {
        Error::Open {
            port: port.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
