use thiserror::Error;

use crate::constants::{MAX_PIN, MIN_PIN};

#[derive(Error, Debug)]
pub enum Error {
    // Pin errors
    #[error("pin {value} out of range ({min}-{max})", min = MIN_PIN, max = MAX_PIN)]
    InvalidPin { value: u8 },

    #[error("invalid pin token '{token}'")]
    PinParse { token: String },

    // Pulse train errors
    #[error("pulse train is empty")]
    EmptyTrain,

    #[error("pulse train has {count} pulses, firmware limit is {limit}")]
    TrainTooLong { count: usize, limit: usize },

    #[error("pulse {index} has invalid duration {value}")]
    InvalidDuration { index: usize, value: i32 },

    #[error("invalid pulse duration token '{token}'")]
    DurationParse { token: String },
}

pub type Result<T> = std::result::Result<T, Error>;
