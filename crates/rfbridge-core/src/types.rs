use crate::{
    Result,
    constants::{MAX_PIN, MAX_PULSE_MICROS, MAX_TRAIN_PULSES, MIN_PIN},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Digital pin assignment on the bridge microcontroller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Pin(u8);

impl Pin {
    /// Create a new pin with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidPin` if the pin is outside the assignable
    /// range (2-13). Pins 0 and 1 carry the serial link itself.
    pub fn new(pin: u8) -> Result<Self> {
        if !(MIN_PIN..=MAX_PIN).contains(&pin) {
            return Err(Error::InvalidPin { value: pin });
        }
        Ok(Pin(pin))
    }

    /// Get the raw pin number as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Pin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pin: u8 = s.parse().map_err(|_| Error::PinParse {
            token: s.to_string(),
        })?;
        Pin::new(pin)
    }
}

impl TryFrom<u8> for Pin {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Pin::new(value)
    }
}

impl From<Pin> for u8 {
    fn from(pin: Pin) -> u8 {
        pin.0
    }
}

/// One RF burst: alternating high/low signal durations in microseconds.
///
/// The sign of each entry carries the line level (positive high, negative
/// low); the magnitude carries the duration. Timing-based matching only
/// ever consults magnitudes, so a train and its inverted twin decode the
/// same way.
///
/// Wire form (`Display`/`FromStr`) is the comma-separated decimal list used
/// by the firmware's event and transmit lines: `276,-2670,276,-1340`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct PulseTrain(Vec<i32>);

impl PulseTrain {
    /// Create a new pulse train with validation.
    ///
    /// # Errors
    /// Returns `Error::EmptyTrain` for an empty sequence,
    /// `Error::TrainTooLong` when the firmware buffer capacity is exceeded,
    /// and `Error::InvalidDuration` for a zero duration or a magnitude
    /// beyond the plausibility bound.
    pub fn new(durations: Vec<i32>) -> Result<Self> {
        if durations.is_empty() {
            return Err(Error::EmptyTrain);
        }
        if durations.len() > MAX_TRAIN_PULSES {
            return Err(Error::TrainTooLong {
                count: durations.len(),
                limit: MAX_TRAIN_PULSES,
            });
        }
        for (index, &value) in durations.iter().enumerate() {
            if value == 0 || value.unsigned_abs() > MAX_PULSE_MICROS as u32 {
                return Err(Error::InvalidDuration { index, value });
            }
        }
        Ok(PulseTrain(durations))
    }

    /// Signed durations in wire order.
    #[must_use]
    pub fn durations(&self) -> &[i32] {
        &self.0
    }

    /// Duration magnitude at `index`, in microseconds.
    #[must_use]
    pub fn magnitude(&self, index: usize) -> u32 {
        self.0[index].unsigned_abs()
    }

    /// Number of pulses in the train.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for slice-like ergonomics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the train and return the raw durations.
    #[must_use]
    pub fn into_inner(self) -> Vec<i32> {
        self.0
    }
}

impl fmt::Display for PulseTrain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for duration in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{duration}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for PulseTrain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let durations = s
            .split(',')
            .map(|token| {
                token.trim().parse::<i32>().map_err(|_| Error::DurationParse {
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<i32>>>()?;
        PulseTrain::new(durations)
    }
}

impl TryFrom<Vec<i32>> for PulseTrain {
    type Error = Error;

    fn try_from(durations: Vec<i32>) -> Result<Self> {
        PulseTrain::new(durations)
    }
}

impl From<PulseTrain> for Vec<i32> {
    fn from(train: PulseTrain) -> Vec<i32> {
        train.0
    }
}
