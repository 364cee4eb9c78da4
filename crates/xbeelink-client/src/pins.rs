//! Digital I/O pins of the radio module.
//!
//! Pins are configured with the `D0`..`D8` AT commands. The client keeps a
//! shadow copy of the output levels it last wrote; the module itself may
//! disagree if it was reconfigured by someone else.

use std::fmt;
use std::str::FromStr;
use std::sync::{MutexGuard, PoisonError};

use xbeelink_frame::FrameSink;

use crate::client::Client;
use crate::error::{ClientError, Result};

/// Highest DIO line with a `D<n>` command.
pub const MAX_PIN: u8 = 8;

/// Pin configuration value driving the output low.
pub const OUTPUT_LOW: u8 = 4;
/// Pin configuration value driving the output high.
pub const OUTPUT_HIGH: u8 = 5;

/// Command that forces the module to sample its enabled inputs.
const FORCE_SAMPLE: &str = "IS";

/// A DIO line of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pin(u8);

impl Pin {
    pub fn new(index: u8) -> Result<Self> {
        if index > MAX_PIN {
            return Err(ClientError::NoDevice(format!("D{index}")));
        }
        Ok(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// AT command configuring this pin.
    pub fn command(self) -> String {
        format!("D{}", self.0)
    }

    fn mask(self) -> u16 {
        1 << self.0
    }
}

impl FromStr for Pin {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let index = s
            .strip_prefix('D')
            .or_else(|| s.strip_prefix('d'))
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| ClientError::NoDevice(s.to_string()))?;
        Pin::new(index).map_err(|_| ClientError::NoDevice(s.to_string()))
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// Requested pin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Disabled,
    Analog,
    Input,
    /// Digital output, initially low.
    Output,
}

impl PinMode {
    /// `D<n>` parameter value for this mode.
    pub fn config_value(self) -> u8 {
        match self {
            PinMode::Disabled => 0,
            PinMode::Analog => 2,
            PinMode::Input => 3,
            PinMode::Output => OUTPUT_LOW,
        }
    }
}

impl<W: FrameSink> Client<W> {
    /// Drive `pin` as an output at `high` or low level.
    pub fn pin_write(&self, pin: Pin, high: bool) -> Result<()> {
        let mut shadow = self.lock_pins();
        write_level(self, &mut shadow, pin, high)
    }

    /// Invert the last level written to `pin`.
    ///
    /// Returns the new level.
    pub fn pin_toggle(&self, pin: Pin) -> Result<bool> {
        let mut shadow = self.lock_pins();
        let high = *shadow & pin.mask() == 0;
        write_level(self, &mut shadow, pin, high)?;
        Ok(high)
    }

    /// Configure the function of `pin`.
    ///
    /// [`PinMode::Output`] drives the pin low. Every mode resets the
    /// shadow level to low.
    pub fn pin_set_mode(&self, pin: Pin, mode: PinMode) -> Result<()> {
        let mut shadow = self.lock_pins();
        self.write_u8(&pin.command(), mode.config_value())?;
        *shadow &= !pin.mask();
        Ok(())
    }

    /// Force a sample of the module's inputs.
    pub fn pin_convert(&self, pin: Pin) -> Result<()> {
        tracing::debug!(%pin, "forcing input sample");
        self.at_command_write(FORCE_SAMPLE, &[])
    }

    /// Shadow level of `pin` as last written by this client.
    pub fn pin_level(&self, pin: Pin) -> bool {
        *self.lock_pins() & pin.mask() != 0
    }

    // The shadow register is a plain bitmask, valid after any panic.
    fn lock_pins(&self) -> MutexGuard<'_, u16> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// The shadow bit changes only once the module has accepted the new level.
fn write_level<W: FrameSink>(
    client: &Client<W>,
    shadow: &mut u16,
    pin: Pin,
    high: bool,
) -> Result<()> {
    let value = if high { OUTPUT_HIGH } else { OUTPUT_LOW };
    client.write_u8(&pin.command(), value)?;
    if high {
        *shadow |= pin.mask();
    } else {
        *shadow &= !pin.mask();
    }
    Ok(())
}
