// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Line configuration accepted by the loopback port.
//!
//! There is no physical line behind the port, so none of these settings
//! change how bytes move. They are stored so the host can read back what it
//! programmed, and so they survive a state save/restore.

use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::result;

/// Baud rate reported until the host programs another one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Errors encountered while decoding raw line configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Number of data bits outside 5..=8.
    DataBits(u8),
    /// Stop bit count, in half bits, other than 2, 3 or 4.
    StopBits(u8),
    /// Unknown parity encoding.
    Parity(u8),
    /// Unknown flow control encoding.
    FlowControl(u8),
}

/// Specialized Result type for [config Errors](enum.Error.html).
pub type Result<T> = result::Result<T, Error>;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::DataBits(v) => write!(f, "Invalid number of data bits: {}", v),
            Error::StopBits(v) => write!(f, "Invalid number of stop half bits: {}", v),
            Error::Parity(v) => write!(f, "Invalid parity encoding: {}", v),
            Error::FlowControl(v) => write!(f, "Invalid flow control encoding: {}", v),
        }
    }
}

impl std::error::Error for Error {}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(Error::DataBits(bits)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Length of the stop bit period.
///
/// Serial frameworks usually count it in half bits, which is the raw
/// encoding used for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit (2 half bits).
    One,
    /// One and a half stop bits (3 half bits).
    OneAndHalf,
    /// Two stop bits (4 half bits).
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = Error;

    fn try_from(half_bits: u8) -> Result<Self> {
        match half_bits {
            2 => Ok(StopBits::One),
            3 => Ok(StopBits::OneAndHalf),
            4 => Ok(StopBits::Two),
            _ => Err(Error::StopBits(half_bits)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> u8 {
        match bits {
            StopBits::One => 2,
            StopBits::OneAndHalf => 3,
            StopBits::Two => 4,
        }
    }
}

/// Parity scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
    /// Parity bit always set.
    Mark,
    /// Parity bit always cleared.
    Space,
}

impl TryFrom<u8> for Parity {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            3 => Ok(Parity::Mark),
            4 => Ok(Parity::Space),
            _ => Err(Error::Parity(value)),
        }
    }
}

impl From<Parity> for u8 {
    fn from(parity: Parity) -> u8 {
        match parity {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }
}

/// Flow control mode. Recorded only; the loopback never throttles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    /// No flow control.
    None,
    /// Hardware flow control over RTS/CTS.
    RtsCts,
    /// Hardware flow control over DTR/DSR.
    DtrDsr,
    /// Software flow control with the given XON and XOFF characters.
    XonXoff {
        /// Character resuming transmission.
        xon: u8,
        /// Character pausing transmission.
        xoff: u8,
    },
}

// XON/XOFF defaults (DC1/DC3).
const DEFAULT_XON: u8 = 0x11;
const DEFAULT_XOFF: u8 = 0x13;

impl FlowControl {
    /// Decodes a flow control mode from its raw encoding and the software
    /// flow control characters, which are ignored by the other modes.
    pub fn from_raw(mode: u8, xon: u8, xoff: u8) -> Result<Self> {
        match mode {
            0 => Ok(FlowControl::None),
            1 => Ok(FlowControl::RtsCts),
            2 => Ok(FlowControl::DtrDsr),
            3 => Ok(FlowControl::XonXoff { xon, xoff }),
            _ => Err(Error::FlowControl(mode)),
        }
    }

    /// Returns the raw encoding as `(mode, xon, xoff)`.
    pub fn to_raw(self) -> (u8, u8, u8) {
        match self {
            FlowControl::None => (0, DEFAULT_XON, DEFAULT_XOFF),
            FlowControl::RtsCts => (1, DEFAULT_XON, DEFAULT_XOFF),
            FlowControl::DtrDsr => (2, DEFAULT_XON, DEFAULT_XOFF),
            FlowControl::XonXoff { xon, xoff } => (3, xon, xoff),
        }
    }
}

/// Line settings programmed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Baud rate, in bits per second.
    pub baud_rate: u32,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Stop bit length.
    pub stop_bits: StopBits,
    /// Parity scheme.
    pub parity: Parity,
    /// Flow control mode.
    pub flow_control: FlowControl,
    /// Receive latency timer, in milliseconds.
    pub latency_timer: u32,
}

impl Default for UartConfig {
    /// 9600 bps, 8 data bits, no parity, one stop bit, no flow control.
    fn default() -> Self {
        UartConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            latency_timer: 0,
        }
    }
}

impl Display for UartConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        let stop = match self.stop_bits {
            StopBits::One => "1",
            StopBits::OneAndHalf => "1.5",
            StopBits::Two => "2",
        };
        write!(
            f,
            "{} {}-{}-{}",
            self.baud_rate,
            u8::from(self.data_bits),
            parity,
            stop
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UartConfig::default();

        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.to_string(), "9600 8-N-1");
    }

    #[test]
    fn test_data_bits_encoding() {
        for bits in 5..=8u8 {
            assert_eq!(u8::from(DataBits::try_from(bits).unwrap()), bits);
        }
        assert_eq!(DataBits::try_from(9), Err(Error::DataBits(9)));
        assert_eq!(DataBits::try_from(4), Err(Error::DataBits(4)));
    }

    #[test]
    fn test_stop_bits_encoding() {
        assert_eq!(StopBits::try_from(3), Ok(StopBits::OneAndHalf));
        assert_eq!(u8::from(StopBits::Two), 4);
        assert_eq!(StopBits::try_from(1), Err(Error::StopBits(1)));
    }

    #[test]
    fn test_parity_encoding() {
        assert_eq!(Parity::try_from(2), Ok(Parity::Even));
        assert_eq!(u8::from(Parity::Space), 4);
        assert_eq!(
            Parity::try_from(7).unwrap_err().to_string(),
            "Invalid parity encoding: 7"
        );
    }

    #[test]
    fn test_flow_control_encoding() {
        let xon_xoff = FlowControl::from_raw(3, b'q', b's').unwrap();
        assert_eq!(xon_xoff, FlowControl::XonXoff { xon: b'q', xoff: b's' });
        assert_eq!(xon_xoff.to_raw(), (3, b'q', b's'));

        // The characters only matter for software flow control.
        assert_eq!(FlowControl::from_raw(1, 0, 0), Ok(FlowControl::RtsCts));
        assert_eq!(FlowControl::RtsCts.to_raw(), (1, DEFAULT_XON, DEFAULT_XOFF));
        assert_eq!(FlowControl::from_raw(4, 0, 0), Err(Error::FlowControl(4)));
    }

    #[test]
    fn test_config_display() {
        let config = UartConfig {
            baud_rate: 115_200,
            data_bits: DataBits::Seven,
            stop_bits: StopBits::OneAndHalf,
            parity: Parity::Even,
            ..Default::default()
        };
        assert_eq!(config.to_string(), "115200 7-E-1.5");
    }
}
