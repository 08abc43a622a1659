//! definition of the general IO-Link master error type

use core::fmt;
use embedded_hal::spi::ErrorKind;
use crate::{
    data::Channel,
    framer::Fault,
    };

/**
    general object reporting an unexpected result regarding the communication with the transceiver or the devices behind it

    Its variants are meant to help finding the cause responsible for the problem and how to deal with it. None of them is fatal to the whole chip: the only way to reset the chip is an explicit call to [crate::Max14819::reset]
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IolinkError {
    /// error caused by the SPI bus primitive
    ///
    /// these errors are exterior to this library, the failed operation can be retried at the caller's discretion
    Bus(ErrorKind),

    /// the device on the given channel did not answer any wake-up request in the allowed time
    ///
    /// the channel is left in [crate::WakeUpState::Failed], calling [crate::Port::set_mode] again restarts the wake-up sequence
    WakeUpTimeout(Channel),

    /// the device did not send back the expected number of bytes in time
    ///
    /// the channel stays established and the same transfer can be retried
    TransferTimeout {
        channel: Channel,
        expected: usize,
        received: usize,
    },

    /// a fault reported by the transceiver for the last transfer (checksum, parity, framing, size ...)
    ///
    /// it is up to the caller to retry the transfer, reset the channel or abandon
    Fault(Fault),

    /// the channel has not been initialized, [crate::Max14819::init_ports] must be called first
    InvalidChannel(Channel),

    /// a message length exceeds [crate::MAX_MSG_LENGTH]
    InvalidLength(usize),

    /// a register address exceeds [crate::registers::MAX_REG]
    InvalidRegister(u8),

    /// a message exchange was requested on a channel with no established communication
    NotEstablished(Channel),
}

/// convenient alias to simplify return annotations
pub type IolinkResult<T=()> = core::result::Result<T, IolinkError>;

impl IolinkError {
    /// true if the operation can be attempted again as is
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Bus(_) | Self::WakeUpTimeout(_) | Self::TransferTimeout {..} | Self::Fault(_) => true,
            Self::InvalidChannel(_) | Self::InvalidLength(_) | Self::InvalidRegister(_) | Self::NotEstablished(_) => false,
        }
    }
}

impl fmt::Display for IolinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "spi bus error: {}", kind),
            Self::WakeUpTimeout(channel) => write!(f, "no wake-up response on channel {}", channel),
            Self::TransferTimeout {channel, expected, received} =>
                write!(f, "transfer timeout on channel {}: received {} of {} bytes", channel, received, expected),
            Self::Fault(fault) => write!(f, "transfer fault: {}", fault),
            Self::InvalidChannel(channel) => write!(f, "channel {} is not initialized", channel),
            Self::InvalidLength(len) => write!(f, "message length {} exceeds the fifo size", len),
            Self::InvalidRegister(address) => write!(f, "register 0x{:02x} does not exist", address),
            Self::NotEstablished(channel) => write!(f, "no communication established on channel {}", channel),
        }
    }
}

impl std::error::Error for IolinkError {}

impl From<ErrorKind> for IolinkError {
    fn from(src: ErrorKind) -> Self {
        IolinkError::Bus(src)
    }
}

impl From<Fault> for IolinkError {
    fn from(src: Fault) -> Self {
        IolinkError::Fault(src)
    }
}
