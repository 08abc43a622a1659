/*!
    IO-Link master driver for the MAX14819 dual-channel transceiver.

    The chip is reached over SPI through the capability traits of [hal], and exposes two independent channels (IO-Link ports):

    - [Max14819] owns the hardware resources, performs the chip startup and issues every register access
    - [Port] is the controller of one channel: mode selection, wake-up sequence and message exchange
    - [registers] is the typed register map of the chip
    - [FifoFrame] and [TransferResult] describe a message transfer through the chip FIFOs

    The driver is synchronous and poll-driven: nothing happens on a channel unless one of its methods is called.
*/

pub mod data;
pub mod registers;
pub mod hal;
mod error;
mod framer;
mod chip;
mod port;

pub use crate::error::{IolinkError, IolinkResult};
pub use crate::data::{Channel, Register, RegisterPair, RegisterData};
pub use crate::registers::ComSpeed;
pub use crate::framer::{FifoFrame, Fault, TransferResult, Message, MAX_MSG_LENGTH, RESPONSE_MARGIN, MAX_TRANSFER_TIME};
pub use crate::chip::{Max14819, ChipConfig, ClockSource, INIT_POWER_OFF_DELAY, INIT_BOOTUP_DELAY, POLL_INTERVAL};
pub use crate::port::{
    Port, PortConfig, Mode, DiConfig, DiCurrent, Threshold, CqDriver,
    WakeUpState, CommunicationInfo, WURQ_RETRIES, INIT_WURQ_TIMEOUT,
    };
