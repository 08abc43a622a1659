/*!
    framing of the messages exchanged through the per-channel FIFOs, and decoding of the transfer results.

    The transmit FIFO expects the length of the device answer and the length of the master message ahead of the message itself:

    | byte | content |
    |------|---------|
    | 0 | number of bytes expected from the device |
    | 1 | number of bytes to send |
    | 2.. | message bytes |

    Once sent, the answer bytes are read back from the same data register, and the [CqError] register tells whether the transfer went well.
*/

use core::fmt;
use crate::{
    registers::CqError,
    port::CommunicationInfo,
    error::{IolinkError, IolinkResult},
    };

/// maximal number of bytes in a message (according to the chip FIFO length)
pub const MAX_MSG_LENGTH: usize = 64;
/// (ms) time allowed to the device to start answering, on top of the time needed for the bytes on the wire
pub const RESPONSE_MARGIN: u32 = 10;
/// (ms) upper bound for any transfer, whatever the communication rate
pub const MAX_TRANSFER_TIME: u32 = 500;
/// bits per byte on the wire: start + 8 data + parity + stop
const UART_FRAME_BITS: u32 = 11;

/// one IO-Link telegram
pub type Message = heapless::Vec<u8, MAX_MSG_LENGTH>;


/// content of the transmit FIFO for one transfer
#[derive(Copy, Clone, Debug)]
pub struct FifoFrame<'a> {
    expected: u8,
    data: &'a [u8],
}
impl<'a> FifoFrame<'a> {
    /// check the lengths and build the frame, no transfer can be larger than the FIFO
    pub fn new(data: &'a [u8], expected: usize) -> IolinkResult<Self> {
        if data.len() > MAX_MSG_LENGTH  {return Err(IolinkError::InvalidLength(data.len()))}
        if expected > MAX_MSG_LENGTH  {return Err(IolinkError::InvalidLength(expected))}
        Ok(Self {
            // both lengths are checked below 64
            expected: expected as u8,
            data,
        })
    }
    /// number of bytes expected from the device
    pub fn expected(&self) -> usize  {self.expected.into()}
    /// bytes to push in the transmit FIFO, in order
    pub fn bytes(&self) -> impl Iterator<Item=u8> + 'a {
        let data = self.data;
        [self.expected, data.len() as u8].into_iter()
            .chain(data.iter().copied())
    }
    /// number of bytes to push in the transmit FIFO, never zero
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize  {self.data.len() + 2}

    /// (ms) time allowed for the whole exchange at the given rate
    pub fn time_budget(&self, info: &CommunicationInfo) -> u32 {
        if info.com_speed_baud == 0  {return MAX_TRANSFER_TIME}
        let bits = (self.len() + self.expected()) as u32 * UART_FRAME_BITS;
        let wire = (bits * 1000).div_ceil(info.com_speed_baud);
        (wire + RESPONSE_MARGIN).min(MAX_TRANSFER_TIME)
    }
}


/// every fault the chip can report about a transfer
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Fault {
    /// the chip could not send the message
    Transmission,
    /// the cycle timer elapsed before the transfer completed
    Cycle,
    TxChecksum,
    TxSize,
    /// checksum mismatch in the device answer
    RxChecksum,
    /// the device answer has not the expected size
    RxSize,
    /// a stop bit is missing in the device answer
    Frame,
    Parity,
}
impl Fault {
    pub const ALL: [Fault; 8] = [
        Fault::Transmission,
        Fault::Cycle,
        Fault::TxChecksum,
        Fault::TxSize,
        Fault::RxChecksum,
        Fault::RxSize,
        Fault::Frame,
        Fault::Parity,
        ];

    /// true if this fault is flagged in the given register value
    pub fn is_set(self, errors: CqError) -> bool {
        match self {
            Self::Transmission => errors.transmission(),
            Self::Cycle => errors.cycle(),
            Self::TxChecksum => errors.tx_checksum(),
            Self::TxSize => errors.tx_size(),
            Self::RxChecksum => errors.rx_checksum(),
            Self::RxSize => errors.rx_size(),
            Self::Frame => errors.frame(),
            Self::Parity => errors.parity(),
        }
    }
    /// register value flagging this fault only
    pub fn flag(self) -> CqError {
        let mut errors = CqError::default();
        match self {
            Self::Transmission => errors.set_transmission(true),
            Self::Cycle => errors.set_cycle(true),
            Self::TxChecksum => errors.set_tx_checksum(true),
            Self::TxSize => errors.set_tx_size(true),
            Self::RxChecksum => errors.set_rx_checksum(true),
            Self::RxSize => errors.set_rx_size(true),
            Self::Frame => errors.set_frame(true),
            Self::Parity => errors.set_parity(true),
        }
        errors
    }
}
impl fmt::Display for Fault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Transmission => "transmission",
            Self::Cycle => "cycle time",
            Self::TxChecksum => "transmit checksum",
            Self::TxSize => "transmit size",
            Self::RxChecksum => "receive checksum",
            Self::RxSize => "receive size",
            Self::Frame => "framing",
            Self::Parity => "parity",
        };
        write!(f, "{}", text)
	}
}


/// outcome of a message transfer
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransferResult {
    /// true if no fault is flagged and the whole answer has been received
    pub success: bool,
    /// faults flagged by the chip
    pub errors: CqError,
}
impl TransferResult {
    pub fn decode(errors: CqError, received: usize, expected: usize) -> Self {
        Self {
            success: errors == CqError::default() && received == expected,
            errors,
        }
    }
    /// iterate over the flagged faults
    pub fn faults(&self) -> impl Iterator<Item=Fault> + '_ {
        Fault::ALL.into_iter().filter(|fault| fault.is_set(self.errors))
    }
    /**
        convert into an error if the transfer failed

        a short answer with no fault flagged is reported as [Fault::RxSize]
    */
    pub fn check(&self) -> IolinkResult {
        if self.success  {return Ok(())}
        Err(IolinkError::Fault(self.faults().next().unwrap_or(Fault::RxSize)))
    }
}
