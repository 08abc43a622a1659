/*!
    This module provides the hardware capabilities the driver needs from the host platform, and several implementors.

    The driver depends only on these traits, never on a concrete implementation:

    - [Pin] a digital output, for the status and error LEDs
    - [Spi] a byte-oriented duplex transfer, the only way to talk to the chip
    - [Wait] a blocking millisecond delay
    - [DebugOut] a text sink for diagnostics

    | implementor | target |
    |-------------|--------|
    | [EmbeddedPin], [EmbeddedSpi], [EmbeddedDelay] | any board support package implementing `embedded-hal` 1.0 |
    | [dummy] | host machine, no chip attached, for demos |
*/

mod embedded;
pub mod dummy;

pub use embedded::{EmbeddedPin, EmbeddedSpi, EmbeddedDelay};
use embedded_hal::spi::ErrorKind;

/// digital output
pub trait Pin {
    fn set(&mut self, level: bool);
}

/**
    byte-oriented duplex transfer

    the implementor must transfer the whole buffer in one transaction with the chip select asserted all along, the received bytes replace the sent bytes in the buffer
*/
pub trait Spi {
    fn exchange(&mut self, data: &mut [u8]) -> Result<(), ErrorKind>;
}

/// blocking delay
pub trait Wait {
    fn wait(&mut self, ms: u32);
}

/// text sink used for diagnostics only, never for control decisions
pub trait DebugOut {
    fn write(&mut self, line: &str);
}

/// placeholder for an absent LED
pub struct NoPin;
impl Pin for NoPin {
    fn set(&mut self, _level: bool) {}
}

/// text sink forwarding every line to the `log` facade
pub struct LogSink;
impl DebugOut for LogSink {
    fn write(&mut self, line: &str) {
        log::info!(target: "max14819", "{}", line);
    }
}
