//! adapters from the `embedded-hal` traits, so any board support package can drive the chip

use embedded_hal::{
    digital::{self, OutputPin, PinState},
    spi::{self, ErrorKind, SpiDevice},
    delay::DelayNs,
    };
use super::{Pin, Spi, Wait};

/// output pin from an `embedded-hal` pin
pub struct EmbeddedPin<P>(pub P);

impl<P: OutputPin> Pin for EmbeddedPin<P> {
    fn set(&mut self, level: bool) {
        if let Err(err) = self.0.set_state(PinState::from(level)) {
            log::warn!("cannot set pin: {:?}", digital::Error::kind(&err));
        }
    }
}

/**
    SPI transfer from an `embedded-hal` device

    [SpiDevice] owns the chip select, so the whole exchange is one transaction as required by [Spi]
*/
pub struct EmbeddedSpi<D>(pub D);

impl<D: SpiDevice> Spi for EmbeddedSpi<D> {
    fn exchange(&mut self, data: &mut [u8]) -> Result<(), ErrorKind> {
        self.0.transfer_in_place(data)
            .map_err(|err| spi::Error::kind(&err))
    }
}

/// delay from an `embedded-hal` delay provider
pub struct EmbeddedDelay<D>(pub D);

impl<D: DelayNs> Wait for EmbeddedDelay<D> {
    fn wait(&mut self, ms: u32) {
        self.0.delay_ms(ms)
    }
}
