/*!
    host-side stand-ins for the hardware, allowing to run the driver with no chip attached.

    Nothing is driven: pins and delays only report what they would do, and the SPI answers zeros as an unpowered bus would.
*/

use std::{thread, time::Duration};
use embedded_hal::spi::ErrorKind;
use super::{Pin, Spi, Wait, DebugOut};

/// pin reporting its changes in the log, it reverts to input mode when dropped
pub struct PinDummy {
    name: String,
}
impl PinDummy {
    pub fn new(name: &str, mode: &str) -> Self {
        let pin = Self {name: name.to_owned()};
        pin.pin_mode(mode);
        pin
    }
    fn pin_mode(&self, mode: &str) {
        log::info!("pinmode: {}={}", self.name, mode);
    }
}
impl Pin for PinDummy {
    fn set(&mut self, level: bool) {
        log::info!("pin set: {}={}", self.name, if level {"HIGH"} else {"LOW"});
    }
}
impl Drop for PinDummy {
    fn drop(&mut self) {
        self.pin_mode("in");
    }
}

/// delay sleeping the current thread
pub struct WaitDummy;
impl Wait for WaitDummy {
    fn wait(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}

/// SPI with nothing connected, every byte read is zero
pub struct SpiDummy;
impl Spi for SpiDummy {
    fn exchange(&mut self, data: &mut [u8]) -> Result<(), ErrorKind> {
        data.fill(0);
        Ok(())
    }
}

/// text sink printing on the standard output
pub struct StdoutSink;
impl DebugOut for StdoutSink {
    fn write(&mut self, line: &str) {
        println!("{}", line);
    }
}
