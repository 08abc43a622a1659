//! runs the driver on host stand-ins for the hardware: no device ever answers, so both channels end up failing their wake-up

use std::error::Error;
use bilge::prelude::u2;
use iolinkage::{
    Max14819, Channel, Mode, IolinkError,
    hal::dummy::{PinDummy, SpiDummy, WaitDummy, StdoutSink},
    };

fn initialize() -> Result<Max14819, IolinkError> {
    let mut chip = Max14819::new(StdoutSink, SpiDummy, u2::new(0), WaitDummy)
        .with_leds(PinDummy::new("status", "out"), PinDummy::new("error", "out"));
    chip.init_ports()?;
    for channel in Channel::ALL {
        chip.get_port(channel)?.set_mode(Mode::Startup)?;
    }
    Ok(chip)
}

/// one step of the super loop, returns false once no channel has anything left to do
fn poll(chip: &Max14819) -> bool {
    for (channel, step) in Channel::ALL.into_iter().zip(chip.poll()) {
        match step {
            Ok(state) => log::debug!("channel {}: {:?}", channel, state),
            Err(err) => log::error!("channel {}: {}", channel, err),
        }
    }
    Channel::ALL.into_iter()
        .any(|channel| chip.get_port(channel).map_or(false, |port| port.pending()))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let chip = initialize()?;
    while poll(&chip) {}
    for channel in Channel::ALL {
        let port = chip.get_port(channel)?;
        println!("channel {}: {:?} in {:?}", channel, port.state(), port.mode());
    }
    Ok(())
}
