mod common;

use embedded_hal::spi::ErrorKind;
use bilge::prelude::u2;
use iolinkage::{
    Max14819, ChipConfig, Channel, IolinkError, Mode, DiConfig, DiCurrent, Threshold,
    WakeUpState, INIT_POWER_OFF_DELAY, INIT_BOOTUP_DELAY,
    registers::{self, IoConfig, Status},
    RegisterData,
    hal::{NoPin, LogSink},
    };
use common::*;


#[test]
fn register_loopback() {
    init_log();
    let spi = Loopback::default();
    let chip = Max14819::new(LogSink, spi.clone(), u2::new(0), Clock(Simulator::new(0)));
    for address in 0 ..= registers::MAX_REG {
        let value = address.wrapping_mul(37) ^ 0xa5;
        chip.write_register(address, value).unwrap();
        assert_eq!(chip.read_register(address).unwrap(), value, "register 0x{:02x}", address);
    }
    // one transaction per access
    assert_eq!(spi.frames.lock().unwrap().len(), 2 * (usize::from(registers::MAX_REG) + 1));
}

#[test]
fn command_bytes() {
    init_log();
    let spi = Loopback::default();
    let chip = Max14819::new(LogSink, spi.clone(), u2::new(2), Clock(Simulator::new(2)));
    chip.write_register(0x06, 0x31).unwrap();
    chip.read_register(0x1f).unwrap();
    chip.write(registers::io_config.of(Channel::B), IoConfig::default()).unwrap();
    assert_eq!(*spi.frames.lock().unwrap(), vec![
        [0x46, 0x31],
        [0xdf, 0x00],
        [0x5b, 0x00],
        ]);
}

#[test]
fn invalid_register() {
    init_log();
    let sim = Simulator::new(0);
    let chip = chip(&sim, ChipConfig::default());
    assert_eq!(chip.write_register(0x20, 0), Err(IolinkError::InvalidRegister(0x20)));
    assert_eq!(chip.read_register(0xff), Err(IolinkError::InvalidRegister(0xff)));
    assert_eq!(sim.lock().unwrap().transactions, 0);
}

#[test]
fn bus_error() {
    init_log();
    let sim = Simulator::new(0);
    let chip = chip(&sim, ChipConfig::default());
    sim.lock().unwrap().fail_bus = true;
    let err = chip.read_register(0x1e).unwrap_err();
    assert_eq!(err, IolinkError::Bus(ErrorKind::Other));
    assert!(err.is_recoverable());

    sim.lock().unwrap().fail_bus = false;
    assert!(chip.read_register(0x1e).is_ok());
}

#[test]
fn other_chip_address() {
    init_log();
    let sim = Simulator::new(1);
    let chip = Max14819::new(LogSink, Bus(sim.clone()), u2::new(3), Clock(sim.clone()));
    // the simulated chip does not answer to another address
    assert_eq!(chip.revision().unwrap(), 0);
    chip.write_register(0x1a, 0xff).unwrap();
    assert_eq!(sim.lock().unwrap().regs[0x1a], 0);
}

#[test]
fn port_before_init() {
    init_log();
    let sim = Simulator::new(0);
    let chip = chip(&sim, ChipConfig::default());
    assert_eq!(chip.get_port(Channel::A).err(), Some(IolinkError::InvalidChannel(Channel::A)));
    assert_eq!(chip.get_port(Channel::B).err(), Some(IolinkError::InvalidChannel(Channel::B)));
    assert!(chip.poll().iter().all(|step| step.is_err()));
}

#[test]
fn startup_sequence() {
    init_log();
    let sim = Simulator::new(0);
    let mut chip = chip(&sim, ChipConfig::default());
    chip.init_ports().unwrap();
    {
        let sim = sim.lock().unwrap();
        assert_eq!(sim.waits, vec![INIT_POWER_OFF_DELAY, INIT_BOOTUP_DELAY]);
        for channel in Channel::ALL {
            // devices powered, channels left inactive with the framer released and the CQ driver disabled
            assert_eq!(sim.regs[usize::from(registers::power_config.of(channel).address)] & 0x01, 0x01);
            assert_eq!(sim.regs[usize::from(registers::channel_status.of(channel).address)] & 0x40, 0);
            assert_eq!(sim.regs[usize::from(registers::cq_config.of(channel).address)] & 0x02, 0x02);
        }
        assert_ne!(sim.regs[usize::from(registers::interrupt_enable.address)] & 0x40, 0);
    }
    assert_eq!(chip.revision().unwrap(), 2);

    // a second call does nothing
    let transactions = sim.lock().unwrap().transactions;
    chip.init_ports().unwrap();
    assert_eq!(sim.lock().unwrap().transactions, transactions);
    assert_eq!(sim.lock().unwrap().waits.len(), 2);

    for channel in Channel::ALL {
        let port = chip.get_port(channel).unwrap();
        assert_eq!(port.channel(), channel);
        assert_eq!(port.state(), WakeUpState::Idle);
        assert_eq!(port.mode(), Mode::Inactive);
    }
}

#[test]
fn chip_status() {
    init_log();
    let sim = Simulator::new(0);
    let chip = ready(&sim, ChipConfig::default());
    assert!(! chip.status().unwrap().critical());

    let mut status = Status::default();
    status.set_thermal_shutdown(true);
    sim.lock().unwrap().regs[usize::from(registers::status.address)] = status.pack();
    let read = chip.status().unwrap();
    assert!(read.critical());
    assert!(read.thermal_shutdown());
}

#[test]
fn digital_modes() {
    init_log();
    let sim = Simulator::new(0);
    let chip = ready(&sim, ChipConfig::default());
    let port = chip.get_port(Channel::A).unwrap();
    let io = usize::from(registers::io_config.of(Channel::A).address);

    port.set_mode(Mode::DigitalInput(DiConfig {
        current: DiCurrent::Source,
        threshold: Threshold::Type2,
        filter: false,
    })).unwrap();
    assert_eq!(sim.lock().unwrap().regs[io], 0x02);
    assert_eq!(port.state(), WakeUpState::Idle);
    // framer released
    assert_eq!(sim.lock().unwrap().regs[usize::from(registers::channel_status.of(Channel::A).address)] & 0x40, 0);

    port.set_mode(Mode::DigitalInput(DiConfig::default())).unwrap();
    assert_eq!(sim.lock().unwrap().regs[io], 0x0d);
    sim.lock().unwrap().regs[io] |= 0x40;
    assert!(port.read_input().unwrap());

    port.set_mode(Mode::DigitalOutput).unwrap();
    assert_eq!(port.mode(), Mode::DigitalOutput);
    assert_eq!(sim.lock().unwrap().regs[io], 0x20);
    port.set_output(true).unwrap();
    assert_eq!(sim.lock().unwrap().regs[io], 0x30);
    port.set_output(false).unwrap();
    assert_eq!(sim.lock().unwrap().regs[io], 0x20);

    port.set_mode(Mode::Inactive).unwrap();
    assert_eq!(sim.lock().unwrap().regs[io], 0x00);
    // CQ driver disabled
    assert_eq!(sim.lock().unwrap().regs[usize::from(registers::cq_config.of(Channel::A).address)] & 0x02, 0x02);
}

#[test]
fn channel_diagnostics() {
    init_log();
    let sim = Simulator::new(0);
    let chip = ready(&sim, ChipConfig::default());
    sim.lock().unwrap().regs[usize::from(registers::channel_status.of(Channel::B).address)] |= 0x0a;
    let status = chip.get_port(Channel::B).unwrap().channel_status().unwrap();
    assert!(status.cq_fault());
    assert!(status.current_limit());
    assert!(! status.undervoltage());
    assert!(! chip.get_port(Channel::A).unwrap().channel_status().unwrap().cq_fault());
}

#[test]
fn release_on_drop() {
    init_log();
    let sim = Simulator::new(0);
    let chip = Max14819::new(LogSink, Bus(sim.clone()), u2::new(0), Clock(sim.clone()))
        .with_leds(NoPin, NoPin);
    // nothing is sent for a chip never initialized
    drop(chip);
    assert_eq!(sim.lock().unwrap().transactions, 0);

    let chip = ready(&sim, ChipConfig::default());
    drop(chip);
    let sim = sim.lock().unwrap();
    for channel in Channel::ALL {
        assert_eq!(sim.regs[usize::from(registers::power_config.of(channel).address)], 0);
        assert_eq!(sim.regs[usize::from(registers::cq_config.of(channel).address)], 0x02);
    }
}
