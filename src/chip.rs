/*!
    The MAX14819 chip itself: it owns the hardware resources and is the only one issuing SPI transactions.

    Every register access is one SPI transaction of two bytes, a [Command] byte followed by the register content. The SPI primitive is locked for each transaction, so the two channels can be driven in any interleaving without their transactions ever overlapping.
*/

use std::sync::{Mutex, MutexGuard, PoisonError};
use bilge::prelude::*;
use crate::{
    hal::{Pin, Spi, Wait, DebugOut, NoPin},
    data::{Register, RegisterData, Command, Channel},
    registers::{self, Interrupt, ChannelStatus, Clock, LedControl, DriverCurrentLimit, PowerConfig, CqConfig, Status},
    port::{Port, PortState, PortConfig, Mode, WakeUpState},
    error::{IolinkError, IolinkResult},
    };

/// (ms) the devices are kept unpowered this long at startup, so that they restart from scratch
pub const INIT_POWER_OFF_DELAY: u32 = 1000;
/// (ms) delay after the switch-to-operational command, before the oscillator can be relied on
pub const INIT_BOOTUP_DELAY: u32 = 300;
/// (ms) default granularity of the polling loops
pub const POLL_INTERVAL: u32 = 1;

/// oscillator feeding the chip
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockSource {
    Crystal,
    External,
}

/// chip-wide settings, applied by [Max14819::init_ports] and after every [Max14819::reset]
#[derive(Clone, Debug)]
pub struct ChipConfig {
    /// (ms) see [INIT_POWER_OFF_DELAY]
    pub power_off_delay: u32,
    /// (ms) see [INIT_BOOTUP_DELAY]
    pub bootup_delay: u32,
    /// (ms) see [POLL_INTERVAL]
    pub poll_interval: u32,
    pub clock: ClockSource,
    /// let the chip drive its per-channel LEDs with the receive ready and receive error signals
    pub channel_leds: bool,
    /// initial configuration of each channel
    pub ports: [PortConfig; 2],
}
impl Default for ChipConfig {
    fn default() -> Self {
        Self {
            power_off_delay: INIT_POWER_OFF_DELAY,
            bootup_delay: INIT_BOOTUP_DELAY,
            poll_interval: POLL_INTERVAL,
            clock: ClockSource::Crystal,
            channel_leds: true,
            ports: Default::default(),
        }
    }
}

/**
    driver of one MAX14819 chip on a SPI bus

    ## Example

    ```ignore
    let mut chip = Max14819::new(LogSink, spi, u2::new(0), delay);
    chip.init_ports()?;
    let port = chip.get_port(Channel::A)?;
    port.wake_up_request()?;
    let (answer, result) = port.send_iol_data(&[0xa2, 0x00], 2)?;
    ```
*/
pub struct Max14819 {
    /// chip address on the bus, set by its A0 A1 pins
    address: u2,
    config: ChipConfig,

    spi: Mutex<Box<dyn Spi + Send>>,
    wait: Mutex<Box<dyn Wait + Send>>,
    debug: Mutex<Box<dyn DebugOut + Send>>,
    leds: Mutex<Leds>,
    /// interrupt flags read from the chip but not yet consumed, the register is cleared on read
    interrupts: Mutex<Interrupt>,
    /// channel currently waiting for a wake-up answer, the WURQ flag is shared by both channels
    wakeup: Mutex<Option<Channel>>,

    ports: Option<[Mutex<PortState>; 2]>,
}

struct Leds {
    status: Box<dyn Pin + Send>,
    error: Box<dyn Pin + Send>,
    states: [WakeUpState; 2],
}

/// lock a mutex, a panic in another holder does not compromise the register state so poisoning is ignored
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Max14819 {
    /// driver for the chip at the given address, nothing is sent to the chip before [Self::init_ports]
    pub fn new<O, S, W>(debug: O, spi: S, address: u2, wait: W) -> Self
    where
        O: DebugOut + Send + 'static,
        S: Spi + Send + 'static,
        W: Wait + Send + 'static,
    {
        Self {
            address,
            config: ChipConfig::default(),
            spi: Mutex::new(Box::new(spi)),
            wait: Mutex::new(Box::new(wait)),
            debug: Mutex::new(Box::new(debug)),
            leds: Mutex::new(Leds {
                status: Box::new(NoPin),
                error: Box::new(NoPin),
                states: [WakeUpState::Idle; 2],
            }),
            interrupts: Mutex::new(Interrupt::default()),
            wakeup: Mutex::new(None),
            ports: None,
        }
    }
    /// replace the default settings, this must be done before [Self::init_ports]
    pub fn with_config(mut self, config: ChipConfig) -> Self {
        self.config = config;
        self
    }
    /// status LED is lit while a channel is established, error LED while a channel failed to wake up
    pub fn with_leds<P, Q>(mut self, status: P, error: Q) -> Self
    where
        P: Pin + Send + 'static,
        Q: Pin + Send + 'static,
    {
        self.leds = Mutex::new(Leds {
            status: Box::new(status),
            error: Box::new(error),
            states: [WakeUpState::Idle; 2],
        });
        self
    }

    pub fn address(&self) -> u2  {self.address}
    pub fn config(&self) -> &ChipConfig  {&self.config}

    /**
        bring the chip up and create the two channels

        The startup sequence is performed only once per chip instance, further calls do nothing:
        - reset the chip
        - cut the devices power for [ChipConfig::power_off_delay]
        - configure the clock, interrupts, LEDs and drivers, and power the devices
        - wait [ChipConfig::bootup_delay] for the oscillator to settle
        - leave both channels [Mode::Inactive]
    */
    pub fn init_ports(&mut self) -> IolinkResult {
        if self.ports.is_some()  {return Ok(())}
        self.print("init MAX14819");

        self.reset_chip()?;
        for channel in Channel::ALL {
            self.write(registers::power_config.of(channel), PowerConfig::default())?;
        }
        self.wait(self.config.power_off_delay);

        self.configure()?;
        for channel in Channel::ALL {
            self.configure_channel(channel, &self.config.ports[channel.index()])?;
        }
        self.wait(self.config.bootup_delay);

        let revision = self.revision()?;
        log::info!("MAX14819 revision {} ready at address {}", revision, self.address.value());
        self.print(&format!("MAX14819 revision {} ready", revision));

        let ports = self.config.ports.clone();
        self.ports = Some(ports.map(|config| Mutex::new(PortState::new(config))));
        for channel in Channel::ALL {
            self.get_port(channel)?.set_mode(Mode::Inactive)?;
        }
        Ok(())
    }

    /// the controller of the given channel, it fails if [Self::init_ports] has not been called yet
    pub fn get_port(&self, channel: Channel) -> IolinkResult<Port<'_>> {
        let ports = self.ports.as_ref().ok_or(IolinkError::InvalidChannel(channel))?;
        Ok(Port::new(self, channel, &ports[channel.index()]))
    }

    /**
        advance both channels by one step, see [Port::poll]

        a failure on one channel has no effect on the other
    */
    pub fn poll(&self) -> [IolinkResult<WakeUpState>; 2] {
        Channel::ALL.map(|channel| self.get_port(channel).and_then(|port| port.poll()))
    }

    /**
        reset the chip, then restore the framers and the configuration

        every channel goes back to [Mode::Inactive] in [WakeUpState::Idle] and has to be woken up again
    */
    pub fn reset(&self) -> IolinkResult {
        log::info!("reset MAX14819");
        self.reset_chip()?;
        self.configure()?;
        *lock(&self.interrupts) = Interrupt::default();
        *lock(&self.wakeup) = None;
        if let Some(ports) = &self.ports {
            for channel in Channel::ALL {
                let config = lock(&ports[channel.index()]).config.clone();
                self.configure_channel(channel, &config)?;
                Port::new(self, channel, &ports[channel.index()]).set_mode(Mode::Inactive)?;
            }
        }
        Ok(())
    }

    /// chip revision identifier
    pub fn revision(&self) -> IolinkResult<u8> {
        Ok(self.read(registers::revision)?.id().value())
    }
    /// chip-wide thermal and voltage status
    pub fn status(&self) -> IolinkResult<Status> {
        let status = self.read(registers::status)?;
        self.acknowledge(|flags| flags.set_status_changed(false));
        if status.critical() {
            log::warn!("MAX14819 status: {:?}", status);
        }
        Ok(status)
    }

    /// write one register in one SPI transaction
    pub fn write_register(&self, register: u8, data: u8) -> IolinkResult {
        let command = Command::encode(self.address, register, false)
            .ok_or(IolinkError::InvalidRegister(register))?;
        let mut frame = [command, data];
        lock(&self.spi).exchange(&mut frame)?;
        log::trace!("write 0x{:02x} <- 0x{:02x}", register, data);
        Ok(())
    }
    /// read one register in one SPI transaction
    pub fn read_register(&self, register: u8) -> IolinkResult<u8> {
        let command = Command::encode(self.address, register, true)
            .ok_or(IolinkError::InvalidRegister(register))?;
        let mut frame = [command, 0];
        lock(&self.spi).exchange(&mut frame)?;
        log::trace!("read 0x{:02x} -> 0x{:02x}", register, frame[1]);
        Ok(frame[1])
    }
    /// read a register and decode its content
    pub fn read<T: RegisterData>(&self, register: Register<T>) -> IolinkResult<T> {
        Ok(T::unpack(self.read_register(register.address)?))
    }
    /// encode and write a register content
    pub fn write<T: RegisterData>(&self, register: Register<T>, value: T) -> IolinkResult {
        self.write_register(register.address, value.pack())
    }
    /// read a register, change it and write it back, the written value is returned
    pub fn modify<T: RegisterData>(&self, register: Register<T>, change: impl FnOnce(&mut T)) -> IolinkResult<T> {
        let mut value = self.read(register)?;
        change(&mut value);
        self.write(register, value)?;
        Ok(value)
    }

    /// latched interrupt flags, including flags read before but not yet acknowledged
    pub(crate) fn interrupts(&self) -> IolinkResult<Interrupt> {
        let fresh = self.read(registers::interrupt)?;
        let mut pending = lock(&self.interrupts);
        *pending = Interrupt::unpack(pending.pack() | fresh.pack());
        Ok(*pending)
    }
    /// consume interrupt flags
    pub(crate) fn acknowledge(&self, consume: impl FnOnce(&mut Interrupt)) {
        consume(&mut lock(&self.interrupts));
    }

    pub(crate) fn wait(&self, ms: u32) {
        lock(&self.wait).wait(ms);
    }
    pub(crate) fn poll_interval(&self) -> u32  {self.config.poll_interval.max(1)}
    pub(crate) fn print(&self, line: &str) {
        lock(&self.debug).write(line);
    }
    /**
        reserve the WURQ flag for the wake-up of the given channel

        returns false if the other channel is already waiting for an answer, the reservation ends once the channel reports any state but [WakeUpState::Pulsing]
    */
    pub(crate) fn claim_wakeup(&self, channel: Channel) -> bool {
        let mut owner = lock(&self.wakeup);
        match *owner {
            Some(other) if other != channel => false,
            _ => {
                *owner = Some(channel);
                true
            },
        }
    }
    /// channel currently waiting for a wake-up answer
    pub(crate) fn wakeup_owner(&self) -> Option<Channel> {
        *lock(&self.wakeup)
    }

    /// record the new state of a channel and update the LEDs
    pub(crate) fn report(&self, channel: Channel, state: WakeUpState) {
        if state != WakeUpState::Pulsing {
            let mut owner = lock(&self.wakeup);
            if *owner == Some(channel) {
                *owner = None;
            }
        }
        let mut leds = lock(&self.leds);
        leds.states[channel.index()] = state;
        let established = leds.states.contains(&WakeUpState::Established);
        let failed = leds.states.contains(&WakeUpState::Failed);
        leds.status.set(established);
        leds.error.set(failed);
    }

    /// assert the reset bit of both channels, then enable both framers again
    fn reset_chip(&self) -> IolinkResult {
        for channel in Channel::ALL {
            let mut status = ChannelStatus::default();
            status.set_reset(true);
            self.write(registers::channel_status.of(channel), status)?;
        }
        for channel in Channel::ALL {
            let mut status = ChannelStatus::default();
            status.set_framer_enable(true);
            self.write(registers::channel_status.of(channel), status)?;
        }
        Ok(())
    }

    /// chip-wide configuration
    fn configure(&self) -> IolinkResult {
        self.write(registers::clock, {
            let mut clock = Clock::default();
            match self.config.clock {
                ClockSource::Crystal => clock.set_crystal(true),
                ClockSource::External => clock.set_external(true),
            }
            clock.set_txtxen_disable(true);
            clock.set_vcc_warning_enable(true);
            clock
        })?;
        self.write(registers::interrupt_enable, {
            let mut enable = Interrupt::default();
            enable.set_wurq(true);
            enable.set_status_changed(true);
            enable.set_rx_error_a(true);
            enable.set_rx_error_b(true);
            enable.set_tx_error_a(true);
            enable.set_tx_error_b(true);
            enable
        })?;
        self.write(registers::led_control, {
            let mut leds = LedControl::default();
            if self.config.channel_leds {
                leds.set_rx_ready_a(true);
                leds.set_rx_error_a(true);
                leds.set_rx_ready_b(true);
                leds.set_rx_error_b(true);
            }
            leds
        })?;
        self.write(registers::driver_current_limit, {
            let mut limit = DriverCurrentLimit::default();
            limit.set_limit(u2::new(1));
            limit.set_auto_retry(true);
            limit.set_retry_time(u2::new(1));
            limit
        })?;
        Ok(())
    }

    /// per-channel configuration, this also powers the device
    pub(crate) fn configure_channel(&self, channel: Channel, config: &PortConfig) -> IolinkResult {
        self.write(registers::cq_config.of(channel), config.cq_config(true))?;
        self.write(registers::message_control.of(channel), config.message_control())?;
        self.write(registers::power_config.of(channel), {
            let mut power = PowerConfig::default();
            power.set_enable(true);
            power.set_blanking(u2::new(1));
            power.set_retry(u2::new(1));
            power
        })?;
        Ok(())
    }
}

impl Drop for Max14819 {
    fn drop(&mut self) {
        if self.ports.is_none()  {return}
        // leave the CQ drivers and the device supplies off
        for channel in Channel::ALL {
            let mut driver = CqConfig::default();
            driver.set_driver_disable(true);
            let released = self.write(registers::cq_config.of(channel), driver)
                .and_then(|_| self.write(registers::power_config.of(channel), PowerConfig::default()));
            if let Err(err) = released {
                log::warn!("cannot release channel {}: {}", channel, err);
            }
        }
        let mut leds = lock(&self.leds);
        leds.status.set(false);
        leds.error.set(false);
        log::info!("deinit MAX14819");
    }
}
