/*!
    structs and consts for every register of the MAX14819 transceiver. This should be used instead of any hardcoded register value.

    The goal of this file is to gather all the chip registers at one place, so what you see here is exactly what you can expect in the chip, no more, no less.

    Most registers exist once per channel, as a [RegisterPair] where the channel B register follows the channel A register. The others are shared by both channels.
*/
#![allow(non_upper_case_globals)]

use bilge::prelude::*;
use crate::data::{self, Register, RegisterPair, Channel};

/// highest register address
pub const MAX_REG: u8 = 0x1F;

/// FIFO data in/out, one byte per access
pub const tx_rx_data: RegisterPair<u8> = RegisterPair::new(0x00);
/// latched event flags, cleared on read
pub const interrupt: Register<Interrupt> = Register::new(0x02);
/// per-flag enable mask, same bit layout as [interrupt]
pub const interrupt_enable: Register<Interrupt> = Register::new(0x03);
/// number of bytes available in the receive FIFO
pub const rx_fifo_level: RegisterPair<u8> = RegisterPair::new(0x04);
pub const cq_control: RegisterPair<CqControl> = RegisterPair::new(0x06);
/// fault flags of the last transfer
pub const cq_error: RegisterPair<CqError> = RegisterPair::new(0x08);
pub const message_control: RegisterPair<MessageControl> = RegisterPair::new(0x0A);
pub const channel_status: RegisterPair<ChannelStatus> = RegisterPair::new(0x0C);
pub const led_control: Register<LedControl> = Register::new(0x0E);
pub const trigger: Register<Trigger> = Register::new(0x0F);
pub const cq_config: RegisterPair<CqConfig> = RegisterPair::new(0x10);
pub const cycle_timer: RegisterPair<CycleTimer> = RegisterPair::new(0x12);
pub const device_delay: RegisterPair<DeviceDelay> = RegisterPair::new(0x14);
pub const trigger_assign: RegisterPair<TriggerAssign> = RegisterPair::new(0x16);
/// L+ supply configuration
pub const power_config: RegisterPair<PowerConfig> = RegisterPair::new(0x18);
/// DI and CQ levels and SIO driver mode
pub const io_config: RegisterPair<IoConfig> = RegisterPair::new(0x1A);
pub const driver_current_limit: Register<DriverCurrentLimit> = Register::new(0x1C);
pub const clock: Register<Clock> = Register::new(0x1D);
/// chip-wide thermal and voltage status
pub const status: Register<Status> = Register::new(0x1E);
/// chip revision, read-only
pub const revision: Register<Revision> = Register::new(MAX_REG);


/// events flags, the same layout is used for [interrupt] and [interrupt_enable]
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct Interrupt {
    pub rx_ready_a: bool,
    pub rx_ready_b: bool,
    pub rx_error_a: bool,
    pub rx_error_b: bool,
    pub tx_error_a: bool,
    pub tx_error_b: bool,
    /// a wake-up request has been answered
    pub wurq: bool,
    /// a flag of [status] changed
    pub status_changed: bool,
}
data::bilge_register!(Interrupt);

impl Interrupt {
    pub fn rx_ready(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.rx_ready_a(),
            Channel::B => self.rx_ready_b(),
        }
    }
    pub fn rx_error(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.rx_error_a(),
            Channel::B => self.rx_error_b(),
        }
    }
    pub fn tx_error(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.tx_error_a(),
            Channel::B => self.tx_error_b(),
        }
    }
    /// remove the flags belonging to the given channel
    pub fn clear_channel(&mut self, channel: Channel) {
        match channel {
            Channel::A => {
                self.set_rx_ready_a(false);
                self.set_rx_error_a(false);
                self.set_tx_error_a(false);
            },
            Channel::B => {
                self.set_rx_ready_b(false);
                self.set_rx_error_b(false);
                self.set_tx_error_b(false);
            },
        }
    }
}

/// CQ line control: wake-up, FIFO management and transfer trigger
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct CqControl {
    /// start sending the content of the transmit FIFO, self clearing
    pub send: bool,
    /// send cyclically on the cycle timer
    pub cycle_timer_enable: bool,
    /// flush the receive FIFO, self clearing
    pub rx_fifo_reset: bool,
    /// flush the transmit FIFO, self clearing
    pub tx_fifo_reset: bool,
    /// emit a wake-up pulse on CQ, self clearing
    pub wakeup_pulse: bool,
    /// emit a wake-up pulse and detect the device communication rate, self clearing
    pub establish: bool,
    /// communication rate in use, updated by the chip after [Self::establish]
    pub com_speed: ComSpeed,
}
data::bilge_register!(CqControl);

/**
    IO-Link communication rates

    IO-Link devices support one only of these rates
*/
#[bitsize(2)]
#[derive(FromBits, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComSpeed {
    /// 4.8 kBd
    Com1 = 0,
    /// 38.4 kBd
    Com2 = 1,
    /// 230.4 kBd
    Com3 = 2,
    Reserved = 3,
}
impl Default for ComSpeed {
    fn default() -> Self  {Self::Com1}
}
impl ComSpeed {
    /// rate in baud, `None` for the reserved code
    pub fn baud(self) -> Option<u32> {
        match self {
            Self::Com1 => Some(4_800),
            Self::Com2 => Some(38_400),
            Self::Com3 => Some(230_400),
            Self::Reserved => None,
        }
    }
}

/// faults of the last transfer
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct CqError {
    pub parity: bool,
    pub frame: bool,
    pub rx_size: bool,
    pub rx_checksum: bool,
    pub tx_size: bool,
    pub tx_checksum: bool,
    pub cycle: bool,
    pub transmission: bool,
}
data::bilge_register!(CqError);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct MessageControl {
    pub invert_cq: bool,
    /// raise [Interrupt::rx_ready] only once a complete message is received
    pub rx_message_ready: bool,
    /// check the checksum of received messages
    pub rx_checksum: bool,
    /// keep the transmitted message in the FIFO for cyclic sending
    pub tx_keep_message: bool,
    pub tx_size: bool,
    /// compute and insert the checksum in sent messages
    pub insert_checksum: bool,
    pub spi_checksum: bool,
    /// drop the received message when a fault is detected
    pub tx_error_destroy: bool,
}
data::bilge_register!(MessageControl);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct ChannelStatus {
    reserved: u1,
    pub cq_fault: bool,
    /// L+ undervoltage
    pub undervoltage: bool,
    /// L+ current limit reached
    pub current_limit: bool,
    pub cq_fault_changed: bool,
    pub current_limit_changed: bool,
    pub framer_enable: bool,
    /// reset the chip
    pub reset: bool,
}
data::bilge_register!(ChannelStatus);

/// maps the two LEDs of each channel to status signals
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct LedControl {
    pub rx_ready_a: bool,
    pub led1_a: bool,
    pub rx_error_a: bool,
    pub led2_a: bool,
    pub rx_ready_b: bool,
    pub led1_b: bool,
    pub rx_error_b: bool,
    pub led2_b: bool,
}
data::bilge_register!(LedControl);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct Trigger {
    pub init: u4,
    reserved: u4,
}
data::bilge_register!(Trigger);

/// CQ output driver
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct CqConfig {
    pub filter: bool,
    pub driver_disable: bool,
    pub push_pull: bool,
    pub npn: bool,
    pub sink_select: u2,
    pub source_sink: bool,
    pub iec3_threshold: bool,
}
data::bilge_register!(CqConfig);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct CycleTimer {
    pub multiplier: u6,
    pub base: u2,
}
data::bilge_register!(CycleTimer);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct DeviceDelay {
    pub response_timer: bool,
    pub delay: u4,
    pub bit_delay: u2,
    pub delay_error: bool,
}
data::bilge_register!(DeviceDelay);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct TriggerAssign {
    pub enable: bool,
    reserved: u3,
    pub trigger_index: u4,
}
data::bilge_register!(TriggerAssign);

/// L+ supply of the device
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct PowerConfig {
    pub enable: bool,
    pub current_limit_disable: bool,
    pub current_limit_2x: bool,
    pub blanking: u2,
    pub dynamic_blanking: bool,
    pub retry: u2,
}
data::bilge_register!(PowerConfig);

/// SIO configuration and levels
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct IoConfig {
    /// DI current sink
    pub sink: bool,
    /// DI current source
    pub source: bool,
    /// DI type 1 threshold
    pub type1: bool,
    pub filter: bool,
    /// CQ output level when [Self::tx_enable]
    pub tx: bool,
    /// CQ driven by [Self::tx] instead of the framer
    pub tx_enable: bool,
    pub cq_level: bool,
    pub di_level: bool,
}
data::bilge_register!(IoConfig);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct DriverCurrentLimit {
    pub auto_retry: bool,
    pub retry_time: u2,
    pub blanking: u2,
    pub disable: bool,
    pub limit: u2,
}
data::bilge_register!(DriverCurrentLimit);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct Clock {
    pub crystal: bool,
    pub external: bool,
    pub divider: u2,
    pub output_enable: bool,
    pub external_missing: bool,
    pub txtxen_disable: bool,
    pub vcc_warning_enable: bool,
}
data::bilge_register!(Clock);

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct Status {
    pub vcc_warning: bool,
    pub vcc_undervoltage: bool,
    pub temperature_warning: bool,
    pub thermal_shutdown: bool,
    pub vcc_warning_changed: bool,
    pub vcc_undervoltage_changed: bool,
    pub temperature_warning_changed: bool,
    pub thermal_shutdown_changed: bool,
}
data::bilge_register!(Status);

impl Status {
    /// true if the chip is currently unable to drive its channels
    pub fn critical(&self) -> bool {
        self.thermal_shutdown() || self.vcc_undervoltage()
    }
}

#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct Revision {
    pub id: u4,
    reserved: u4,
}
data::bilge_register!(Revision);
