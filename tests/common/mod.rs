//! simulated MAX14819 and hardware primitives shared by the integration tests

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    };
use embedded_hal::spi::ErrorKind;
use bilge::prelude::u2;
use iolinkage::{
    Max14819, ChipConfig, Channel, ComSpeed, RegisterData,
    hal::{Pin, Spi, Wait, DebugOut},
    registers::{self, CqError},
    };

const REVISION: u8 = 0x02;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// how a simulated device answers a message
#[derive(Copy, Clone, Debug)]
pub enum Reply {
    /// sends back the message bytes, as many as expected
    Echo,
    /// never answers
    Silent,
    /// sends back at most the given number of bytes
    Truncate(usize),
}

/// IO-Link device attached to a simulated channel
#[derive(Clone, Debug)]
pub struct Device {
    /// rate the device communicates at
    pub speed: ComSpeed,
    /// number of wake-up pulses before the device answers, 0 for never
    pub answers_after: u32,
    pub reply: Reply,
    pulses: u32,
}
impl Device {
    pub fn new(speed: ComSpeed, answers_after: u32, reply: Reply) -> Self {
        Self {speed, answers_after, reply, pulses: 0}
    }
}

/// register-level model of the chip, with its FIFOs and attached devices
pub struct Simulator {
    /// chip address this simulator answers to
    pub address: u8,
    pub regs: [u8; 32],
    pub tx: [VecDeque<u8>; 2],
    pub rx: [VecDeque<u8>; 2],
    /// last content of the transmit FIFO sent by each channel
    pub sent: [Vec<u8>; 2],
    pub devices: [Option<Device>; 2],
    /// transfer faults the chip reports on the next transfers of each channel
    pub faults: [CqError; 2],
    /// (ms) simulated time
    pub now: u32,
    pub waits: Vec<u32>,
    /// every wake-up pulse emitted, with its time
    pub pulses: Vec<(Channel, u32)>,
    /// number of SPI transactions issued
    pub transactions: usize,
    /// next transactions fail on the bus
    pub fail_bus: bool,
}

impl Simulator {
    pub fn new(address: u8) -> Arc<Mutex<Self>> {
        let mut regs = [0; 32];
        regs[usize::from(registers::MAX_REG)] = REVISION;
        Arc::new(Mutex::new(Self {
            address,
            regs,
            tx: Default::default(),
            rx: Default::default(),
            sent: Default::default(),
            devices: [None, None],
            faults: [CqError::default(); 2],
            now: 0,
            waits: Vec::new(),
            pulses: Vec::new(),
            transactions: 0,
            fail_bus: false,
        }))
    }

    /// content of the registers and FIFOs belonging to one channel
    pub fn bank(&self, channel: Channel) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let pairs = [
            registers::tx_rx_data.address,
            registers::rx_fifo_level.address,
            registers::cq_control.address,
            registers::cq_error.address,
            registers::message_control.address,
            registers::channel_status.address,
            registers::cq_config.address,
            registers::cycle_timer.address,
            registers::device_delay.address,
            registers::trigger_assign.address,
            registers::power_config.address,
            registers::io_config.address,
            ];
        (
            pairs.iter().map(|pair| self.regs[usize::from(pair + channel.offset())]).collect(),
            self.tx[channel.index()].iter().copied().collect(),
            self.rx[channel.index()].iter().copied().collect(),
        )
    }

    /// pulses emitted on a channel, in ms relative to the given time
    pub fn pulses_since(&self, channel: Channel, start: u32) -> Vec<u32> {
        self.pulses.iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, t)| t - start)
            .collect()
    }

    fn read(&mut self, address: u8) -> u8 {
        let index = usize::from(address);
        match address {
            0x00 | 0x01 => {
                let channel = usize::from(address);
                let byte = self.rx[channel].pop_front().unwrap_or(0);
                self.regs[usize::from(registers::rx_fifo_level.address) + channel] = self.rx[channel].len() as u8;
                byte
            },
            // clear on read
            0x02 | 0x08 | 0x09 => std::mem::take(&mut self.regs[index]),
            _ => self.regs[index],
        }
    }

    fn write(&mut self, address: u8, value: u8) {
        let index = usize::from(address);
        match address {
            0x00 | 0x01 => self.tx[index].push_back(value),
            0x06 | 0x07 => self.control(index - 0x06, value),
            0x0C | 0x0D => {
                if value & 0x80 != 0 {
                    self.reset();
                }
                self.regs[index] = value & 0x7f;
            },
            // read only
            0x02 | 0x04 | 0x05 | 0x1F => {},
            _ => self.regs[index] = value,
        }
    }

    fn reset(&mut self) {
        self.regs = [0; 32];
        self.regs[usize::from(registers::MAX_REG)] = REVISION;
        for fifo in self.tx.iter_mut().chain(self.rx.iter_mut()) {
            fifo.clear();
        }
    }

    fn control(&mut self, channel: usize, value: u8) {
        let level = usize::from(registers::rx_fifo_level.address) + channel;
        let error = usize::from(registers::cq_error.address) + channel;
        let interrupt = usize::from(registers::interrupt.address);
        // self clearing bits are not stored
        let mut stored = value & 0xc2;

        if value & 0x08 != 0 {
            self.tx[channel].clear();
        }
        if value & 0x04 != 0 {
            self.rx[channel].clear();
            self.regs[level] = 0;
        }
        if value & 0x30 != 0 {
            let now = self.now;
            self.pulses.push((Channel::ALL[channel], now));
            if let Some(device) = &mut self.devices[channel] {
                device.pulses += 1;
                if device.answers_after != 0 && device.pulses >= device.answers_after {
                    self.regs[interrupt] |= 0x40;
                    if value & 0x20 != 0 {
                        stored = (stored & 0x3f) | ((device.speed as u8) << 6);
                    }
                }
            }
        }
        if value & 0x01 != 0 {
            let frame: Vec<u8> = self.tx[channel].drain(..).collect();
            self.sent[channel] = frame.clone();
            if let (Some(device), [expected, len, data @ ..]) = (&self.devices[channel], frame.as_slice()) {
                let expected = usize::from(*expected);
                let data = &data[.. usize::from(*len).min(data.len())];
                let answer = match device.reply {
                    Reply::Echo => expected,
                    Reply::Silent => 0,
                    Reply::Truncate(count) => count.min(expected),
                };
                for i in 0 .. answer {
                    self.rx[channel].push_back(data.get(i).copied().unwrap_or(0));
                }
                self.regs[level] = self.rx[channel].len() as u8;
                if answer != 0 {
                    self.regs[interrupt] |= 0x01 << channel;
                }
                let fault = self.faults[channel].pack();
                self.regs[error] = fault;
                if fault != 0 {
                    self.regs[interrupt] |= 0x04 << channel;
                }
            }
        }
        self.regs[0x06 + channel] = stored;
    }
}

/// SPI bus reaching the simulator
pub struct Bus(pub Arc<Mutex<Simulator>>);
impl Spi for Bus {
    fn exchange(&mut self, data: &mut [u8]) -> Result<(), ErrorKind> {
        let mut sim = self.0.lock().unwrap();
        sim.transactions += 1;
        if sim.fail_bus  {return Err(ErrorKind::Other)}
        assert_eq!(data.len(), 2, "every transaction is 2 bytes");

        let read = data[0] & 0x80 != 0;
        let chip = (data[0] >> 5) & 0b11;
        let address = data[0] & 0x1f;
        if chip != sim.address {
            data[1] = 0;
        }
        else if read {
            data[1] = sim.read(address);
        }
        else {
            let value = data[1];
            sim.write(address, value);
        }
        Ok(())
    }
}

/// delay advancing the simulated time
pub struct Clock(pub Arc<Mutex<Simulator>>);
impl Wait for Clock {
    fn wait(&mut self, ms: u32) {
        let mut sim = self.0.lock().unwrap();
        sim.now += ms;
        sim.waits.push(ms);
    }
}

/// text sink keeping the lines
#[derive(Clone, Default)]
pub struct Sink(pub Arc<Mutex<Vec<String>>>);
impl DebugOut for Sink {
    fn write(&mut self, line: &str) {
        self.0.lock().unwrap().push(line.to_owned());
    }
}

/// LED keeping its level
#[derive(Clone, Default)]
pub struct Led(pub Arc<Mutex<bool>>);
impl Led {
    pub fn lit(&self) -> bool  {*self.0.lock().unwrap()}
}
impl Pin for Led {
    fn set(&mut self, level: bool) {
        *self.0.lock().unwrap() = level;
    }
}

/// SPI stub storing registers with no other behavior, and recording every transaction
#[derive(Clone, Default)]
pub struct Loopback {
    pub regs: Arc<Mutex<[u8; 32]>>,
    pub frames: Arc<Mutex<Vec<[u8; 2]>>>,
}
impl Spi for Loopback {
    fn exchange(&mut self, data: &mut [u8]) -> Result<(), ErrorKind> {
        self.frames.lock().unwrap().push([data[0], data[1]]);
        let mut regs = self.regs.lock().unwrap();
        let address = usize::from(data[0] & 0x1f);
        if data[0] & 0x80 != 0 {
            data[1] = regs[address];
        }
        else {
            regs[address] = data[1];
        }
        Ok(())
    }
}

/// chip on the simulator, not yet initialized
pub fn chip(sim: &Arc<Mutex<Simulator>>, config: ChipConfig) -> Max14819 {
    let address = sim.lock().unwrap().address;
    Max14819::new(Sink::default(), Bus(sim.clone()), u2::new(address), Clock(sim.clone()))
        .with_config(config)
}

/// initialized chip on the simulator
pub fn ready(sim: &Arc<Mutex<Simulator>>, config: ChipConfig) -> Max14819 {
    let mut chip = chip(sim, config);
    chip.init_ports().unwrap();
    chip
}
