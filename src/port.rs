use std::sync::Mutex;
use crate::{
    chip::{Max14819, lock},
    data::Channel,
    registers::{self, ComSpeed, CqControl, CqConfig, IoConfig, MessageControl, ChannelStatus},
    framer::{FifoFrame, Message, TransferResult},
    error::{IolinkError, IolinkResult},
    };


/// (ms) time allowed to a device to answer the wake-up requests
pub const INIT_WURQ_TIMEOUT: u32 = 80;
/// (ms) time waited after each wake-up pulse before the next one: 2 retries after 10ms, then 3 tries every 20ms
pub const WURQ_RETRIES: [u32; 5] = [10, 10, 20, 20, 20];
const _: () = assert!(WURQ_RETRIES[0] + WURQ_RETRIES[1] + WURQ_RETRIES[2] + WURQ_RETRIES[3] + WURQ_RETRIES[4] == INIT_WURQ_TIMEOUT);


/**
    the operation mode of a channel, following the IO-Link master port modes

    - in SIO modes ([Self::DigitalInput], [Self::DigitalOutput]) the CQ line is a simple digital line
    - in communication modes ([Self::Startup], [Self::PreOperate], [Self::Operate]) the CQ line carries IO-Link messages, which needs the device to be woken up first
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// CQ driver disabled, nothing is sent to the device
    Inactive,
    DigitalInput(DiConfig),
    DigitalOutput,
    /// wake the device up and establish communication
    Startup,
    /// communication established, the device is being parameterized
    PreOperate,
    /// communication established, cyclic process data exchange
    Operate,
}
impl Mode {
    /// true if this mode carries IO-Link communication
    pub fn communicates(&self) -> bool {
        matches!(self, Self::Startup | Self::PreOperate | Self::Operate)
    }
}

/// input stage of the CQ line in [Mode::DigitalInput]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DiConfig {
    pub current: DiCurrent,
    pub threshold: Threshold,
    /// glitch filter
    pub filter: bool,
}
impl Default for DiConfig {
    fn default() -> Self {
        Self {
            current: DiCurrent::Sink,
            threshold: Threshold::Type1,
            filter: true,
        }
    }
}

/// load current of a digital input
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiCurrent {
    Disabled,
    Sink,
    Source,
}

/// switching levels of a digital input, see the IEC 61131-2 input types
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Threshold {
    Type1,
    Type2,
}

/// output stage of the CQ line
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CqDriver {
    PushPull,
    /// low-side switch only
    Npn,
    /// high-side switch only
    Pnp,
}

/// per-channel settings
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortConfig {
    /// communication rate to request, `None` lets the chip detect the device rate
    pub com_speed: Option<ComSpeed>,
    pub driver: CqDriver,
    /// the chip computes and inserts the checksum of sent messages
    pub insert_checksum: bool,
    /// the chip checks the checksum of received messages
    pub check_checksum: bool,
    /// the sent message stays in the FIFO for cyclic exchanges
    pub keep_message: bool,
    /// received messages with a fault are dropped by the chip
    pub destroy_on_error: bool,
}
impl Default for PortConfig {
    fn default() -> Self {
        Self {
            com_speed: None,
            driver: CqDriver::PushPull,
            insert_checksum: true,
            check_checksum: true,
            keep_message: false,
            destroy_on_error: true,
        }
    }
}
impl PortConfig {
    pub(crate) fn cq_config(&self, enabled: bool) -> CqConfig {
        let mut config = CqConfig::default();
        config.set_filter(true);
        config.set_driver_disable(! enabled);
        match self.driver {
            CqDriver::PushPull => config.set_push_pull(true),
            CqDriver::Npn => config.set_npn(true),
            CqDriver::Pnp => {},
        }
        config
    }
    pub(crate) fn message_control(&self) -> MessageControl {
        let mut control = MessageControl::default();
        control.set_rx_message_ready(true);
        control.set_insert_checksum(self.insert_checksum);
        control.set_rx_checksum(self.check_checksum);
        control.set_tx_keep_message(self.keep_message);
        control.set_tx_error_destroy(self.destroy_on_error);
        control
    }
}

/// communication rate negotiated with the device
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommunicationInfo {
    pub com_speed: ComSpeed,
    /// 0 if the rate is unknown
    pub com_speed_baud: u32,
}
impl From<ComSpeed> for CommunicationInfo {
    fn from(com_speed: ComSpeed) -> Self {
        Self {
            com_speed,
            com_speed_baud: com_speed.baud().unwrap_or(0),
        }
    }
}

/**
    progress of the wake-up sequence of a channel

    ```text
    Idle -> Pulsing <-> AwaitingResponse -> Established
                                         -> Failed -> Idle
    ```
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeUpState {
    /// framer disabled, no wake-up pulse driven
    Idle,
    /// a wake-up pulse has just been emitted
    Pulsing,
    /// waiting for the device to answer the last pulse
    AwaitingResponse,
    /// the device answered, messages can be exchanged
    Established,
    /// the device never answered, a new mode request restarts the sequence
    Failed,
}


/// protocol state of one channel, owned by the chip
pub(crate) struct PortState {
    pub(crate) config: PortConfig,
    state: WakeUpState,
    mode: Mode,
    info: CommunicationInfo,
    /// index of the current wake-up pulse in [WURQ_RETRIES]
    attempt: usize,
    /// (ms) waited since the current pulse
    elapsed: u32,
    /// a mode change came during the wake-up, it shall be restarted
    restart: bool,
    /// a wake-up is requested but the other channel is still waiting for its answer
    queued: bool,
}
impl PortState {
    pub(crate) fn new(config: PortConfig) -> Self {
        let info = CommunicationInfo::from(config.com_speed.unwrap_or(ComSpeed::Com1));
        Self {
            config,
            state: WakeUpState::Idle,
            mode: Mode::Inactive,
            info,
            attempt: 0,
            elapsed: 0,
            restart: false,
            queued: false,
        }
    }
    pub(crate) fn reset(&mut self) {
        self.state = WakeUpState::Idle;
        self.mode = Mode::Inactive;
        self.attempt = 0;
        self.elapsed = 0;
        self.restart = false;
        self.queued = false;
    }
}


/**
    controller of one channel of a [Max14819]

    Its lifetime refers to the chip it belongs to. Several instances can exist for the same channel, they all share the channel state kept by the chip, and their operations are executed one after the other.

    ## Example

    The following is a typical sequence for a device

    ```ignore
    let port = chip.get_port(Channel::A)?;
    port.set_mode(Mode::Operate)?;
    while port.poll()? != WakeUpState::Established {}
    let (answer, result) = port.send_iol_data(&request, 4)?;
    result.check()?;
    ```
*/
pub struct Port<'a> {
    chip: &'a Max14819,
    channel: Channel,
    state: &'a Mutex<PortState>,
}

impl<'a> Port<'a> {
    pub(crate) fn new(chip: &'a Max14819, channel: Channel, state: &'a Mutex<PortState>) -> Self {
        Self {chip, channel, state}
    }

    pub fn channel(&self) -> Channel  {self.channel}
    /// current progress of the wake-up sequence
    pub fn state(&self) -> WakeUpState  {lock(self.state).state}
    /// last requested mode
    pub fn mode(&self) -> Mode  {lock(self.state).mode}
    /// rate negotiated by the last successful wake-up, or the configured rate before
    pub fn communication_info(&self) -> CommunicationInfo  {lock(self.state).info}
    pub fn config(&self) -> PortConfig  {lock(self.state).config.clone()}
    /// true while a requested wake-up is not resolved yet, either in progress or waiting for the other channel
    pub fn pending(&self) -> bool {
        let state = lock(self.state);
        state.queued || matches!(state.state, WakeUpState::Pulsing | WakeUpState::AwaitingResponse)
    }

    /// change the channel settings, an established communication is kept
    pub fn set_config(&self, config: PortConfig) -> IolinkResult {
        let mut state = lock(self.state);
        self.chip.configure_channel(self.channel, &config)?;
        state.config = config;
        Ok(())
    }

    /**
        request a mode change

        - SIO modes and [Mode::Inactive] bring the channel back to [WakeUpState::Idle]
        - communication modes start the wake-up sequence from [WakeUpState::Idle] or [WakeUpState::Failed]. When already established, the new mode is only recorded. When a wake-up is in progress, it will be restarted once the current attempt resolves.

        The chip has a single wake-up answer flag for both channels, so only one channel can wake up at a time. A wake-up requested while the other channel waits for its answer is queued until that attempt resolves, see [Self::pending].

        The wake-up sequence then progresses with [Self::poll]
    */
    pub fn set_mode(&self, mode: Mode) -> IolinkResult {
        let mut state = lock(self.state);
        match mode {
            Mode::Inactive => self.idle(&mut state, mode, IoConfig::default(), false),
            Mode::DigitalInput(input) => {
                let mut io = IoConfig::default();
                match input.current {
                    DiCurrent::Disabled => {},
                    DiCurrent::Sink => io.set_sink(true),
                    DiCurrent::Source => io.set_source(true),
                }
                io.set_type1(input.threshold == Threshold::Type1);
                io.set_filter(input.filter);
                self.idle(&mut state, mode, io, false)
            },
            Mode::DigitalOutput => {
                let mut io = IoConfig::default();
                io.set_tx_enable(true);
                self.idle(&mut state, mode, io, true)
            },
            Mode::Startup | Mode::PreOperate | Mode::Operate => {
                state.mode = mode;
                match state.state {
                    WakeUpState::Established => {
                        log::debug!("channel {} already established, now in {:?}", self.channel, mode);
                        Ok(())
                    },
                    WakeUpState::Pulsing | WakeUpState::AwaitingResponse => {
                        state.restart = true;
                        Ok(())
                    },
                    WakeUpState::Idle | WakeUpState::Failed if state.queued => Ok(()),
                    WakeUpState::Idle | WakeUpState::Failed => {
                        // give the CQ line back to the framer
                        self.chip.write(registers::io_config.of(self.channel), IoConfig::default())?;
                        self.chip.write(registers::cq_config.of(self.channel), state.config.cq_config(true))?;
                        self.chip.modify(registers::channel_status.of(self.channel), |status| status.set_framer_enable(true))?;
                        self.start(&mut state)
                    },
                }
            },
        }
    }

    /**
        advance the wake-up sequence by one step, and return the channel state

        Each step checks whether the device answered, and either emits the next pulse or waits [crate::ChipConfig::poll_interval]. Once all the pulses of [WURQ_RETRIES] are left unanswered, the channel fails with [IolinkError::WakeUpTimeout].

        A queued wake-up starts as soon as the other channel is done with its own. Outside of a wake-up, nothing is done.
    */
    pub fn poll(&self) -> IolinkResult<WakeUpState> {
        let mut state = lock(self.state);
        if state.queued {
            self.start(&mut state)?;
            return Ok(state.state);
        }
        if ! matches!(state.state, WakeUpState::Pulsing | WakeUpState::AwaitingResponse)
            {return Ok(state.state)}
        state.state = WakeUpState::AwaitingResponse;

        let interrupts = self.chip.interrupts()?;
        if interrupts.wurq() {
            self.chip.acknowledge(|flags| flags.set_wurq(false));
            self.establish(&mut state)?;
        }
        else if state.elapsed >= WURQ_RETRIES[state.attempt] {
            state.attempt += 1;
            if state.attempt < WURQ_RETRIES.len() {
                self.pulse(&mut state)?;
            }
            else {
                self.fail(&mut state)?;
            }
        }
        else {
            let interval = self.chip.poll_interval();
            self.chip.wait(interval);
            state.elapsed += interval;
            return Ok(state.state);
        }

        // the attempt is resolved, restart it if the mode changed meanwhile
        if state.restart && matches!(state.state, WakeUpState::Established | WakeUpState::Failed) {
            log::debug!("channel {} restarts its wake-up for {:?}", self.channel, state.mode);
            self.start(&mut state)?;
        }
        match state.state {
            WakeUpState::Failed => Err(IolinkError::WakeUpTimeout(self.channel)),
            other => Ok(other),
        }
    }

    /**
        wake the device up and wait for the communication to be established

        this is blocking for at most [INIT_WURQ_TIMEOUT], or twice that when the other channel is waking up as well. The current communication mode is kept, or [Mode::Startup] is requested if the channel is in a SIO mode.
    */
    pub fn wake_up_request(&self) -> IolinkResult<CommunicationInfo> {
        let mode = match self.mode() {
            mode if mode.communicates() => mode,
            _ => Mode::Startup,
        };
        self.set_mode(mode)?;
        loop {
            match self.poll()? {
                WakeUpState::Established => return Ok(self.communication_info()),
                WakeUpState::Pulsing | WakeUpState::AwaitingResponse => continue,
                WakeUpState::Idle | WakeUpState::Failed if self.pending() => {
                    // the other channel shall resolve its own wake-up first
                    if let Some(owner) = self.chip.wakeup_owner().filter(|&owner| owner != self.channel) {
                        if let Err(err) = self.chip.get_port(owner)?.poll() {
                            log::debug!("channel {} while waiting for channel {}: {}", self.channel, owner, err);
                        }
                    }
                },
                WakeUpState::Idle | WakeUpState::Failed => return Err(IolinkError::NotEstablished(self.channel)),
            }
        }
    }

    /**
        send a message to the device and receive its answer

        - `data` is the message to send
        - `expected` is the number of bytes expected in the answer

        Returns the received bytes and the transfer result. Faults detected by the chip (checksum, parity ...) do not make this function fail, they are reported in the [TransferResult] along with the bytes received so far, it is up to the caller to retry, reset the channel or abandon.

        It fails with [IolinkError::TransferTimeout] if the answer is not complete in the time budget given by [FifoFrame::time_budget], the channel stays established and the transfer can be retried.
    */
    pub fn send_iol_data(&self, data: &[u8], expected: usize) -> IolinkResult<(Message, TransferResult)> {
        let frame = FifoFrame::new(data, expected)?;
        let state = lock(self.state);
        if state.state != WakeUpState::Established
            {return Err(IolinkError::NotEstablished(self.channel))}
        let channel = self.channel;

        // start from empty FIFOs and no pending error
        self.chip.write(registers::cq_control.of(channel), {
            let mut control = CqControl::default();
            control.set_com_speed(state.info.com_speed);
            control.set_tx_fifo_reset(true);
            control.set_rx_fifo_reset(true);
            control
        })?;
        self.chip.interrupts()?;
        self.chip.acknowledge(|flags| flags.clear_channel(channel));

        for byte in frame.bytes() {
            self.chip.write(registers::tx_rx_data.of(channel), byte)?;
        }
        self.chip.write(registers::cq_control.of(channel), {
            let mut control = CqControl::default();
            control.set_com_speed(state.info.com_speed);
            control.set_send(true);
            control
        })?;

        let budget = frame.time_budget(&state.info);
        let interval = self.chip.poll_interval();
        let mut received = Message::new();
        let mut elapsed = 0;
        while received.len() < frame.expected() {
            let available = usize::from(self.chip.read(registers::rx_fifo_level.of(channel))?);
            for _ in 0 .. available.min(frame.expected() - received.len()) {
                let byte = self.chip.read(registers::tx_rx_data.of(channel))?;
                received.push(byte)
                    .map_err(|_| IolinkError::InvalidLength(frame.expected()))?;
            }
            if received.len() >= frame.expected()  {break}

            let interrupts = self.chip.interrupts()?;
            if interrupts.rx_error(channel) || interrupts.tx_error(channel) {
                self.chip.acknowledge(|flags| flags.clear_channel(channel));
                break
            }
            if elapsed >= budget {
                log::warn!("channel {} received {} of {} bytes in {} ms", channel, received.len(), frame.expected(), elapsed);
                return Err(IolinkError::TransferTimeout {
                    channel,
                    expected: frame.expected(),
                    received: received.len(),
                });
            }
            self.chip.wait(interval);
            elapsed += interval;
        }

        let errors = self.chip.read(registers::cq_error.of(channel))?;
        let result = TransferResult::decode(errors, received.len(), frame.expected());
        if ! result.success {
            log::warn!("channel {} transfer failed with {:?}, {} of {} bytes received", channel, errors, received.len(), frame.expected());
        }
        Ok((received, result))
    }

    /// set the CQ line level, effective in [Mode::DigitalOutput] only
    pub fn set_output(&self, level: bool) -> IolinkResult {
        let _state = lock(self.state);
        self.chip.modify(registers::io_config.of(self.channel), |io| io.set_tx(level))?;
        Ok(())
    }
    /// current level of the CQ line
    pub fn read_input(&self) -> IolinkResult<bool> {
        Ok(self.chip.read(registers::io_config.of(self.channel))?.cq_level())
    }
    /// faults of the CQ line and the device supply
    pub fn channel_status(&self) -> IolinkResult<ChannelStatus> {
        self.chip.read(registers::channel_status.of(self.channel))
    }

    /// leave any communication and configure the CQ line for SIO
    fn idle(&self, state: &mut PortState, mode: Mode, io: IoConfig, driver: bool) -> IolinkResult {
        let channel = self.channel;
        self.chip.write(registers::cq_control.of(channel), CqControl::default())?;
        self.chip.modify(registers::channel_status.of(channel), |status| status.set_framer_enable(false))?;
        self.chip.write(registers::cq_config.of(channel), state.config.cq_config(driver))?;
        self.chip.write(registers::io_config.of(channel), io)?;
        state.reset();
        state.mode = mode;
        self.chip.report(channel, WakeUpState::Idle);
        Ok(())
    }

    /// begin a new wake-up sequence
    fn start(&self, state: &mut PortState) -> IolinkResult {
        if ! self.chip.claim_wakeup(self.channel) {
            if ! state.queued {
                log::debug!("channel {} wake-up queued behind channel {:?}", self.channel, self.chip.wakeup_owner());
            }
            state.queued = true;
            return Ok(());
        }
        state.queued = false;
        // an answer to a former sequence must not be taken for this one
        self.chip.interrupts()?;
        self.chip.acknowledge(|flags| flags.set_wurq(false));
        state.attempt = 0;
        state.restart = false;
        self.pulse(state)
    }

    /// emit a wake-up pulse and restart the response timer
    fn pulse(&self, state: &mut PortState) -> IolinkResult {
        let mut control = CqControl::default();
        control.set_wakeup_pulse(true);
        match state.config.com_speed {
            Some(speed) => control.set_com_speed(speed),
            None => control.set_establish(true),
        }
        self.chip.write(registers::cq_control.of(self.channel), control)?;
        log::debug!("channel {} wake-up pulse {}", self.channel, state.attempt + 1);
        state.state = WakeUpState::Pulsing;
        state.elapsed = 0;
        self.chip.report(self.channel, WakeUpState::Pulsing);
        Ok(())
    }

    /// the device answered, record the rate it communicates at
    fn establish(&self, state: &mut PortState) -> IolinkResult {
        let control = self.chip.read(registers::cq_control.of(self.channel))?;
        let info = CommunicationInfo::from(control.com_speed());
        if info.com_speed_baud == 0 {
            log::warn!("channel {} reports an undefined communication rate", self.channel);
        }
        state.info = info;
        state.state = WakeUpState::Established;
        log::info!("channel {} established at {} baud after {} pulses", self.channel, info.com_speed_baud, state.attempt + 1);
        self.chip.print(&format!("channel {} established, {:?}", self.channel, info.com_speed));
        self.chip.report(self.channel, WakeUpState::Established);
        Ok(())
    }

    /// no answer to any pulse
    fn fail(&self, state: &mut PortState) -> IolinkResult {
        self.chip.write(registers::cq_control.of(self.channel), CqControl::default())?;
        state.state = WakeUpState::Failed;
        log::warn!("channel {}: no answer to wake-up after {} ms", self.channel, INIT_WURQ_TIMEOUT);
        self.chip.print(&format!("channel {} WURQ timeout", self.channel));
        self.chip.report(self.channel, WakeUpState::Failed);
        Ok(())
    }
}
