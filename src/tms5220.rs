// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use alloc::boxed::Box;

use log::{debug, trace, warn};

use super::clock::{self, CYCLES_PER_SAMPLE};
use super::control::{
    status_byte, BusAccess, BusInterface, Command, Strobe, StrobeEdge, TalkState,
};
use super::dac::OutputPin;
use super::data::Coefficients;
use super::excitation::{Excitation, ExcitationGenerator};
use super::fifo::{Fifo, FIFO_SIZE};
use super::frame::{self, FrameKind, FrameParameters, FrameSource};
use super::interpolator::{
    Interpolator, Parameters, RATE_RELOAD, SAMPLES_PER_FRAME, SAMPLES_PER_PERIOD,
};
use super::lattice::{wrap_output, LatticeFilter};
use super::vsm::{MemoryLink, SpeechMemory};
use super::{ChipVariant, ConfigError};

/// Default clock frequency: 640 kHz, 8 kHz output.
const DEFAULT_CLOCK_FREQ: u32 = clock::TMS5220_8KHZ;
/// Rate register bit selecting a 2-bit rate field ahead of every frame.
const RATE_VARIABLE: u8 = 0x04;
/// Filter output while not talking.
const IDLE_OUTPUT: i16 = -1;
/// Settling margin added to the READY estimate.
const READY_MARGIN: u32 = 8;

type LineHandler = Box<dyn FnMut(bool)>;

/// Complete chip state for save/restore.
///
/// Covers everything except the attached speech memory's own state and the
/// line handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// Speech data FIFO.
    pub fifo: Fifo,
    /// Current parameters and timing counters.
    pub interpolator: Interpolator,
    /// Pitch counter, noise register and previous energy.
    pub excitation: ExcitationGenerator,
    /// Lattice filter delay line.
    pub filter: LatticeFilter,
    /// Strobe timing and bus latches.
    pub bus: BusInterface,
    /// SPEN, TALK, TALKD and DDIS.
    pub talk: TalkState,
    /// TALK_STATUS at the last status update.
    pub previous_talk_status: bool,
    /// BL flag.
    pub buffer_low: bool,
    /// BE flag.
    pub buffer_empty: bool,
    /// Interrupt asserted.
    pub irq_pin: bool,
    /// READY asserted.
    pub ready_pin: bool,
    /// TMS5220C rate register.
    pub rate: u8,
    /// Indices of the most recently parsed frame.
    pub new_frame: FrameParameters,
    /// Clocks since the last sample.
    pub cycle: u32,
    /// Last output sample.
    pub output: i16,
    /// Dummy read due before the next memory access.
    pub schedule_dummy_read: bool,
    /// Byte fetched by READ BYTE.
    pub data_register: u8,
    /// The next host read returns the data register.
    pub read_data_register: bool,
}

/// Configuration for constructing a [`Tms5220`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tms5220Config {
    /// Part to emulate (default: TMS5220).
    pub variant: ChipVariant,
    /// Input clock in Hz (default: 640 kHz).
    pub clock_freq: u32,
    /// Output path (default: analog SPK pin).
    pub output_pin: OutputPin,
}

impl Default for Tms5220Config {
    fn default() -> Self {
        Tms5220Config {
            variant: ChipVariant::default(),
            clock_freq: DEFAULT_CLOCK_FREQ,
            output_pin: OutputPin::default(),
        }
    }
}

/// TMS5220 family speech synthesizer.
///
/// The host talks to the chip through [`write`](Self::write) and
/// [`read`](Self::read), optionally gated by the bus strobes, and advances it
/// with one of the clocking methods. Every 80 input clocks produce one sample.
///
/// # Example
/// ```
/// use tms52xx::{ChipVariant, Tms5220, Tms5220Config};
///
/// let mut chip = Tms5220::from_config(Tms5220Config {
///     variant: ChipVariant::Tms5220C,
///     ..Tms5220Config::default()
/// })
/// .unwrap();
///
/// chip.write(0x60); // SPEAK EXTERNAL
/// chip.write(0x0f); // stop frame
/// assert!(!chip.read_ready(), "READY is active low");
///
/// let mut buffer = [0i16; 256];
/// let (samples, remaining) = chip.sample(80 * 100, &mut buffer);
/// assert_eq!((samples, remaining), (100, 0));
/// ```
pub struct Tms5220 {
    // Configuration
    variant: ChipVariant,
    coeffs: &'static Coefficients,
    clock_freq: u32,
    output_pin: OutputPin,
    // Functional Units
    fifo: Fifo,
    interpolator: Interpolator,
    excitation: ExcitationGenerator,
    filter: LatticeFilter,
    bus: BusInterface,
    memory: MemoryLink,
    // Runtime State
    talk: TalkState,
    previous_talk_status: bool,
    buffer_low: bool,
    buffer_empty: bool,
    irq_pin: bool,
    ready_pin: bool,
    rate: u8,
    new_frame: FrameParameters,
    cycle: u32,
    output: i16,
    // Lines
    irq_handler: Option<LineHandler>,
    ready_handler: Option<LineHandler>,
}

impl Tms5220 {
    /// Construct a chip clocked at 640 kHz with analog output.
    pub fn new(variant: ChipVariant) -> Self {
        Self::build(variant, DEFAULT_CLOCK_FREQ, OutputPin::default())
    }

    /// Construct a chip from a full configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroClockFreq` if `clock_freq` is zero.
    pub fn from_config(config: Tms5220Config) -> Result<Self, ConfigError> {
        if config.clock_freq == 0 {
            return Err(ConfigError::ZeroClockFreq);
        }
        Ok(Self::build(
            config.variant,
            config.clock_freq,
            config.output_pin,
        ))
    }

    fn build(variant: ChipVariant, clock_freq: u32, output_pin: OutputPin) -> Self {
        let mut chip = Tms5220 {
            variant,
            coeffs: variant.coefficients(),
            clock_freq,
            output_pin,
            fifo: Fifo::new(),
            interpolator: Interpolator::default(),
            excitation: ExcitationGenerator::default(),
            filter: LatticeFilter::default(),
            bus: BusInterface::default(),
            memory: MemoryLink::default(),
            talk: TalkState::default(),
            previous_talk_status: false,
            buffer_low: true,
            buffer_empty: true,
            irq_pin: false,
            ready_pin: false,
            rate: 0,
            new_frame: FrameParameters::default(),
            cycle: 0,
            output: IDLE_OUTPUT,
            irq_handler: None,
            ready_handler: None,
        };
        chip.reset();
        chip
    }

    /// Attach an external speech memory used by SPEAK and the memory
    /// commands.
    pub fn with_memory<M: SpeechMemory + 'static>(mut self, memory: M) -> Self {
        self.memory.attach(Box::new(memory));
        self.memory.reset();
        self
    }

    /// Called with the /INT line level whenever it changes (`false` = asserted).
    pub fn set_irq_handler<F: FnMut(bool) + 'static>(&mut self, handler: F) {
        self.irq_handler = Some(Box::new(handler));
    }

    /// Called with the /READY line level whenever it changes (`false` = ready).
    pub fn set_ready_handler<F: FnMut(bool) + 'static>(&mut self, handler: F) {
        self.ready_handler = Some(Box::new(handler));
    }

    /// Change the input clock.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroClockFreq` if `clock_freq` is zero.
    pub fn set_frequency(&mut self, clock_freq: u32) -> Result<(), ConfigError> {
        if clock_freq == 0 {
            return Err(ConfigError::ZeroClockFreq);
        }
        self.clock_freq = clock_freq;
        Ok(())
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.clock_freq / CYCLES_PER_SAMPLE
    }

    /// Select the analog SPK pin or the digital I/O pin output path.
    pub fn set_output_pin(&mut self, output_pin: OutputPin) {
        self.output_pin = output_pin;
    }

    /// Selected output path.
    pub fn output_pin(&self) -> OutputPin {
        self.output_pin
    }

    /// Emulated part.
    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    /// Reset the chip to its idle state.
    ///
    /// Bus strobe state and the TMS5220C rate register are kept.
    pub fn reset(&mut self) {
        self.fifo.clear();
        self.talk = TalkState::default();
        self.previous_talk_status = false;
        self.buffer_empty = true;
        self.buffer_low = true;
        self.new_frame = FrameParameters::default();
        self.interpolator.reset(RATE_RELOAD[(self.rate & 0x03) as usize]);
        self.excitation.reset();
        self.filter.reset();
        self.memory.reset();
        self.set_interrupt_state(false);
        self.update_ready_state();
    }

    // -- Device I/O

    /// Write the data bus.
    ///
    /// In speak external mode the byte goes to the FIFO, otherwise it is a
    /// command. In true timing mode the byte is only latched and takes effect
    /// when the write strobe is serviced.
    pub fn write(&mut self, data: u8) {
        if self.bus.true_timing() {
            self.bus.latch_write(data);
        } else {
            self.data_write(data);
        }
    }

    /// Read the data bus.
    ///
    /// Returns the status byte (clearing the interrupt), or the data register
    /// once after READ BYTE. In true timing mode returns the latched value
    /// while only /RS is low, and 0xff otherwise.
    pub fn read(&mut self) -> u8 {
        if self.bus.true_timing() {
            if self.bus.strobes() != 0x01 {
                warn!("read without /RS asserted");
            }
            self.bus.bus_read()
        } else {
            self.status_read()
        }
    }

    /// /READY line level (`false` = ready for the next access).
    pub fn read_ready(&self) -> bool {
        !self.ready()
    }

    /// /INT line level (`false` = interrupt pending).
    pub fn read_interrupt(&self) -> bool {
        !self.irq_pin
    }

    /// Drive the /RS pin. Switches the chip to true timing.
    pub fn read_strobe(&mut self, level: bool) {
        self.strobe(Strobe::Read, level);
    }

    /// Drive the /WS pin. Switches the chip to true timing.
    pub fn write_strobe(&mut self, level: bool) {
        self.strobe(Strobe::Write, level);
    }

    /// Samples until READY returns, or 0 if the chip is ready now.
    pub fn cycles_to_ready(&self) -> u32 {
        if self.ready() {
            return 0;
        }
        if !self.fifo_blocks_ready() {
            // Strobe timer or dummy read, both done within the next sample.
            return 1;
        }
        let elapsed = u32::from(self.interpolator.pc()) * 2
            + SAMPLES_PER_PERIOD * u32::from(self.interpolator.ip());
        let mut answer = (SAMPLES_PER_FRAME + READY_MARGIN).saturating_sub(elapsed);
        let bits_taken = self.fifo.bits_taken();
        // A silence frame only frees 4 bits, so another frame is needed.
        if bits_taken < 4 && (self.fifo.head() >> bits_taken) & 0x0f == 0 {
            answer += SAMPLES_PER_FRAME;
        }
        answer
    }

    /// Seconds until READY returns.
    pub fn time_to_ready(&self) -> f64 {
        f64::from(self.cycles_to_ready()) * f64::from(CYCLES_PER_SAMPLE)
            / f64::from(self.clock_freq)
    }

    // -- Introspection

    /// SPEN, TALK, TALKD and DDIS.
    pub fn talk_state(&self) -> TalkState {
        self.talk
    }

    /// Bytes held by the FIFO.
    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    /// Values currently driving the synthesizer.
    pub fn current_parameters(&self) -> Parameters {
        self.interpolator.parameters()
    }

    /// Indices of the most recently parsed frame.
    pub fn new_frame(&self) -> FrameParameters {
        self.new_frame
    }

    /// Excitation used for the frame being played out.
    pub fn excitation_source(&self) -> Excitation {
        if self.interpolator.old_unvoiced() {
            Excitation::Noise
        } else {
            Excitation::Chirp
        }
    }

    /// TMS5220C rate register.
    pub fn rate(&self) -> u8 {
        self.rate
    }

    /// Last output sample.
    pub fn output(&self) -> i16 {
        self.output
    }

    // -- Clocking

    /// Advance the chip by one clock cycle.
    pub fn clock(&mut self) {
        self.clock_delta(1);
    }

    /// Advance the chip by `delta` clock cycles.
    pub fn clock_delta(&mut self, mut delta: u32) {
        while delta > 0 {
            if self.memory.dummy_read_pending() {
                self.memory.perform_dummy_read();
                self.update_ready_state();
            }
            let mut step = delta.min(CYCLES_PER_SAMPLE - self.cycle);
            if let Some(timer) = self.bus.timer() {
                step = step.min(timer);
            }
            if let Some(access) = self.bus.tick(step) {
                self.service_bus(access);
            }
            self.cycle += step;
            if self.cycle == CYCLES_PER_SAMPLE {
                self.cycle = 0;
                self.output = self.synthesize();
            }
            delta -= step;
        }
    }

    /// Clock the chip for up to `delta` cycles, storing every sample produced
    /// in `buffer`.
    ///
    /// Returns the number of samples written and the cycles left over when
    /// the buffer filled up. Cycles that do not complete a sample are clocked
    /// and carried into the next call.
    /// ```ignore
    /// let mut buffer = [0i16; 8192];
    /// while delta > 0 {
    ///     let (samples, next_delta) = chip.sample(delta, &mut buffer[..]);
    ///     sink.write(&buffer[..samples]);
    ///     delta = next_delta;
    /// }
    /// ```
    pub fn sample(&mut self, mut delta: u32, buffer: &mut [i16]) -> (usize, u32) {
        let mut index = 0;
        loop {
            let delta_sample = CYCLES_PER_SAMPLE - self.cycle;
            if delta_sample > delta || index >= buffer.len() {
                break;
            }
            self.clock_delta(delta_sample);
            delta -= delta_sample;
            buffer[index] = self.output;
            index += 1;
        }
        if delta > 0 && index < buffer.len() {
            self.clock_delta(delta);
            (index, 0)
        } else {
            (index, delta)
        }
    }

    /// Fill `buffer` with consecutive samples.
    pub fn process(&mut self, buffer: &mut [i16]) {
        for out in buffer.iter_mut() {
            self.clock_delta(CYCLES_PER_SAMPLE - self.cycle);
            *out = self.output;
        }
    }

    // -- State

    /// Snapshot the chip state.
    pub fn read_state(&self) -> State {
        State {
            fifo: self.fifo.clone(),
            interpolator: self.interpolator.clone(),
            excitation: self.excitation.clone(),
            filter: self.filter.clone(),
            bus: self.bus.clone(),
            talk: self.talk,
            previous_talk_status: self.previous_talk_status,
            buffer_low: self.buffer_low,
            buffer_empty: self.buffer_empty,
            irq_pin: self.irq_pin,
            ready_pin: self.ready_pin,
            rate: self.rate,
            new_frame: self.new_frame,
            cycle: self.cycle,
            output: self.output,
            schedule_dummy_read: self.memory.dummy_read_pending(),
            data_register: self.memory.data_register(),
            read_data_register: self.memory.read_data_register(),
        }
    }

    /// Restore a snapshot. Line handlers are not called. Frame indices wider
    /// than their fields are truncated.
    pub fn write_state(&mut self, state: &State) {
        self.fifo = state.fifo.clone();
        self.interpolator = state.interpolator.clone();
        self.excitation = state.excitation.clone();
        self.filter = state.filter.clone();
        self.bus = state.bus.clone();
        self.talk = state.talk;
        self.previous_talk_status = state.previous_talk_status;
        self.buffer_low = state.buffer_low;
        self.buffer_empty = state.buffer_empty;
        self.irq_pin = state.irq_pin;
        self.ready_pin = state.ready_pin;
        self.rate = state.rate;
        self.new_frame = state.new_frame.masked(self.coeffs);
        self.cycle = state.cycle % CYCLES_PER_SAMPLE;
        self.output = state.output;
        self.memory.restore(
            state.schedule_dummy_read,
            state.data_register,
            state.read_data_register,
        );
    }

    // -- Bus

    fn strobe(&mut self, strobe: Strobe, level: bool) {
        match self.bus.set_strobe(strobe, level) {
            StrobeEdge::BothLow => {
                if self.variant.has_rate_control() {
                    debug!("/RS and /WS both low, resetting");
                    self.reset();
                } else {
                    warn!("/RS and /WS both low on {}", self.variant.name());
                }
            }
            StrobeEdge::Falling => {
                trace!("{:?} strobe fell", strobe);
                self.update_ready_state();
            }
            StrobeEdge::Unchanged | StrobeEdge::BothHigh | StrobeEdge::Rising => {}
        }
    }

    fn service_bus(&mut self, access: BusAccess) {
        match access {
            BusAccess::Write(data) => {
                if self.talk.ddis && self.fifo.is_full() {
                    debug!("FIFO full, holding /READY");
                    self.bus.rearm();
                    return;
                }
                debug!("serviced write: {:02x}", data);
                self.data_write(data);
            }
            BusAccess::Read => {
                let value = self.status_read();
                debug!("serviced read: {:02x}", value);
                self.bus.set_read_latch(value);
            }
            BusAccess::Idle => {}
        }
        self.bus.complete();
        self.update_ready_state();
    }

    fn data_write(&mut self, data: u8) {
        if !self.talk.ddis {
            self.process_command(data);
            return;
        }
        let old_buffer_low = self.buffer_low;
        if !self.fifo.push(data) {
            warn!("FIFO full, dropped {:02x}", data);
            return;
        }
        self.update_fifo_status_and_ints();
        // SPEN rises when the FIFO fills past half (falling edge of BL).
        if !self.talk.spen && old_buffer_low && !self.buffer_low {
            debug!("speak external: utterance starts");
            self.start_utterance();
        }
    }

    fn status_read(&mut self) -> u8 {
        if let Some(data) = self.memory.take_data_register() {
            return data;
        }
        self.set_interrupt_state(false);
        status_byte(
            self.talk.talk_status(),
            self.buffer_low,
            self.buffer_empty,
        )
    }

    fn process_command(&mut self, data: u8) {
        let command = Command::decode(data, self.variant);
        debug!("command {:02x}: {:?}", data, command);
        if command.needs_idle() && self.talk.talk_status() {
            debug!("{:?} ignored while talking", command);
        } else {
            match command {
                Command::TestTalk => {}
                Command::Unknown(data) => debug!("unknown command {:02x}", data),
                Command::SetRate(rate) => self.rate = rate,
                Command::ReadByte => self.memory.read_byte(),
                Command::ReadAndBranch => {
                    self.memory.clear_data_register();
                    self.memory.read_and_branch();
                }
                Command::LoadAddress(nibble) => self.memory.load_address(nibble),
                Command::Speak => {
                    self.memory.perform_dummy_read();
                    self.talk.ddis = false;
                    self.start_utterance();
                }
                Command::SpeakExternal => {
                    self.fifo.clear();
                    self.talk.ddis = true;
                    self.memory.clear_data_register();
                }
                Command::Reset => {
                    self.memory.perform_dummy_read();
                    self.reset();
                }
            }
        }
        self.update_fifo_status_and_ints();
    }

    // -- Lines

    fn fifo_blocks_ready(&self) -> bool {
        self.talk.ddis && self.fifo.is_full()
    }

    fn ready(&self) -> bool {
        !self.fifo_blocks_ready() && self.bus.io_ready() && !self.memory.dummy_read_pending()
    }

    fn update_ready_state(&mut self) {
        let ready = self.ready();
        if ready != self.ready_pin {
            if let Some(handler) = self.ready_handler.as_mut() {
                handler(!ready);
            }
        }
        self.ready_pin = ready;
    }

    fn set_interrupt_state(&mut self, state: bool) {
        if state != self.irq_pin {
            if let Some(handler) = self.irq_handler.as_mut() {
                handler(!state);
            }
        }
        self.irq_pin = state;
    }

    fn update_fifo_status_and_ints(&mut self) {
        let buffer_low = self.fifo.len() <= FIFO_SIZE / 2;
        if buffer_low && !self.buffer_low {
            self.set_interrupt_state(true);
        }
        self.buffer_low = buffer_low;

        if self.fifo.is_empty() {
            if !self.buffer_empty {
                self.set_interrupt_state(true);
            }
            self.buffer_empty = true;
            // BE halts speak external just like a stop frame.
            if self.talk.ddis {
                self.talk.talk = false;
                self.talk.spen = false;
            }
        } else {
            self.buffer_empty = false;
        }

        let talk_status = self.talk.talk_status();
        if self.previous_talk_status && !talk_status {
            debug!("utterance ended");
            self.set_interrupt_state(true);
            self.talk.ddis = false;
        }
        self.previous_talk_status = talk_status;
        self.update_ready_state();
    }

    // -- Synthesis

    fn start_utterance(&mut self) {
        self.talk.spen = true;
        self.interpolator
            .start_utterance(RATE_RELOAD[(self.rate & 0x03) as usize]);
        self.new_frame = FrameParameters::utterance_start();
    }

    fn latch_talk(&mut self) {
        self.talk.talkd = self.talk.talk;
        self.update_fifo_status_and_ints();
        if !self.talk.talk && self.talk.spen {
            self.talk.talk = true;
        }
    }

    fn parse_frame(&mut self) {
        self.interpolator.clear_zero_flags();
        let reload = if self.variant.has_rate_control() && self.rate & RATE_VARIABLE != 0 {
            let rate = SpeechData(self).extract_bits(2).unwrap_or(0);
            RATE_RELOAD[(rate & 0x03) as usize]
        } else {
            RATE_RELOAD[(self.rate & 0x03) as usize]
        };
        self.interpolator.set_period(reload);

        let previous = self.new_frame;
        let (new_frame, kind) = frame::parse(&previous, self.coeffs, &mut SpeechData(self));
        if kind == FrameKind::Underflow {
            warn!("speech data ran out mid-frame, playing silence");
        }
        trace!("{:?} frame: {:?}", kind, new_frame);
        self.new_frame = new_frame;
        self.interpolator.load_frame(&new_frame);

        // TALKD stays up while the energy ramps down.
        if new_frame.is_stop() {
            debug!("stop frame");
            self.talk.talk = false;
            self.talk.spen = false;
            self.update_fifo_status_and_ints();
        }
    }

    fn synthesize(&mut self) -> i16 {
        if !self.talk.talkd {
            if self.interpolator.advance(false, &self.new_frame) {
                self.latch_talk();
            }
            return IDLE_OUTPUT;
        }

        if self.interpolator.at_frame_boundary() {
            self.parse_frame();
        } else {
            self.interpolator.interpolate(&self.new_frame, self.coeffs);
        }

        let source = self.excitation_source();
        let input = self.excitation.sample(
            source,
            &self.coeffs.chirp,
            self.interpolator.energy(),
            self.interpolator.zpar(),
        );
        let sample = wrap_output(self.filter.clock(input, self.interpolator.k()));
        let output = self.output_pin.convert(sample);

        if self.interpolator.advance(true, &self.new_frame) {
            self.latch_talk();
        }
        self.excitation
            .advance_pitch(self.interpolator.pitch(), self.interpolator.pitch_zero());
        output
    }
}

/// Frame bits from the FIFO in speak external mode, from speech memory
/// otherwise. Status flags follow every field.
struct SpeechData<'a>(&'a mut Tms5220);

impl FrameSource for SpeechData<'_> {
    fn extract_bits(&mut self, count: u8) -> Option<u16> {
        let chip = &mut *self.0;
        let bits = if chip.talk.ddis {
            chip.fifo.take_bits(count)
        } else {
            Some(u16::from(chip.memory.read_bits(count)))
        };
        chip.update_fifo_status_and_ints();
        bits
    }

    fn ran_out(&mut self) -> bool {
        self.0.talk.ddis && self.0.buffer_empty
    }
}
