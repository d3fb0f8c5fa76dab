// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;

use super::ChipVariant;

/// Status byte bit positions.
pub mod status {
    /// TALK_STATUS: speaking (SPEN or TALKD).
    pub const TALK_STATUS: usize = 7;
    /// BL: FIFO at most half full, 8 bytes or fewer. The ninth byte clears
    /// it, and that falling edge is what starts speak external.
    pub const BUFFER_LOW: usize = 6;
    /// BE: FIFO is empty.
    pub const BUFFER_EMPTY: usize = 5;
}

/// Clocks /READY stays inactive after a strobe falls.
pub const IO_READY_DELAY: u32 = 16;

/// Pack the three status flags into the byte returned by a status read.
pub fn status_byte(talk_status: bool, buffer_low: bool, buffer_empty: bool) -> u8 {
    let mut byte = 0u8;
    byte.set_bit(status::TALK_STATUS, talk_status);
    byte.set_bit(status::BUFFER_LOW, buffer_low);
    byte.set_bit(status::BUFFER_EMPTY, buffer_empty);
    byte
}

/// A decoded command byte. Bits 4..6 select the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// 0x00 on parts without rate control: no effect beyond a status refresh.
    TestTalk,
    /// 0x00/0x20 on the TMS5220C and CD2501ECD: load the low nibble into the
    /// rate register.
    SetRate(u8),
    /// 0x10: fetch one byte from speech memory into the data register.
    ReadByte,
    /// 0x30: replace the memory address with the pointer stored there.
    ReadAndBranch,
    /// 0x40: shift a nibble into the memory address.
    LoadAddress(u8),
    /// 0x50: speak from speech memory.
    Speak,
    /// 0x60: speak from data written to the FIFO.
    SpeakExternal,
    /// 0x70: reset the chip.
    Reset,
    /// 0x20 on parts without rate control.
    Unknown(u8),
}

impl Command {
    /// Decode `byte` as understood by `variant`.
    pub fn decode(byte: u8, variant: ChipVariant) -> Self {
        let nibble = byte & 0x0f;
        match byte & 0x70 {
            0x00 | 0x20 if variant.has_rate_control() => Self::SetRate(nibble),
            0x00 => Self::TestTalk,
            0x10 => Self::ReadByte,
            0x30 => Self::ReadAndBranch,
            0x40 => Self::LoadAddress(nibble),
            0x50 => Self::Speak,
            0x60 => Self::SpeakExternal,
            0x70 => Self::Reset,
            _ => Self::Unknown(byte),
        }
    }

    /// Memory commands are ignored while the chip is talking.
    pub const fn needs_idle(self) -> bool {
        matches!(self, Self::ReadByte | Self::ReadAndBranch | Self::LoadAddress(_))
    }
}

/// Speech control latches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TalkState {
    /// Speak enable: an utterance has been started and not yet stopped.
    pub spen: bool,
    /// Set at the next frame boundary after SPEN.
    pub talk: bool,
    /// TALK delayed to the frame boundary; gates synthesis.
    pub talkd: bool,
    /// Direct data: frame bits come from the FIFO instead of speech memory.
    pub ddis: bool,
}

impl TalkState {
    /// TALK_STATUS as reported in the status byte.
    pub const fn talk_status(&self) -> bool {
        self.spen || self.talkd
    }
}

/// Bus strobe pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strobe {
    /// /RS, read select.
    Read,
    /// /WS, write select.
    Write,
}

/// What a change on the strobe pins asks of the chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrobeEdge {
    /// The level did not change.
    Unchanged,
    /// Both strobes low.
    BothLow,
    /// Both strobes high; the bus is released.
    BothHigh,
    /// A strobe went high.
    Rising,
    /// A strobe went low; an access begins.
    Falling,
}

/// A bus access completed by the I/O timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusAccess {
    /// /WS was held low: the write latch goes to the chip.
    Write(u8),
    /// /RS was held low: the status goes to the read latch.
    Read,
    /// Neither strobe is held.
    Idle,
}

/// Bus interface with the /RS and /WS strobe timing.
///
/// Until a strobe pin is touched the bus works in immediate mode, where
/// `write` and `read` take effect on the spot. Touching either strobe
/// switches to true timing: the bus then only latches, and the access is
/// serviced [`IO_READY_DELAY`] clocks after the strobe falls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusInterface {
    true_timing: bool,
    // bit 1 = /RS, bit 0 = /WS
    rs_ws: u8,
    read_latch: u8,
    write_latch: u8,
    io_ready: bool,
    timer: Option<u32>,
}

impl Default for BusInterface {
    fn default() -> Self {
        Self {
            true_timing: false,
            rs_ws: 0x03,
            read_latch: 0,
            write_latch: 0,
            io_ready: true,
            timer: None,
        }
    }
}

impl BusInterface {
    /// Accesses are gated by the strobes.
    pub const fn true_timing(&self) -> bool {
        self.true_timing
    }

    /// Internal I/O ready; low while a strobed access is pending.
    pub const fn io_ready(&self) -> bool {
        self.io_ready
    }

    /// Current strobe levels, /RS in bit 1 and /WS in bit 0.
    pub const fn strobes(&self) -> u8 {
        self.rs_ws
    }

    /// Clocks left before a pending access is serviced.
    pub const fn timer(&self) -> Option<u32> {
        self.timer
    }

    /// Value returned by `read` in true timing mode.
    pub const fn read_latch(&self) -> u8 {
        self.read_latch
    }

    /// Set the value a strobed read will return.
    pub fn set_read_latch(&mut self, value: u8) {
        self.read_latch = value;
    }

    /// Latch a data bus value for the next strobed write.
    pub fn latch_write(&mut self, value: u8) {
        self.write_latch = value;
    }

    /// The bus value seen by the host: the read latch while only /RS is low.
    pub fn bus_read(&self) -> u8 {
        if self.rs_ws == 0x01 {
            self.read_latch
        } else {
            0xff
        }
    }

    /// Drive a strobe pin. Switches the bus to true timing.
    pub fn set_strobe(&mut self, strobe: Strobe, level: bool) -> StrobeEdge {
        self.true_timing = true;
        let rs_ws = match strobe {
            Strobe::Read => (self.rs_ws & 0x01) | ((level as u8) << 1),
            Strobe::Write => (self.rs_ws & 0x02) | level as u8,
        };
        if rs_ws == self.rs_ws {
            return StrobeEdge::Unchanged;
        }
        self.rs_ws = rs_ws;
        match rs_ws {
            0x00 => StrobeEdge::BothLow,
            0x03 => {
                self.read_latch = 0xff;
                StrobeEdge::BothHigh
            }
            _ if level => StrobeEdge::Rising,
            _ => {
                self.io_ready = false;
                self.timer = Some(IO_READY_DELAY);
                StrobeEdge::Falling
            }
        }
    }

    /// Run the I/O timer for `cycles` clocks, never more than [`timer`](Self::timer).
    ///
    /// Returns the access to service when the timer expires.
    pub fn tick(&mut self, cycles: u32) -> Option<BusAccess> {
        let remaining = self.timer?;
        if remaining > cycles {
            self.timer = Some(remaining - cycles);
            return None;
        }
        self.timer = None;
        Some(match self.rs_ws {
            0x02 => BusAccess::Write(self.write_latch),
            0x01 => BusAccess::Read,
            _ => BusAccess::Idle,
        })
    }

    /// Keep /READY inactive for another delay period.
    pub fn rearm(&mut self) {
        self.timer = Some(IO_READY_DELAY);
    }

    /// Finish a serviced access.
    pub fn complete(&mut self) {
        self.io_ready = true;
    }
}
