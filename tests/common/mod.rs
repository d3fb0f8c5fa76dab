// Shared helpers: LPC frame encoding and host-side feeding loops.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tms52xx::vsm::SerialBus;
use tms52xx::Tms5220;

/// SPEAK EXTERNAL command byte.
pub const SPEAK_EXTERNAL: u8 = 0x60;
/// SPEAK command byte.
pub const SPEAK: u8 = 0x50;
/// READ BYTE command byte.
pub const READ_BYTE: u8 = 0x10;
/// READ AND BRANCH command byte.
pub const READ_AND_BRANCH: u8 = 0x30;
/// LOAD ADDRESS command byte (nibble in the low bits).
pub const LOAD_ADDRESS: u8 = 0x40;

/// A voiced frame: energy, pitch, K1..K10 indices.
pub type Voiced = (u8, u8, [u8; 10]);

pub const VOICED_A: Voiced = (10, 30, [20, 12, 5, 9, 3, 11, 7, 2, 6, 1]);
pub const VOICED_B: Voiced = (6, 44, [28, 3, 14, 1, 12, 2, 15, 6, 0, 5]);

const K_BITS: [u8; 10] = [5, 5, 4, 4, 4, 4, 4, 3, 3, 3];

/// Packs frame fields in FIFO order: each field most significant bit first,
/// each byte filled from bit 0 up.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: u32, width: u8) -> &mut Self {
        for i in (0..width).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= bit << (self.bits % 8);
            self.bits += 1;
        }
        self
    }

    pub fn silence(&mut self) -> &mut Self {
        self.push(0, 4)
    }

    pub fn stop(&mut self) -> &mut Self {
        self.push(0xf, 4)
    }

    pub fn repeat(&mut self, energy: u8, pitch: u8) -> &mut Self {
        self.push(energy.into(), 4).push(1, 1).push(pitch.into(), 6)
    }

    pub fn unvoiced(&mut self, energy: u8, k: [u8; 4]) -> &mut Self {
        self.push(energy.into(), 4).push(0, 1).push(0, 6);
        for (i, &index) in k.iter().enumerate() {
            self.push(index.into(), K_BITS[i]);
        }
        self
    }

    pub fn voiced(&mut self, frame: Voiced) -> &mut Self {
        let (energy, pitch, k) = frame;
        self.push(energy.into(), 4).push(0, 1).push(pitch.into(), 6);
        for (i, &index) in k.iter().enumerate() {
            self.push(index.into(), K_BITS[i]);
        }
        self
    }

    /// 2-bit rate field read ahead of each frame in variable rate mode.
    pub fn rate(&mut self, rate: u8) -> &mut Self {
        self.push(rate.into(), 2)
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Process a single sample.
pub fn step(chip: &mut Tms5220) -> i16 {
    let mut sample = [0i16; 1];
    chip.process(&mut sample);
    sample[0]
}

/// Host loop for speak external: top up the FIFO whenever READY is active,
/// one sample at a time, until the utterance ends or `max_samples` pass.
///
/// `on_sample` sees the chip after every sample.
pub fn speak_external_with<F: FnMut(&mut Tms5220, usize)>(
    chip: &mut Tms5220,
    data: &[u8],
    max_samples: usize,
    mut on_sample: F,
) -> Vec<i16> {
    chip.write(SPEAK_EXTERNAL);
    let mut data = data.iter().copied();
    let mut exhausted = false;
    let mut spoke = false;
    let mut out = Vec::new();
    while out.len() < max_samples {
        while !exhausted && !chip.read_ready() {
            match data.next() {
                Some(byte) => chip.write(byte),
                None => exhausted = true,
            }
        }
        out.push(step(chip));
        on_sample(chip, out.len() - 1);
        let talking = chip.talk_state().talk_status();
        spoke |= talking;
        if spoke && !talking {
            break;
        }
    }
    out
}

pub fn speak_external(chip: &mut Tms5220, data: &[u8], max_samples: usize) -> Vec<i16> {
    speak_external_with(chip, data, max_samples, |_, _| {})
}

/// Run until TALK_STATUS drops or `max_samples` pass.
pub fn run_until_silent(chip: &mut Tms5220, max_samples: usize) -> Vec<i16> {
    let mut out = Vec::new();
    while out.len() < max_samples {
        out.push(step(chip));
        if !chip.talk_state().talk_status() {
            break;
        }
    }
    out
}

/// Write the five LOAD ADDRESS nibbles for `address`.
pub fn load_address(chip: &mut Tms5220, address: u32) {
    for i in 0..5 {
        chip.write(LOAD_ADDRESS | ((address >> (4 * i)) & 0xf) as u8);
    }
}

/// Serial bus line change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    M0(bool),
    M1(bool),
    Addr(u8),
    RomClk(bool),
}

/// Serially addressed speech ROM responding on the rising ROMCLK edge.
///
/// M1 alone loads an address nibble, M0 alone reads a bit. The first read
/// after an address load is the dummy read. Bits are shifted out least
/// significant first, so the image uses the same byte order as FIFO data.
pub struct SerialRom {
    data: Vec<u8>,
    m0: bool,
    m1: bool,
    addr: u8,
    clk: bool,
    address: u32,
    load_pointer: u32,
    bit: u32,
    loaded: bool,
    output: bool,
    pub log: Rc<RefCell<Vec<Line>>>,
}

impl SerialRom {
    pub fn new(data: Vec<u8>) -> Self {
        SerialRom {
            data,
            m0: false,
            m1: false,
            addr: 0,
            clk: false,
            address: 0,
            load_pointer: 0,
            bit: 0,
            loaded: false,
            output: false,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn rising_edge(&mut self) {
        match (self.m0, self.m1) {
            (false, true) => {
                if self.load_pointer == 0 {
                    self.address = 0;
                }
                self.address |= u32::from(self.addr) << self.load_pointer;
                self.load_pointer += 4;
                self.bit = 0;
                self.loaded = true;
            }
            (true, false) => {
                self.load_pointer = 0;
                if self.loaded {
                    self.loaded = false;
                    self.output = false;
                    return;
                }
                let byte = self.data.get(self.address as usize).copied().unwrap_or(0);
                self.output = (byte >> self.bit) & 1 != 0;
                self.bit += 1;
                if self.bit == 8 {
                    self.bit = 0;
                    self.address += 1;
                }
            }
            _ => {}
        }
    }
}

impl SerialBus for SerialRom {
    fn set_m0(&mut self, level: bool) {
        self.log.borrow_mut().push(Line::M0(level));
        self.m0 = level;
    }

    fn set_m1(&mut self, level: bool) {
        self.log.borrow_mut().push(Line::M1(level));
        self.m1 = level;
    }

    fn set_addr(&mut self, nibble: u8) {
        self.log.borrow_mut().push(Line::Addr(nibble));
        self.addr = nibble;
    }

    fn set_romclk(&mut self, level: bool) {
        self.log.borrow_mut().push(Line::RomClk(level));
        if level && !self.clk {
            self.rising_edge();
        }
        self.clk = level;
    }

    fn data(&mut self) -> bool {
        self.output
    }
}
