// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Speech memory interface.
//!
//! When SPEAK is used instead of SPEAK EXTERNAL the chip fetches its frame
//! bits from an external voice synthesis memory (VSM, e.g. a TMS6100). Two
//! ways of reaching one are modelled:
//!
//! - [`DirectMemory`] hands out bits straight from a ROM image, the way the
//!   chip sees a VSM wired to its ADD pins.
//! - [`SerialMemory`] drives the M0, M1, ADD and ROMCLK lines of a
//!   [`SerialBus`] and samples its data line, for hosts that emulate the VSM
//!   as a separate device.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::trace;

/// VSM addresses are 18 bits wide.
pub const ADDRESS_MASK: u32 = 0x3ffff;
/// READ AND BRANCH keeps the bank bits and replaces the rest.
const BRANCH_BANK_MASK: u32 = 0x3c000;
const BRANCH_OFFSET_MASK: u32 = 0x3fff;

/// The chip's side of an external speech memory.
pub trait SpeechMemory {
    /// Shift one address nibble into the memory (LOAD ADDRESS).
    fn request_address(&mut self, nibble: u8);

    /// Read `count` bits (at most 8), first bit in the most significant
    /// position.
    fn request_data(&mut self, count: u8) -> u8;

    /// Jump to the 14-bit pointer stored at the current address.
    fn read_and_branch(&mut self);

    /// Return to address 0.
    fn reset(&mut self);
}

/// Byte-addressed speech ROM image.
pub trait SpeechRom {
    /// Byte at `address`, or 0 past the end of the image.
    fn read_byte(&self, address: u32) -> u8;
}

impl SpeechRom for [u8] {
    fn read_byte(&self, address: u32) -> u8 {
        self.get(address as usize).copied().unwrap_or(0)
    }
}

impl<const N: usize> SpeechRom for [u8; N] {
    fn read_byte(&self, address: u32) -> u8 {
        self[..].read_byte(address)
    }
}

impl SpeechRom for Vec<u8> {
    fn read_byte(&self, address: u32) -> u8 {
        self[..].read_byte(address)
    }
}

impl<R: SpeechRom + ?Sized> SpeechRom for &R {
    fn read_byte(&self, address: u32) -> u8 {
        (**self).read_byte(address)
    }
}

/// VSM reading a ROM image directly.
///
/// Address nibbles are loaded least significant first. The first read after a
/// load is the chip's dummy read and returns nothing; after it, bits are
/// served most significant first from each byte.
#[derive(Clone, Debug)]
pub struct DirectMemory<R> {
    rom: R,
    address: u32,
    // shift for the next address nibble
    load_pointer: u8,
    // bits of the byte at `address` already read
    bit: u8,
    loaded: bool,
}

impl<R: SpeechRom> DirectMemory<R> {
    /// Wrap a ROM image.
    pub fn new(rom: R) -> Self {
        Self {
            rom,
            address: 0,
            load_pointer: 0,
            bit: 0,
            loaded: true,
        }
    }

    /// Address of the byte the next bit comes from.
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// The wrapped ROM image.
    pub fn rom(&self) -> &R {
        &self.rom
    }

    fn next_bit(&mut self) -> bool {
        let byte = self.rom.read_byte(self.address);
        let bit = (byte >> (7 - self.bit)) & 1 != 0;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.address = (self.address + 1) & ADDRESS_MASK;
        }
        bit
    }
}

impl<R: SpeechRom> SpeechMemory for DirectMemory<R> {
    fn request_address(&mut self, nibble: u8) {
        if self.load_pointer < 20 {
            let shift = self.load_pointer;
            self.address = ((self.address & !(0xf << shift)) | (u32::from(nibble & 0xf) << shift))
                & ADDRESS_MASK;
        }
        self.load_pointer = self.load_pointer.saturating_add(4);
        self.bit = 0;
        self.loaded = true;
    }

    fn request_data(&mut self, count: u8) -> u8 {
        self.load_pointer = 0;
        if self.loaded {
            self.loaded = false;
            return 0;
        }
        let mut value = 0u8;
        for _ in 0..count.min(8) {
            value = (value << 1) | self.next_bit() as u8;
        }
        value
    }

    fn read_and_branch(&mut self) {
        let pointer = (u32::from(self.rom.read_byte(self.address)) << 8)
            | u32::from(self.rom.read_byte((self.address + 1) & ADDRESS_MASK));
        self.address = (self.address & BRANCH_BANK_MASK) | (pointer & BRANCH_OFFSET_MASK);
        self.bit = 0;
        self.load_pointer = 0;
        trace!("VSM branch to {:05x}", self.address);
    }

    fn reset(&mut self) {
        self.address = 0;
        self.load_pointer = 0;
        self.bit = 0;
        self.loaded = true;
    }
}

/// The lines between the chip and a serially addressed VSM.
///
/// The setters are only called when a line changes level.
pub trait SerialBus {
    /// M0 command line.
    fn set_m0(&mut self, level: bool);
    /// M1 command line.
    fn set_m1(&mut self, level: bool);
    /// ADD1..ADD8 nibble.
    fn set_addr(&mut self, nibble: u8);
    /// ROM clock.
    fn set_romclk(&mut self, level: bool);
    /// Sample the data line.
    fn data(&mut self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Lines {
    romclk: bool,
    m0: bool,
    m1: bool,
    addr: u8,
}

/// Serial VSM protocol.
///
/// Every operation is four ROMCLK phases:
///
/// | operation       | phase 1     | phase 2     | phase 3 | phase 4 |
/// |-----------------|-------------|-------------|---------|---------|
/// | load address    | CLK, M1, A  | M1, A       | CLK, A  | A       |
/// | read bit        | CLK, M0     | M0          | CLK     | -       |
/// | read and branch | CLK, M0, M1 | M0, M1      | CLK     | -       |
///
/// A read samples the data line after the last phase.
#[derive(Clone, Debug)]
pub struct SerialMemory<B> {
    bus: B,
    lines: Lines,
}

impl<B: SerialBus> SerialMemory<B> {
    /// Drive `bus`. All lines start low.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            lines: Lines::default(),
        }
    }

    /// The driven bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the driven bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn drive(&mut self, romclk: bool, m0: bool, m1: bool, addr: u8) {
        let next = Lines {
            romclk,
            m0,
            m1,
            addr,
        };
        if next.m0 != self.lines.m0 {
            self.bus.set_m0(m0);
        }
        if next.m1 != self.lines.m1 {
            self.bus.set_m1(m1);
        }
        if next.addr != self.lines.addr {
            self.bus.set_addr(addr);
        }
        if next.romclk != self.lines.romclk {
            self.bus.set_romclk(romclk);
        }
        self.lines = next;
    }

    fn read_bit(&mut self) -> bool {
        self.drive(true, true, false, 0);
        self.drive(false, true, false, 0);
        self.drive(true, false, false, 0);
        self.drive(false, false, false, 0);
        self.bus.data()
    }
}

impl<B: SerialBus> SpeechMemory for SerialMemory<B> {
    fn request_address(&mut self, nibble: u8) {
        let nibble = nibble & 0xf;
        self.drive(true, false, true, nibble);
        self.drive(false, false, true, nibble);
        self.drive(true, false, false, nibble);
        self.drive(false, false, false, nibble);
    }

    fn request_data(&mut self, count: u8) -> u8 {
        let mut value = 0u8;
        for _ in 0..count.min(8) {
            value = (value << 1) | self.read_bit() as u8;
        }
        value
    }

    fn read_and_branch(&mut self) {
        self.drive(true, true, true, 0);
        self.drive(false, true, true, 0);
        self.drive(true, false, false, 0);
        self.drive(false, false, false, 0);
    }

    fn reset(&mut self) {}
}

/// The chip's memory interface registers.
///
/// Owns the attached memory (if any), the pending dummy read, and the data
/// register filled by READ BYTE.
#[derive(Default)]
pub struct MemoryLink {
    memory: Option<Box<dyn SpeechMemory>>,
    schedule_dummy_read: bool,
    data_register: u8,
    read_data_register: bool,
}

impl MemoryLink {
    /// Attach `memory`, replacing any previous one.
    pub fn attach(&mut self, memory: Box<dyn SpeechMemory>) {
        self.memory = Some(memory);
    }

    /// Whether a memory is attached.
    pub fn is_attached(&self) -> bool {
        self.memory.is_some()
    }

    /// A dummy read is due before the next data access.
    pub const fn dummy_read_pending(&self) -> bool {
        self.schedule_dummy_read
    }

    /// Last byte fetched by READ BYTE.
    pub const fn data_register(&self) -> u8 {
        self.data_register
    }

    /// The next host read returns the data register instead of status.
    pub const fn read_data_register(&self) -> bool {
        self.read_data_register
    }

    /// Shift an address nibble into memory and schedule a dummy read.
    pub fn load_address(&mut self, nibble: u8) {
        if let Some(memory) = self.memory.as_mut() {
            memory.request_address(nibble);
        }
        self.schedule_dummy_read = true;
    }

    /// Perform the scheduled dummy read, if one is due.
    pub fn perform_dummy_read(&mut self) {
        if self.schedule_dummy_read {
            trace!("VSM dummy read");
            self.read_bits(1);
            self.schedule_dummy_read = false;
        }
    }

    /// Read up to 8 bits. Returns 0 with no memory attached.
    pub fn read_bits(&mut self, count: u8) -> u8 {
        self.memory
            .as_mut()
            .map_or(0, |memory| memory.request_data(count))
    }

    /// READ BYTE: fetch 8 bits into the data register.
    pub fn read_byte(&mut self) {
        self.perform_dummy_read();
        self.data_register = self.read_bits(8);
        self.read_data_register = true;
    }

    /// READ AND BRANCH.
    pub fn read_and_branch(&mut self) {
        if let Some(memory) = self.memory.as_mut() {
            memory.read_and_branch();
        }
    }

    /// Hand out the data register once, if READ BYTE filled it.
    pub fn take_data_register(&mut self) -> Option<u8> {
        if self.read_data_register {
            self.read_data_register = false;
            Some(self.data_register)
        } else {
            None
        }
    }

    /// Forget a pending data register read.
    pub fn clear_data_register(&mut self) {
        self.read_data_register = false;
    }

    /// Restore the registers from a snapshot.
    pub fn restore(&mut self, schedule_dummy_read: bool, data_register: u8, read_data_register: bool) {
        self.schedule_dummy_read = schedule_dummy_read;
        self.data_register = data_register;
        self.read_data_register = read_data_register;
    }

    /// Chip reset: memory back to address 0, followed by its dummy read.
    pub fn reset(&mut self) {
        if let Some(memory) = self.memory.as_mut() {
            memory.reset();
        }
        self.schedule_dummy_read = true;
        self.perform_dummy_read();
        self.read_data_register = false;
    }
}
