// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;

use super::frame::FrameSource;

/// FIFO capacity in bytes (128 bits on the die).
pub const FIFO_SIZE: usize = 16;

/// Speech data FIFO.
///
/// Bytes are pushed whole by the host but consumed bit by bit by the frame
/// parser, least significant bit first. The head byte is retired only after
/// all eight of its bits have been taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fifo {
    data: [u8; FIFO_SIZE],
    head: usize,
    tail: usize,
    count: usize,
    bits_taken: u8,
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

impl Fifo {
    /// Create an empty FIFO.
    pub const fn new() -> Self {
        Self {
            data: [0; FIFO_SIZE],
            head: 0,
            tail: 0,
            count: 0,
            bits_taken: 0,
        }
    }

    /// Drop all contents, including a partially consumed head byte.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Number of bytes held, counting a partially consumed head byte.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// True when no bytes are held.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when another push would be rejected.
    pub const fn is_full(&self) -> bool {
        self.count >= FIFO_SIZE
    }

    /// Bits already consumed from the head byte (always below 8).
    pub const fn bits_taken(&self) -> u8 {
        self.bits_taken
    }

    /// The head byte, or 0 when empty.
    pub const fn head(&self) -> u8 {
        if self.count == 0 {
            0
        } else {
            self.data[self.head]
        }
    }

    /// Append a byte. Returns `false` and leaves the FIFO untouched when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.tail] = byte;
        self.tail = (self.tail + 1) % FIFO_SIZE;
        self.count += 1;
        true
    }

    /// Take the next bit, or `None` when empty.
    pub fn take_bit(&mut self) -> Option<bool> {
        if self.count == 0 {
            return None;
        }
        let bit = self.data[self.head].get_bit(self.bits_taken as usize);
        self.bits_taken += 1;
        if self.bits_taken >= 8 {
            self.data[self.head] = 0;
            self.head = (self.head + 1) % FIFO_SIZE;
            self.count -= 1;
            self.bits_taken = 0;
        }
        Some(bit)
    }

    /// Take `count` bits, the first one landing in the most significant
    /// position of the result.
    ///
    /// Returns `None` if the FIFO ran dry before the field was complete; the
    /// bits that were available are consumed regardless.
    pub fn take_bits(&mut self, count: u8) -> Option<u16> {
        let mut value = 0u16;
        for _ in 0..count {
            let bit = self.take_bit()?;
            value = (value << 1) | bit as u16;
        }
        Some(value)
    }
}

impl FrameSource for Fifo {
    fn extract_bits(&mut self, count: u8) -> Option<u16> {
        self.take_bits(count)
    }

    fn ran_out(&mut self) -> bool {
        self.is_empty()
    }
}
