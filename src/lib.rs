// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![no_std]
#![warn(missing_docs)]
//! Cycle-accurate emulator of the TMS5220 family of LPC speech synthesizers.
//!
//! The chip takes commands and frame data over an 8-bit bus, buffers speech
//! data in a 16-byte FIFO (or fetches it from an external speech ROM), and
//! synthesizes 8 kHz audio through a ten stage lattice filter. All arithmetic
//! follows the silicon bit for bit, so output can be compared sample by
//! sample against hardware captures.
//!
//! ## Example
//! ```
//! use tms52xx::{ChipVariant, Tms5220};
//!
//! let mut chip = Tms5220::new(ChipVariant::Tms5220);
//! chip.write(0x60); // speak external
//! let mut buffer = [0i16; 200];
//! chip.process(&mut buffer);
//! ```

extern crate alloc;

use alloc::string::{String, ToString};
use core::str::FromStr;

/// Output stage: analog and digital pin conversion.
pub mod dac;
/// Command decoding and status/talk-state bookkeeping.
pub mod control;
mod data;
/// Voiced (chirp) and unvoiced (noise) excitation.
pub mod excitation;
/// 16-byte speech data FIFO with bit-granular reads.
pub mod fifo;
/// Frame parameters and the frame bitstream parser.
pub mod frame;
/// Parameter interpolation and the chip's timing counters.
pub mod interpolator;
/// Ten stage reflection-coefficient lattice filter.
pub mod lattice;
mod tms5220;
/// External speech memory (VSM) protocols.
pub mod vsm;

pub use self::dac::OutputPin;
pub use self::data::Coefficients;
pub use self::tms5220::{State, Tms5220, Tms5220Config};

/// TMS52xx chip variant selection.
///
/// Variants share one synthesis engine and differ in their coefficient ROM
/// and a few quirks, such as the variable frame rate of the TMS5220C.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ChipVariant {
    /// TMS5220, the common part found in arcade boards and home computers.
    #[default]
    Tms5220,
    /// TMS5220C with the SET RATE command and variable frame length.
    Tms5220C,
    /// TMS5200, the earlier part with the TMC0285 coefficient ROM.
    Tms5200,
    /// CD2501E, the second-source TMS5200.
    Cd2501e,
    /// CD2501ECD, the second-source TMS5220C.
    Cd2501ecd,
}

impl ChipVariant {
    /// Whether the chip understands SET RATE and 2-bit per-frame rate fields.
    pub const fn has_rate_control(self) -> bool {
        matches!(self, Self::Tms5220C | Self::Cd2501ecd)
    }

    /// Lowercase part name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tms5220 => "tms5220",
            Self::Tms5220C => "tms5220c",
            Self::Tms5200 => "tms5200",
            Self::Cd2501e => "cd2501e",
            Self::Cd2501ecd => "cd2501ecd",
        }
    }
}

impl FromStr for ChipVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let variant = [
            Self::Tms5220,
            Self::Tms5220C,
            Self::Tms5200,
            Self::Cd2501e,
            Self::Cd2501ecd,
        ]
        .into_iter()
        .find(|variant| variant.name().eq_ignore_ascii_case(s.trim()));
        variant.ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}

/// Clock frequency constants.
///
/// The chip produces one sample every [`CYCLES_PER_SAMPLE`](clock::CYCLES_PER_SAMPLE)
/// input clocks.
pub mod clock {
    /// Input clocks per output sample.
    pub const CYCLES_PER_SAMPLE: u32 = 80;
    /// 640 kHz clock, 8 kHz output.
    pub const TMS5220_8KHZ: u32 = 640_000;
    /// 800 kHz clock, 10 kHz output.
    pub const TMS5220_10KHZ: u32 = 800_000;
}

/// Error returned when a chip configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The variant name does not match a supported part.
    #[error("unknown chip variant: {0:?}")]
    UnknownVariant(String),
    /// Clock frequency must be non-zero.
    #[error("clock frequency must be non-zero")]
    ZeroClockFreq,
}
