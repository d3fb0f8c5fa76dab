// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Output stage.
//!
//! The lattice filter produces a sign plus 14 bit result. The SPK pin drives
//! an 8-bit DAC through a clipper; the top 10 bits are also visible on the
//! I/O pins in digital output mode. Both paths drop the 4 LSBs and stretch the
//! remaining bits over the full 16-bit range by repeating the top bits into
//! the vacated low positions.

/// Selects which output path feeds the sample stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutputPin {
    /// 8-bit analog SPK pin with clipping.
    #[default]
    Analog,
    /// 10-bit digital output on the I/O pins, no clipping.
    Digital,
}

impl OutputPin {
    /// Convert a filter result to a 16-bit sample.
    pub fn convert(self, sample: i32) -> i16 {
        match self {
            Self::Analog => clip_analog(sample),
            Self::Digital => expand_digital(sample),
        }
    }
}

/// Clip to the analog DAC range.
///
/// If the top three of the 14 magnitude bits agree, the lower of them plus
/// the next seven bits are the signed output; otherwise the output saturates:
///
/// ```text
/// 1x xxxx xxxx xxxx -> 0b10000000
/// 11 1bcd efgh xxxx -> 0b1bcdefgh
/// 00 0bcd efgh xxxx -> 0b0bcdefgh
/// 0x xxxx xxxx xxxx -> 0b01111111
/// ```
pub fn clip_analog(sample: i32) -> i16 {
    let clipped = sample.clamp(-2048, 2047) & !0xf;
    ((clipped << 4) | ((clipped & 0x7f0) >> 3) | ((clipped & 0x400) >> 10)) as i16
}

/// Digital pin path: drop the 4 LSBs, shift up by one and refill the low bits
/// from the top five magnitude bits.
pub fn expand_digital(sample: i32) -> i16 {
    let sample = sample & !0xf;
    ((sample << 1) | ((sample & 0x3e00) >> 9)) as i16
}
