// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Speech frames and their bitstream encoding.
//!
//! A frame is one of:
//!
//! | kind     | fields                                   | bits |
//! |----------|------------------------------------------|------|
//! | silence  | E=0                                      | 4    |
//! | stop     | E=15                                     | 4    |
//! | repeat   | E, R=1, P                                | 11   |
//! | unvoiced | E, R=0, P=0, K1..K4                      | 29   |
//! | voiced   | E, R=0, P, K1..K10                       | 50   |

use super::data::Coefficients;

/// Anything the parser can pull frame bits from.
pub trait FrameSource {
    /// Pull `count` bits, first bit in the most significant position.
    /// `None` means the source ran dry mid-field.
    fn extract_bits(&mut self, count: u8) -> Option<u16>;

    /// Checked after every field; `true` stops the parse early.
    fn ran_out(&mut self) -> bool;
}

/// ROM indices of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameParameters {
    /// Energy index.
    pub energy: u8,
    /// Pitch index; 0 selects noise excitation.
    pub pitch: u8,
    /// Reflection coefficient indices K1..K10.
    pub k: [u8; 10],
}

impl FrameParameters {
    /// Indices loaded when an utterance starts.
    ///
    /// These decode to values close to zero in every K ROM.
    pub const fn utterance_start() -> Self {
        Self {
            energy: 0,
            pitch: 0,
            k: [0, 0, 0, 0, 0xf, 0xf, 0xf, 0x7, 0x7, 0x7],
        }
    }

    /// Energy index 0.
    pub const fn is_silence(&self) -> bool {
        self.energy == 0
    }

    /// Energy index 15.
    pub const fn is_stop(&self) -> bool {
        self.energy == 0x0f
    }

    /// Pitch index 0.
    pub const fn is_unvoiced(&self) -> bool {
        self.pitch == 0
    }

    /// Truncate every index to the width of its frame field, so that it
    /// stays within the ROMs of `coeffs`.
    pub fn masked(mut self, coeffs: &Coefficients) -> Self {
        let mask = |bits: u8| ((1u16 << bits) - 1) as u8;
        self.energy &= mask(coeffs.energy_bits);
        self.pitch &= mask(coeffs.pitch_bits);
        for (index, &bits) in self.k.iter_mut().zip(coeffs.k_bits.iter()) {
            *index &= mask(bits);
        }
        self
    }
}

/// What kind of frame the parser found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Zero energy, no further fields.
    Silence,
    /// Stop code, ends the utterance.
    Stop,
    /// New energy and pitch, coefficients carried over.
    Repeat,
    /// Noise excited, K1..K4 only.
    Unvoiced,
    /// Chirp excited, all ten coefficients.
    Voiced,
    /// The source ran dry before the frame was complete; treated as silence.
    Underflow,
}

/// Decode one frame from `source`.
///
/// `previous` supplies the indices a repeat or partial frame keeps. On
/// underflow the fields read so far are kept but the energy is forced to 0,
/// so the frame plays as silence.
pub fn parse<S: FrameSource>(
    previous: &FrameParameters,
    coeffs: &Coefficients,
    source: &mut S,
) -> (FrameParameters, FrameKind) {
    let mut frame = *previous;
    let kind = parse_fields(&mut frame, coeffs, source);
    if kind == FrameKind::Underflow {
        frame.energy = 0;
    }
    (frame, kind)
}

fn parse_fields<S: FrameSource>(
    frame: &mut FrameParameters,
    coeffs: &Coefficients,
    source: &mut S,
) -> FrameKind {
    macro_rules! field {
        ($bits:expr) => {
            match source.extract_bits($bits) {
                Some(value) => value as u8,
                None => return FrameKind::Underflow,
            }
        };
    }

    if source.ran_out() {
        return FrameKind::Underflow;
    }
    frame.energy = field!(coeffs.energy_bits);
    if frame.energy == 0 {
        return FrameKind::Silence;
    }
    if frame.energy == coeffs.stop_energy() {
        return FrameKind::Stop;
    }
    if source.ran_out() {
        return FrameKind::Underflow;
    }

    let repeat = field!(1) != 0;
    if source.ran_out() {
        return FrameKind::Underflow;
    }
    frame.pitch = field!(coeffs.pitch_bits);
    if repeat {
        return FrameKind::Repeat;
    }
    if source.ran_out() {
        return FrameKind::Underflow;
    }

    for i in 0..4 {
        frame.k[i] = field!(coeffs.k_bits[i]);
        if (frame.pitch != 0 || i < 3) && source.ran_out() {
            return FrameKind::Underflow;
        }
    }
    // Unvoiced frames stop after K4; K5..K10 are zeroed during interpolation.
    if frame.pitch == 0 {
        return FrameKind::Unvoiced;
    }

    let last = coeffs.num_k - 1;
    for i in 4..coeffs.num_k {
        frame.k[i] = field!(coeffs.k_bits[i]);
        if i < last && source.ran_out() {
            return FrameKind::Underflow;
        }
    }
    FrameKind::Voiced
}
