// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use super::lattice::matrix_multiply;

/// LFSR seed after reset.
const RNG_SEED: u16 = 0x1fff;
const RNG_MASK: u16 = 0x1fff;
/// The noise register is clocked once per T-cycle, 20 per sample.
const RNG_STEPS_PER_SAMPLE: usize = 20;
/// Unvoiced excitation is half the chirp ROM's full scale, either sign.
const NOISE_LEVEL: i32 = 0x40;
/// The chirp address counter stops advancing at the last ROM entry.
const CHIRP_LAST: u16 = 51;
const PITCH_COUNT_MASK: u16 = 0x1ff;

/// Which source drives the lattice filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Excitation {
    /// Periodic chirp ROM playback.
    Chirp,
    /// LFSR noise.
    Noise,
}

/// Excitation source.
///
/// Voiced frames replay the chirp ROM once per pitch period; unvoiced frames
/// use a 13-bit LFSR (x^13 + x^4 + x^3 + x + 1 feedback from bits 12, 3, 2
/// and 0). The result is scaled by the energy of the *previous* sample,
/// which is what the chip's pipelined multiplier sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExcitationGenerator {
    pitch_count: u16,
    rng: u16,
    previous_energy: i32,
}

impl Default for ExcitationGenerator {
    fn default() -> Self {
        Self {
            pitch_count: 0,
            rng: RNG_SEED,
            previous_energy: 0,
        }
    }
}

impl ExcitationGenerator {
    /// Chirp ROM address.
    pub const fn pitch_count(&self) -> u16 {
        self.pitch_count
    }

    /// Noise register contents.
    pub const fn rng(&self) -> u16 {
        self.rng
    }

    /// Energy used for the next sample.
    pub const fn previous_energy(&self) -> i32 {
        self.previous_energy
    }

    /// Raw excitation value before energy scaling.
    pub fn excitation(&self, source: Excitation, chirp: &[i8; 52]) -> i32 {
        match source {
            Excitation::Noise => {
                if self.rng & 1 != 0 {
                    !0x3f
                } else {
                    NOISE_LEVEL
                }
            }
            Excitation::Chirp => chirp[self.pitch_count.min(CHIRP_LAST) as usize] as i32,
        }
    }

    /// Produce the energy-scaled input of the lattice filter (Y11).
    ///
    /// Clocks the noise register and latches `energy` for the next sample.
    /// While `zpar` is set the multiplier sees zero energy.
    pub fn sample(
        &mut self,
        source: Excitation,
        chirp: &[i8; 52],
        energy: i32,
        zpar: bool,
    ) -> i32 {
        let excitation = self.excitation(source, chirp);
        self.clock_noise();
        let previous_energy = if zpar { 0 } else { self.previous_energy };
        let scaled = matrix_multiply(previous_energy, excitation << 6);
        self.previous_energy = energy;
        scaled
    }

    /// Step the chirp address; it wraps at the pitch period and is held at
    /// zero while `pitch_zero` is latched.
    pub fn advance_pitch(&mut self, pitch: i32, pitch_zero: bool) {
        self.pitch_count += 1;
        if self.pitch_count as i32 >= pitch || pitch_zero {
            self.pitch_count = 0;
        }
        self.pitch_count &= PITCH_COUNT_MASK;
    }

    fn clock_noise(&mut self) {
        for _ in 0..RNG_STEPS_PER_SAMPLE {
            let bit = ((self.rng >> 12) ^ (self.rng >> 3) ^ (self.rng >> 2) ^ self.rng) & 1;
            self.rng = ((self.rng << 1) | bit) & RNG_MASK;
        }
    }

    /// Power-on state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
