// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use super::data::Coefficients;
use super::frame::FrameParameters;

/// Sub-cycle reload value. 0 would add the A' cycle of the TMS5110 slow mode.
const SUBC_RELOAD: u8 = 1;

/// Samples in one interpolation period (12 A/B cycle pairs plus one A cycle).
pub const SAMPLES_PER_PERIOD: u32 = 25;
/// Samples in one frame (eight interpolation periods).
pub const SAMPLES_PER_FRAME: u32 = 8 * SAMPLES_PER_PERIOD;

/// Interpolation period reload for each 2-bit rate value of the TMS5220C.
/// Other parts always reload 0.
pub const RATE_RELOAD: [u8; 4] = [0, 2, 4, 6];

/// Decoded parameter values driving the synthesizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    /// Energy.
    pub energy: i32,
    /// Pitch period in samples; 0 when unvoiced.
    pub pitch: i32,
    /// Reflection coefficients K1..K10.
    pub k: [i32; 10],
}

/// Parameter interpolator and timing generator.
///
/// Each sample advances the sub-cycle counter. Two sub-cycles (A and B) make
/// one parameter count (PC); on the B cycle of PC 0..11 the matching
/// parameter (energy, pitch, K1..K10) takes one interpolation step. PC 12 has
/// an A cycle only, after which the interpolation period (IP) advances. IP
/// selects the step size so that the parameters land exactly on the frame
/// targets when IP 0 completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interpolator {
    // Current Parameters
    energy: i32,
    pitch: i32,
    k: [i32; 10],
    // Timing
    subcycle: u8,
    pc: u8,
    ip: u8,
    // Control
    inhibit: bool,
    zpar: bool,
    uv_zpar: bool,
    pitch_zero: bool,
    old_silence: bool,
    old_unvoiced: bool,
}

impl Default for Interpolator {
    fn default() -> Self {
        let mut interpolator = Self {
            energy: 0,
            pitch: 0,
            k: [0; 10],
            subcycle: 0,
            pc: 0,
            ip: 0,
            inhibit: true,
            zpar: false,
            uv_zpar: false,
            pitch_zero: false,
            old_silence: true,
            old_unvoiced: true,
        };
        interpolator.reset(0);
        interpolator
    }
}

impl Interpolator {
    /// Current energy value.
    pub const fn energy(&self) -> i32 {
        self.energy
    }

    /// Current pitch period.
    pub const fn pitch(&self) -> i32 {
        self.pitch
    }

    /// Current reflection coefficients.
    pub const fn k(&self) -> &[i32; 10] {
        &self.k
    }

    /// All current values at once.
    pub const fn parameters(&self) -> Parameters {
        Parameters {
            energy: self.energy,
            pitch: self.pitch,
            k: self.k,
        }
    }

    /// Parameter counter, 0..=12.
    pub const fn pc(&self) -> u8 {
        self.pc
    }

    /// Interpolation period, 0..=7.
    pub const fn ip(&self) -> u8 {
        self.ip
    }

    /// Sub-cycle within the current parameter count.
    pub const fn subcycle(&self) -> u8 {
        self.subcycle
    }

    /// Interpolation is held off until IP 0.
    pub const fn is_inhibited(&self) -> bool {
        self.inhibit
    }

    /// All parameters are forced to zero.
    pub const fn zpar(&self) -> bool {
        self.zpar
    }

    /// K5..K10 are forced to zero.
    pub const fn uv_zpar(&self) -> bool {
        self.uv_zpar
    }

    /// Pitch counter is held in reset.
    pub const fn pitch_zero(&self) -> bool {
        self.pitch_zero
    }

    /// The frame being played out had zero energy.
    pub const fn old_silence(&self) -> bool {
        self.old_silence
    }

    /// The frame being played out is unvoiced; selects noise excitation.
    pub const fn old_unvoiced(&self) -> bool {
        self.old_unvoiced
    }

    /// True on the first sub-cycle of PC 12 in IP 0, where a new frame is loaded.
    pub const fn at_frame_boundary(&self) -> bool {
        self.ip == 0 && self.pc == 12 && self.subcycle == 1
    }

    /// Override the interpolation period.
    pub fn set_period(&mut self, ip: u8) {
        self.ip = ip & 0x07;
    }

    /// Release ZPAR/UV_ZPAR before a new frame is parsed.
    pub fn clear_zero_flags(&mut self) {
        self.zpar = false;
        self.uv_zpar = false;
    }

    /// Begin an utterance: zero everything and restart the frame timing.
    pub fn start_utterance(&mut self, ip_reload: u8) {
        self.zpar = true;
        self.uv_zpar = true;
        self.old_silence = true;
        self.old_unvoiced = true;
        self.subcycle = SUBC_RELOAD;
        self.pc = 0;
        self.ip = ip_reload;
    }

    /// Take a freshly parsed frame as the new interpolation target.
    pub fn load_frame(&mut self, new: &FrameParameters) {
        self.uv_zpar = new.is_unvoiced() || self.zpar;
        // Interpolation is held off across voicing changes, out of silence,
        // and from unvoiced into silence.
        self.inhibit = (!self.old_unvoiced && new.is_unvoiced())
            || (self.old_unvoiced && !new.is_unvoiced())
            || (self.old_silence && !new.is_silence())
            || (self.old_unvoiced && new.is_silence());
    }

    /// Step the parameter selected by PC towards `target`. Only acts on B cycles.
    pub fn interpolate(&mut self, target: &FrameParameters, coeffs: &Coefficients) {
        if self.subcycle != 2 {
            return;
        }
        let inhibit = self.inhibit && self.ip != 0;
        let shift = coeffs.interp_shift[self.ip as usize];
        let step = |current: i32, goal: i32, zero: bool| {
            if zero {
                0
            } else if inhibit {
                current
            } else {
                current + ((goal - current) >> shift)
            }
        };
        match self.pc {
            0 => {
                let goal = coeffs.energy[target.energy as usize];
                self.energy = step(self.energy, goal, self.zpar);
            }
            1 => {
                let goal = coeffs.pitch[target.pitch as usize];
                self.pitch = step(self.pitch, goal, self.zpar);
            }
            2..=11 => {
                let i = (self.pc - 2) as usize;
                let goal = coeffs.k[i][target.k[i] as usize];
                let zero = if i < 4 { self.zpar } else { self.uv_zpar };
                self.k[i] = step(self.k[i], goal, zero);
            }
            _ => {}
        }
    }

    /// Advance one sample. Returns `true` on RESETL4, the IP 7 to IP 0
    /// transition where the chip latches its talk state.
    pub fn advance(&mut self, speaking: bool, new: &FrameParameters) -> bool {
        let mut resetl4 = false;
        self.subcycle += 1;
        if self.subcycle == 2 && self.pc == 12 {
            // RESETF3
            if speaking {
                if self.ip == 7 && self.inhibit {
                    self.pitch_zero = true;
                }
                if self.ip == 0 && self.pitch_zero {
                    self.pitch_zero = false;
                }
            }
            if self.ip == 7 {
                if speaking {
                    self.old_silence = new.is_silence();
                    self.old_unvoiced = new.is_unvoiced();
                }
                resetl4 = true;
            }
            self.subcycle = SUBC_RELOAD;
            self.pc = 0;
            self.ip = (self.ip + 1) & 0x07;
        } else if self.subcycle == 3 {
            self.subcycle = SUBC_RELOAD;
            self.pc += 1;
        }
        resetl4
    }

    /// Power-on state.
    pub fn reset(&mut self, ip_reload: u8) {
        self.energy = 0;
        self.pitch = 0;
        self.k = [0; 10];
        self.subcycle = 0;
        self.pc = 0;
        self.ip = ip_reload;
        self.inhibit = true;
        self.zpar = false;
        self.uv_zpar = false;
        self.pitch_zero = false;
        self.old_silence = true;
        self.old_unvoiced = true;
    }
}
