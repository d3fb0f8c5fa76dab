// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Coefficient ROMs of the supported parts.
//!
//! Energy and pitch are stored as the raw ROM values. Reflection coefficients
//! are 10-bit signed values scaled so that 512 represents 1.0.

use super::ChipVariant;

/// Contents of one variant's parameter ROM plus the frame field layout.
#[derive(Debug)]
pub struct Coefficients {
    /// Number of reflection coefficients per voiced frame.
    pub num_k: usize,
    /// Width of the energy field.
    pub energy_bits: u8,
    /// Width of the pitch field.
    pub pitch_bits: u8,
    /// Width of each K field.
    pub k_bits: [u8; 10],
    /// Energy ROM, indexed by the 4-bit energy field.
    pub energy: [i32; 16],
    /// Pitch period ROM in samples, indexed by the 6-bit pitch field.
    pub pitch: [i32; 64],
    /// Reflection coefficient ROMs K1..K10.
    pub k: [&'static [i32]; 10],
    /// Chirp ROM used as the voiced excitation waveform.
    pub chirp: [i8; 52],
    /// Interpolation right-shift, indexed by the interpolation period.
    pub interp_shift: [u8; 8],
}

impl Coefficients {
    /// Energy index reserved for stop frames.
    pub const fn stop_energy(&self) -> u8 {
        ((1u16 << self.energy_bits) - 1) as u8
    }
}

const ENERGY: [i32; 16] = [0, 1, 2, 3, 4, 6, 8, 11, 16, 23, 33, 47, 63, 85, 114, 0];

const K_BITS: [u8; 10] = [5, 5, 4, 4, 4, 4, 4, 3, 3, 3];

/// Chirp ROM of the later (TMS5220 era) parts. Everything past entry 20 is zero.
#[rustfmt::skip]
const CHIRP: [i8; 52] = [
    0x00, 0x03, 0x0f, 0x28, 0x4c, 0x6c, 0x71, 0x50,
    0x25, 0x26, 0x4c, 0x44, 0x1a, 0x32, 0x3b, 0x13,
    0x37, 0x1a, 0x25, 0x1f, 0x1d, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

// IP counts 1,2,..,7,0 across a frame: divide by 8,8,8,4,4,2,2,1.
const INTERP_SHIFT: [u8; 8] = [0, 3, 3, 3, 2, 2, 1, 1];

#[rustfmt::skip]
const PITCH_5220: [i32; 64] = [
      0,  15,  16,  17,  18,  19,  20,  21,  22,  23,  24,  25,  26,  27,  28,  29,
     30,  31,  32,  33,  34,  35,  36,  37,  38,  39,  40,  41,  42,  44,  46,  48,
     50,  52,  53,  56,  58,  60,  62,  65,  68,  70,  72,  76,  78,  80,  84,  86,
     91,  94,  98, 101, 105, 109, 114, 118, 122, 127, 132, 137, 142, 148, 153, 159,
];

#[rustfmt::skip]
const PITCH_5200: [i32; 64] = [
      0,  14,  15,  16,  17,  18,  19,  20,  21,  22,  23,  24,  25,  26,  27,  28,
     29,  30,  31,  32,  34,  36,  38,  40,  41,  43,  45,  48,  49,  51,  54,  55,
     57,  60,  62,  64,  68,  72,  74,  76,  81,  85,  87,  90,  96,  99, 103, 107,
    112, 117, 122, 127, 133, 139, 145, 151, 157, 164, 171, 178, 186, 194, 202, 211,
];

#[rustfmt::skip]
const K1: [i32; 32] = [
    -501, -498, -497, -495, -493, -491, -488, -482,
    -478, -474, -469, -464, -459, -452, -445, -437,
    -412, -380, -339, -288, -227, -158,  -81,   -1,
      80,  157,  226,  287,  337,  379,  411,  436,
];

#[rustfmt::skip]
const K2: [i32; 32] = [
    -328, -303, -274, -244, -211, -175, -138,  -99,
     -59,  -18,   24,   64,  105,  143,  180,  215,
     248,  278,  306,  331,  354,  374,  392,  408,
     422,  435,  445,  455,  463,  470,  476,  506,
];

#[rustfmt::skip]
const K3: [i32; 16] = [
    -441, -387, -333, -279, -225, -171, -117,  -63,
      -9,   45,   98,  152,  206,  260,  314,  368,
];

#[rustfmt::skip]
const K4: [i32; 16] = [
    -328, -273, -217, -161, -106,  -50,    5,   61,
     116,  172,  228,  283,  339,  394,  450,  506,
];

#[rustfmt::skip]
const K5: [i32; 16] = [
    -328, -282, -235, -189, -142,  -96,  -50,   -3,
      43,   90,  136,  182,  229,  275,  322,  368,
];

#[rustfmt::skip]
const K6: [i32; 16] = [
    -256, -212, -168, -123,  -79,  -35,   10,   54,
      98,  143,  187,  232,  276,  320,  365,  409,
];

#[rustfmt::skip]
const K7: [i32; 16] = [
    -308, -260, -212, -164, -117,  -69,  -21,   27,
      75,  122,  170,  218,  266,  314,  361,  409,
];

const K8: [i32; 8] = [-256, -161, -66, 29, 124, 219, 314, 409];
const K9: [i32; 8] = [-256, -176, -96, -15, 65, 146, 226, 307];
const K10: [i32; 8] = [-205, -132, -59, 14, 87, 160, 234, 307];

static TMS5220_COEFFS: Coefficients = Coefficients {
    num_k: 10,
    energy_bits: 4,
    pitch_bits: 6,
    k_bits: K_BITS,
    energy: ENERGY,
    pitch: PITCH_5220,
    k: [&K1, &K2, &K3, &K4, &K5, &K6, &K7, &K8, &K9, &K10],
    chirp: CHIRP,
    interp_shift: INTERP_SHIFT,
};

// TMC0285 ROM: same K tables, wider and coarser pitch range.
static TMC0285_COEFFS: Coefficients = Coefficients {
    num_k: 10,
    energy_bits: 4,
    pitch_bits: 6,
    k_bits: K_BITS,
    energy: ENERGY,
    pitch: PITCH_5200,
    k: [&K1, &K2, &K3, &K4, &K5, &K6, &K7, &K8, &K9, &K10],
    chirp: CHIRP,
    interp_shift: INTERP_SHIFT,
};

impl ChipVariant {
    /// Parameter ROM used by this variant.
    pub fn coefficients(self) -> &'static Coefficients {
        match self {
            Self::Tms5220 | Self::Tms5220C | Self::Cd2501ecd => &TMS5220_COEFFS,
            Self::Tms5200 | Self::Cd2501e => &TMC0285_COEFFS,
        }
    }
}
