// This file is part of tms52xx.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Ten stage lattice filter, US patent 4,209,804 table I, evaluated in the
//! order the chip's multiplier pipeline does it.
//!
//! Notation: `u[n]` is Y(n+1) on the forward path, `x[n]` is b(n+1) on the
//! backward path, `k[n]` is K(n+1).

/// Sign-extend the low `bits` of `value`.
#[inline]
const fn wrap(value: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

/// The chip's 10 x 15 bit multiplier. Operands wrap to their bus widths.
#[inline]
pub const fn matrix_multiply(a: i32, b: i32) -> i32 {
    (wrap(a, 10) * wrap(b, 15)) >> 9
}

/// Force a filter result onto the output bus, sign plus 14 bits. The final
/// K1 stage addition can overflow it.
#[inline]
pub const fn wrap_output(sample: i32) -> i32 {
    wrap(sample, 15)
}

/// Lattice filter delay state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LatticeFilter {
    u: [i32; 11],
    x: [i32; 10],
}

impl LatticeFilter {
    /// Forward path values Y1..Y11 from the last sample.
    pub const fn u(&self) -> &[i32; 11] {
        &self.u
    }

    /// Backward path delay values b1..b10.
    pub const fn x(&self) -> &[i32; 10] {
        &self.x
    }

    /// Run one sample of `input` (Y11) through the filter.
    pub fn clock(&mut self, input: i32, k: &[i32; 10]) -> i32 {
        self.u[10] = input;
        for i in (0..10).rev() {
            self.u[i] = self.u[i + 1] - matrix_multiply(k[i], self.x[i]);
        }
        for i in (1..10).rev() {
            self.x[i] = self.x[i - 1] + matrix_multiply(k[i - 1], self.u[i - 1]);
        }
        self.x[0] = self.u[0];
        self.u[0]
    }

    /// Clear the delay line.
    pub fn reset(&mut self) {
        self.u = [0; 11];
        self.x = [0; 10];
    }
}
