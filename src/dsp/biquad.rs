// src/dsp/biquad.rs

//! A second-order IIR (biquad) filter.
//!
//! Direct Form I with coefficients from Robert Bristow-Johnson's Audio EQ
//! Cookbook. The wah engine retunes the center frequency every sample while
//! gating is active, so `set_fc` recomputes coefficients immediately.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FilterMode {
    LowPass = 0,
    HighPass = 1,
    BandPass = 2,
}

impl From<u32> for FilterMode {
    fn from(val: u32) -> Self {
        match val {
            1 => FilterMode::HighPass,
            2 => FilterMode::BandPass,
            _ => FilterMode::LowPass,
        }
    }
}

/// The filter's current normalized coefficients, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

#[derive(Debug, Clone)]
pub struct Biquad {
    mode: FilterMode,
    fc: f32,
    q: f32,
    sample_rate: f32,

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    // Filter state (previous input/output samples)
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(fc: f32, sample_rate: f32, mode: FilterMode, q: f32) -> Self {
        let mut filter = Self {
            mode,
            fc,
            q,
            sample_rate,
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
        self.update_coefficients();
    }

    /// Center frequency in Hz.
    pub fn fc(&self) -> f32 {
        self.fc
    }

    pub fn set_fc(&mut self, hz: f32) {
        self.fc = hz;
        self.update_coefficients();
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q;
        self.update_coefficients();
    }

    pub fn coefficients(&self) -> BiquadCoeffs {
        BiquadCoeffs {
            b0: self.b0,
            b1: self.b1,
            b2: self.b2,
            a1: self.a1,
            a2: self.a2,
        }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn update_coefficients(&mut self) {
        let q = self.q.max(0.001);
        // Keep the frequency away from DC and Nyquist.
        let freq = self.fc.clamp(1.0, self.sample_rate * 0.49);

        let omega = 2.0 * PI * freq / self.sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match self.mode {
            FilterMode::LowPass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterMode::HighPass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            // Constant 0 dB peak gain.
            FilterMode::BandPass => (
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}
