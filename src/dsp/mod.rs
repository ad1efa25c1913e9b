// src/dsp/mod.rs

pub mod adsr;
pub mod biquad;

pub use adsr::{Adsr, AdsrState};
pub use biquad::{Biquad, BiquadCoeffs, FilterMode};
