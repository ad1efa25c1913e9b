// src/params.rs

//! The shared parameter store for the wah effect.
//!
//! All fields are written by the MIDI callback thread and read by the audio
//! render thread. Floats are stored in `AtomicU32`s scaled by `PARAM_SCALER`;
//! the render thread never touches the filter or envelope shaper from here —
//! it takes a `ParamSnapshot` at the start of each block and applies any
//! changes itself (see `wah::WahEngine::apply_pending`).

use crate::dsp::FilterMode;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

// Scaler for storing float values in atomics.
pub const PARAM_SCALER: f32 = 1_000_000.0;

// Operating ranges for the MIDI-controlled parameters.
pub const MIN_BIAS: f32 = 300.0;
pub const MAX_BIAS: f32 = 1400.0;
pub const MIN_RESONANCE: f32 = 0.707;
pub const MAX_RESONANCE: f32 = 5.0;
pub const MIN_DECAY: f32 = 0.0;
pub const MAX_DECAY: f32 = 2.0;

/// Shared, MIDI-controllable parameters for the wah effect.
#[derive(Debug, Clone)]
pub struct WahParams {
    /// Filter mode (LP, HP, BP). Stored as a u32 (0, 1, or 2).
    mode: Arc<AtomicU32>,
    /// Gate threshold, 0.0 to 1.0. Stored as `sensitivity * PARAM_SCALER`.
    sensitivity: Arc<AtomicU32>,
    /// Resting center frequency in Hz. Stored as `bias * PARAM_SCALER`.
    bias: Arc<AtomicU32>,
    /// Filter Q. Stored as `resonance * PARAM_SCALER`.
    resonance: Arc<AtomicU32>,
    /// Wah decay time in seconds. Stored as `decay * PARAM_SCALER`.
    decay: Arc<AtomicU32>,
    /// Linear output gain, 0.0 to 1.0. Stored as `volume * PARAM_SCALER`.
    volume: Arc<AtomicU32>,
    /// Pending-update flag, set by every setter and consumed once per block
    /// by the render thread.
    dirty: Arc<AtomicBool>,
}

/// A plain-value copy of the store, taken once per audio block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub mode: FilterMode,
    pub sensitivity: f32,
    pub bias: f32,
    pub resonance: f32,
    pub decay: f32,
    pub volume: f32,
}

impl Default for WahParams {
    fn default() -> Self {
        Self {
            mode: Arc::new(AtomicU32::new(FilterMode::BandPass as u32)),
            sensitivity: Arc::new(AtomicU32::new((0.0001 * PARAM_SCALER) as u32)),
            bias: Arc::new(AtomicU32::new((MIN_BIAS * PARAM_SCALER) as u32)),
            resonance: Arc::new(AtomicU32::new((MIN_RESONANCE * PARAM_SCALER) as u32)),
            decay: Arc::new(AtomicU32::new((0.05 * PARAM_SCALER) as u32)),
            volume: Arc::new(AtomicU32::new((0.5 * PARAM_SCALER) as u32)),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl WahParams {
    pub fn mode(&self) -> FilterMode {
        FilterMode::from(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: FilterMode) {
        self.mode.store(mode as u32, Ordering::Relaxed);
        self.touch();
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity.load(Ordering::Relaxed) as f32 / PARAM_SCALER
    }

    pub fn set_sensitivity(&self, value: f32) {
        self.sensitivity
            .store((value * PARAM_SCALER) as u32, Ordering::Relaxed);
        self.touch();
    }

    pub fn bias(&self) -> f32 {
        self.bias.load(Ordering::Relaxed) as f32 / PARAM_SCALER
    }

    pub fn set_bias(&self, hz: f32) {
        self.bias.store((hz * PARAM_SCALER) as u32, Ordering::Relaxed);
        self.touch();
    }

    pub fn resonance(&self) -> f32 {
        self.resonance.load(Ordering::Relaxed) as f32 / PARAM_SCALER
    }

    pub fn set_resonance(&self, q: f32) {
        self.resonance
            .store((q * PARAM_SCALER) as u32, Ordering::Relaxed);
        self.touch();
    }

    pub fn decay(&self) -> f32 {
        self.decay.load(Ordering::Relaxed) as f32 / PARAM_SCALER
    }

    pub fn set_decay(&self, seconds: f32) {
        self.decay
            .store((seconds * PARAM_SCALER) as u32, Ordering::Relaxed);
        self.touch();
    }

    pub fn volume(&self) -> f32 {
        self.volume.load(Ordering::Relaxed) as f32 / PARAM_SCALER
    }

    pub fn set_volume(&self, gain: f32) {
        self.volume
            .store((gain * PARAM_SCALER) as u32, Ordering::Relaxed);
        self.touch();
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clears and returns the pending-update flag. Called once per audio
    /// block, before any samples are processed.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            mode: self.mode(),
            sensitivity: self.sensitivity(),
            bias: self.bias(),
            resonance: self.resonance(),
            decay: self.decay(),
            volume: self.volume(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        let params = WahParams::default();
        assert_eq!(params.mode(), FilterMode::BandPass);
        assert!((params.sensitivity() - 0.0001).abs() < 1e-6);
        assert!((params.bias() - 300.0).abs() < 1e-3);
        assert!((params.resonance() - 0.707).abs() < 1e-4);
        assert!((params.decay() - 0.05).abs() < 1e-4);
        assert!((params.volume() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn setters_round_trip_through_scaled_storage() {
        let params = WahParams::default();
        params.set_bias(854.8);
        assert!((params.bias() - 854.8).abs() < 1e-3);
        params.set_resonance(5.0);
        assert!((params.resonance() - 5.0).abs() < 1e-4);
        params.set_volume(1.0);
        assert!((params.volume() - 1.0).abs() < 1e-4);
        params.set_mode(FilterMode::HighPass);
        assert_eq!(params.mode(), FilterMode::HighPass);
    }

    #[test]
    fn dirty_flag_set_by_writes_and_cleared_by_take() {
        let params = WahParams::default();
        assert!(!params.take_dirty());
        params.set_volume(0.7);
        assert!(params.take_dirty());
        assert!(!params.take_dirty());
    }

    #[test]
    fn snapshot_reflects_current_values() {
        let params = WahParams::default();
        params.set_sensitivity(0.25);
        params.set_bias(1000.0);
        let snap = params.snapshot();
        assert!((snap.sensitivity - 0.25).abs() < 1e-5);
        assert!((snap.bias - 1000.0).abs() < 1e-3);
        assert_eq!(snap.mode, FilterMode::BandPass);
    }

    #[test]
    fn clones_share_the_same_storage() {
        let params = WahParams::default();
        let other = params.clone();
        other.set_volume(0.9);
        assert!((params.volume() - 0.9).abs() < 1e-4);
        assert!(params.take_dirty());
    }
}
