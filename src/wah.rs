// src/wah.rs

//! The auto-wah engine: envelope detection, hysteresis gating, ADSR-driven
//! frequency mapping, and the per-block render loop.
//!
//! The engine is owned by the audio output callback. Pending parameter
//! changes from the MIDI thread are applied once at the start of each block,
//! never mid-block; the per-sample path is allocation-free and lock-free.

use crate::dsp::{Adsr, Biquad};
use crate::params::{ParamSnapshot, WahParams, MAX_BIAS};
use log::debug;

// Fixed attack/release of the wah sweep, in seconds.
const WAH_ATTACK: f32 = 0.05;
const WAH_RELEASE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEdge {
    Rising,
    Falling,
}

/// Tracks threshold crossings of the rectified input envelope.
#[derive(Debug, Clone, Copy)]
pub struct GateDetector {
    previous_envelope: f32,
    high: bool,
}

impl GateDetector {
    pub fn new() -> Self {
        Self {
            previous_envelope: 0.0,
            high: false,
        }
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Feeds one envelope sample and returns at most one edge. The previous
    /// envelope is updated unconditionally, edge or not.
    #[inline]
    pub fn update(&mut self, envelope: f32, sensitivity: f32) -> Option<GateEdge> {
        let edge = if self.previous_envelope < sensitivity && envelope >= sensitivity {
            self.high = true;
            Some(GateEdge::Rising)
        } else if self.previous_envelope >= sensitivity && envelope < sensitivity {
            self.high = false;
            Some(GateEdge::Falling)
        } else {
            None
        };
        self.previous_envelope = envelope;
        edge
    }
}

impl Default for GateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps the shaper's 0..1 modulation value into an absolute center frequency
/// between the resting bias and the fixed ceiling. The caller keeps `bias`
/// within `[MIN_BIAS, MAX_BIAS]`; no clamping happens here.
#[inline]
pub fn map_frequency(modulation: f32, bias: f32) -> f32 {
    bias + modulation * (MAX_BIAS - bias)
}

pub struct WahEngine {
    params: WahParams,
    applied: ParamSnapshot,
    filter: Biquad,
    shaper: Adsr,
    detector: GateDetector,
    sample_rate: f32,
}

impl WahEngine {
    pub fn new(sample_rate: f32, params: WahParams) -> Self {
        let applied = params.snapshot();
        let filter = Biquad::new(applied.bias, sample_rate, applied.mode, applied.resonance);

        let mut shaper = Adsr::new();
        shaper.set_attack_rate(WAH_ATTACK * sample_rate);
        shaper.set_release_rate(WAH_RELEASE * sample_rate);
        shaper.set_decay_rate(applied.decay * sample_rate);
        shaper.set_sustain_level(0.0);

        Self {
            params,
            applied,
            filter,
            shaper,
            detector: GateDetector::new(),
            sample_rate,
        }
    }

    /// Applies any parameter changes written by the MIDI thread since the
    /// last block. The filter and shaper are only ever reconfigured here,
    /// on the render thread, at a block boundary.
    fn apply_pending(&mut self) {
        if !self.params.take_dirty() {
            return;
        }
        let next = self.params.snapshot();

        if next.mode != self.applied.mode {
            self.filter.set_mode(next.mode);
        }
        if next.resonance != self.applied.resonance {
            self.filter.set_q(next.resonance);
        }
        if next.bias != self.applied.bias {
            self.filter.set_fc(next.bias);
        }
        if next.decay != self.applied.decay {
            self.shaper.set_decay_rate(next.decay * self.sample_rate);
        }

        self.applied = next;
        debug!("applied params: {:?} coeffs: {:?}", next, self.filter.coefficients());
    }

    /// Processes one block of mono samples in place.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        self.apply_pending();
        let p = self.applied;

        for sample in buffer.iter_mut() {
            let envelope = sample.abs();

            match self.detector.update(envelope, p.sensitivity) {
                Some(GateEdge::Rising) => {
                    debug!("gate HIGH");
                    self.shaper.gate(true);
                }
                Some(GateEdge::Falling) => {
                    debug!("gate LOW");
                    self.shaper.gate(false);
                }
                None => {}
            }

            if p.sensitivity > 0.0 {
                let fc = map_frequency(self.shaper.process(), p.bias);
                self.filter.set_fc(fc);
            }

            *sample = self.filter.process(*sample) * p.volume;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::FilterMode;
    use crate::params::{MAX_DECAY, MAX_RESONANCE, MIN_BIAS};

    const SAMPLE_RATE: f32 = 44100.0;

    #[test]
    fn gate_fires_exactly_once_per_crossing() {
        let mut detector = GateDetector::new();
        let threshold = 0.5;
        let envelope = [0.0, 0.2, 0.6, 0.8, 0.7, 0.4, 0.1, 0.6, 0.3];
        let mut edges = Vec::new();
        for &e in &envelope {
            if let Some(edge) = detector.update(e, threshold) {
                edges.push(edge);
            }
        }
        assert_eq!(
            edges,
            vec![
                GateEdge::Rising,
                GateEdge::Falling,
                GateEdge::Rising,
                GateEdge::Falling
            ]
        );
    }

    #[test]
    fn no_edge_while_staying_on_one_side() {
        let mut detector = GateDetector::new();
        for &e in &[0.1, 0.2, 0.3, 0.4, 0.49] {
            assert_eq!(detector.update(e, 0.5), None);
        }
        assert!(!detector.is_high());
        assert_eq!(detector.update(0.9, 0.5), Some(GateEdge::Rising));
        for &e in &[0.6, 0.7, 0.99, 0.5] {
            assert_eq!(detector.update(e, 0.5), None);
        }
        assert!(detector.is_high());
    }

    #[test]
    fn sample_on_the_threshold_counts_as_high() {
        let mut detector = GateDetector::new();
        assert_eq!(detector.update(0.5, 0.5), Some(GateEdge::Rising));
    }

    #[test]
    fn mapped_frequency_is_bounded_and_monotone() {
        let bias = 300.0;
        let mut last = 0.0;
        for i in 0..=100 {
            let m = i as f32 / 100.0;
            let fc = map_frequency(m, bias);
            assert!((bias..=MAX_BIAS).contains(&fc));
            assert!(fc >= last);
            last = fc;
        }
        assert_eq!(map_frequency(0.0, bias), bias);
        assert_eq!(map_frequency(1.0, bias), MAX_BIAS);
        // With bias at the ceiling there is no sweep range left.
        assert_eq!(map_frequency(0.5, MAX_BIAS), MAX_BIAS);
    }

    #[test]
    fn zero_sensitivity_disables_modulation() {
        let params = WahParams::default();
        params.set_sensitivity(0.0);
        let mut engine = WahEngine::new(SAMPLE_RATE, params);
        let fc_before = engine.filter.fc();

        let mut block = vec![0.9f32; 512];
        engine.process_block(&mut block);
        assert_eq!(engine.filter.fc(), fc_before);
    }

    #[test]
    fn silent_input_never_gates_and_scales_by_volume() {
        let params = WahParams::default();
        params.set_sensitivity(0.0001);
        params.set_volume(0.5);
        let mut engine = WahEngine::new(SAMPLE_RATE, params);
        let bias = engine.applied.bias;

        let mut block = vec![0.0f32; 1024];
        engine.process_block(&mut block);

        assert!(!engine.detector.is_high());
        assert_eq!(engine.filter.fc(), bias);
        // Zero in, zero out: volume scaling of silence is still silence.
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn impulse_produces_one_rising_then_one_falling_edge() {
        let params = WahParams::default();
        params.set_sensitivity(0.1);
        let mut engine = WahEngine::new(SAMPLE_RATE, params);

        let was_high = engine.detector.is_high();
        assert!(!was_high);

        let mut block = vec![0.0f32; 256];
        block[10] = 0.8;
        engine.process_block(&mut block);

        // The impulse crossed up on sample 10 and back down on sample 11;
        // the gate ends low and the shaper was triggered.
        assert!(!engine.detector.is_high());
        assert!(engine.filter.fc() > engine.applied.bias);
    }

    #[test]
    fn sweep_rises_while_envelope_stays_above_threshold() {
        let params = WahParams::default();
        params.set_sensitivity(0.1);
        params.set_decay(MAX_DECAY);
        let mut engine = WahEngine::new(SAMPLE_RATE, params);

        let mut block = vec![0.9f32; 512];
        engine.process_block(&mut block);
        let fc_early = engine.filter.fc();

        let mut block = vec![0.9f32; 512];
        engine.process_block(&mut block);
        let fc_later = engine.filter.fc();

        assert!(engine.detector.is_high());
        assert!(fc_early > engine.applied.bias);
        // Attack is 0.05 s (~2205 samples); still climbing in the second block.
        assert!(fc_later > fc_early);
        assert!(fc_later <= MAX_BIAS);
    }

    #[test]
    fn pending_changes_apply_at_block_start() {
        let params = WahParams::default();
        let mut engine = WahEngine::new(SAMPLE_RATE, params.clone());
        // Drain the initial state.
        let mut block = vec![0.0f32; 64];
        engine.process_block(&mut block);

        params.set_mode(FilterMode::LowPass);
        params.set_resonance(MAX_RESONANCE);
        params.set_bias(1000.0);
        params.set_decay(1.0);

        let mut block = vec![0.0f32; 64];
        engine.process_block(&mut block);

        assert_eq!(engine.filter.mode(), FilterMode::LowPass);
        assert!((engine.filter.q() - MAX_RESONANCE).abs() < 1e-4);
        assert!((engine.filter.fc() - 1000.0).abs() < 1e-2);
        assert!((engine.applied.decay - 1.0).abs() < 1e-4);
    }

    #[test]
    fn repeated_identical_writes_change_nothing_further() {
        let params = WahParams::default();
        let mut engine = WahEngine::new(SAMPLE_RATE, params.clone());

        params.set_bias(854.8);
        let mut block = vec![0.0f32; 64];
        engine.process_block(&mut block);
        let applied_once = engine.applied;
        let coeffs_once = engine.filter.coefficients();

        params.set_bias(854.8);
        let mut block = vec![0.0f32; 64];
        engine.process_block(&mut block);

        assert_eq!(engine.applied, applied_once);
        assert_eq!(engine.filter.coefficients(), coeffs_once);
    }

    #[test]
    fn bias_sweep_works_with_gating_disabled() {
        // With sensitivity off, bias acts as a manually swept filter.
        let params = WahParams::default();
        params.set_sensitivity(0.0);
        let mut engine = WahEngine::new(SAMPLE_RATE, params.clone());

        let mut block = vec![0.5f32; 64];
        engine.process_block(&mut block);
        assert!((engine.filter.fc() - MIN_BIAS).abs() < 1e-2);

        params.set_bias(1200.0);
        let mut block = vec![0.5f32; 64];
        engine.process_block(&mut block);
        assert!((engine.filter.fc() - 1200.0).abs() < 1e-2);
    }
}
