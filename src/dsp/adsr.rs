// src/dsp/adsr.rs

//! Gate-triggered ADSR envelope generator with rates in samples.
//!
//! Drives the wah's frequency sweep: the gate opens on a threshold crossing,
//! the attack ramps the modulation value to 1.0, and with the sustain level
//! at 0.0 the decay stage brings it back down on its own — the "auto" part
//! of the auto-wah.

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum AdsrState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Clone, Copy, Debug)]
pub struct Adsr {
    attack_samples: f32,
    decay_samples: f32,
    release_samples: f32,
    sustain_level: f32,
    state: AdsrState,
    level: f32,
}

impl Adsr {
    pub fn new() -> Self {
        Self {
            attack_samples: 0.0,
            decay_samples: 0.0,
            release_samples: 0.0,
            sustain_level: 1.0,
            state: AdsrState::Idle,
            level: 0.0,
        }
    }

    pub fn set_attack_rate(&mut self, samples: f32) {
        self.attack_samples = samples;
    }

    pub fn set_decay_rate(&mut self, samples: f32) {
        self.decay_samples = samples;
    }

    pub fn set_release_rate(&mut self, samples: f32) {
        self.release_samples = samples;
    }

    pub fn set_sustain_level(&mut self, level: f32) {
        self.sustain_level = level.clamp(0.0, 1.0);
    }

    pub fn state(&self) -> AdsrState {
        self.state
    }

    /// Opens or closes the gate. Opening while a cycle is already running
    /// restarts the attack from the current level, never from zero.
    pub fn gate(&mut self, on: bool) {
        if on {
            self.state = AdsrState::Attack;
        } else if self.state != AdsrState::Idle {
            self.state = AdsrState::Release;
        }
    }

    pub fn reset(&mut self) {
        self.state = AdsrState::Idle;
        self.level = 0.0;
    }

    /// Advances the envelope by one sample and returns the current value.
    #[inline]
    pub fn process(&mut self) -> f32 {
        match self.state {
            AdsrState::Idle => 0.0,
            AdsrState::Attack => {
                if self.attack_samples > 0.0 {
                    self.level += 1.0 / self.attack_samples;
                } else {
                    self.level = 1.0;
                }
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.state = AdsrState::Decay;
                }
                self.level
            }
            AdsrState::Decay => {
                if self.decay_samples > 0.0 {
                    self.level -= (1.0 - self.sustain_level) / self.decay_samples;
                } else {
                    self.level = self.sustain_level;
                }
                if self.level <= self.sustain_level {
                    self.level = self.sustain_level;
                    self.state = AdsrState::Sustain;
                }
                self.level
            }
            AdsrState::Sustain => self.sustain_level,
            AdsrState::Release => {
                if self.release_samples > 0.0 {
                    self.level -= self.level / self.release_samples;
                } else {
                    self.level = 0.0;
                }
                if self.level <= 1e-4 {
                    self.level = 0.0;
                    self.state = AdsrState::Idle;
                }
                self.level
            }
        }
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new()
    }
}
