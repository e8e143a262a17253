//! Mixer filter - volume and stereo panning

use std::f32::consts::FRAC_PI_4;

use super::Filter;
use crate::buffer::SampleBuffer;

/// Panning law used to derive the channel gain pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanLaw {
    /// Linear law: `2 * vol * (1 ± pan) / 2`
    Linear,
    /// Constant power (equal loudness)
    #[default]
    EqualPower,
}

/// Volume/pan stage with a cached gain pair
#[derive(Debug, Clone, PartialEq)]
pub struct Mixer {
    volume: f32,
    /// Panning (-1.0 to 1.0)
    pan: f32,
    law: PanLaw,
    gain: [f32; 2],
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(1.0, 0.0, PanLaw::EqualPower)
    }
}

impl Mixer {
    pub fn new(volume: f32, pan: f32, law: PanLaw) -> Self {
        let mut mixer = Self {
            volume: volume.max(0.0),
            pan: pan.clamp(-1.0, 1.0),
            law,
            gain: [0.0; 2],
        };
        mixer.update_gain();
        mixer
    }

    /// Gain pair for `volume` and `pan` under `law`
    pub fn gain_pair(law: PanLaw, volume: f32, pan: f32) -> [f32; 2] {
        match law {
            PanLaw::Linear => [
                2.0 * volume * (1.0 + pan) / 2.0,
                2.0 * volume * (1.0 - pan) / 2.0,
            ],
            PanLaw::EqualPower => {
                let angle = (1.0 + pan) * FRAC_PI_4;
                [volume * angle.cos(), volume * angle.sin()]
            }
        }
    }

    fn update_gain(&mut self) {
        self.gain = Self::gain_pair(self.law, self.volume, self.pan);
    }

    /// Set volume and pan together
    pub fn set(&mut self, volume: f32, pan: f32) {
        self.volume = volume.max(0.0);
        self.pan = pan.clamp(-1.0, 1.0);
        self.update_gain();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
        self.update_gain();
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
        self.update_gain();
    }

    pub fn set_law(&mut self, law: PanLaw) {
        self.law = law;
        self.update_gain();
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn law(&self) -> PanLaw {
        self.law
    }

    /// Current `[left, right]` gains
    #[inline]
    pub fn gain(&self) -> [f32; 2] {
        self.gain
    }

    /// Apply the gain pair to one stereo frame
    #[inline]
    pub fn apply_frame(&self, frame: &mut [f32; 2]) {
        frame[0] *= self.gain[0];
        frame[1] *= self.gain[1];
    }
}

impl Filter for Mixer {
    fn reset_state(&mut self) {
        self.update_gain();
    }

    fn apply(&mut self, buffer: &mut SampleBuffer<f32>) {
        if buffer.channels() == 1 {
            for sample in buffer.as_mut_slice() {
                *sample *= self.volume;
            }
            return;
        }

        for frame in buffer.frames_mut() {
            frame[0] *= self.gain[0];
            frame[1] *= self.gain[1];
        }
    }

    fn name(&self) -> &'static str {
        "Mixer"
    }
}
