//! Lip-sync frames and the per-tick smoother.
//!
//! Frames arrive at their own cadence; only the latest one is kept as the
//! target. Each tick the smoother moves `current` a fixed fraction toward the
//! target, adds a small tremor to the dominant vowel while speaking and closes
//! the mouth geometrically once the received energy drops below threshold.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{rng_for, LipsyncConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vowel {
    A,
    I,
    U,
    E,
    O,
}

impl Vowel {
    pub const ALL: [Vowel; 5] = [Vowel::A, Vowel::I, Vowel::U, Vowel::E, Vowel::O];

    /// Morph channel driven by this vowel.
    pub fn channel(self) -> &'static str {
        match self {
            Vowel::A => "Fcl_MTH_A",
            Vowel::I => "Fcl_MTH_I",
            Vowel::U => "Fcl_MTH_U",
            Vowel::E => "Fcl_MTH_E",
            Vowel::O => "Fcl_MTH_O",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Vowel intensities plus speech energy. Keys accept both the short vowel
/// names (`A`..`O`) and the morph channel names (`Fcl_MTH_A`..).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LipsyncFrame {
    #[serde(rename = "A", alias = "Fcl_MTH_A", default)]
    pub a: f32,
    #[serde(rename = "I", alias = "Fcl_MTH_I", default)]
    pub i: f32,
    #[serde(rename = "U", alias = "Fcl_MTH_U", default)]
    pub u: f32,
    #[serde(rename = "E", alias = "Fcl_MTH_E", default)]
    pub e: f32,
    #[serde(rename = "O", alias = "Fcl_MTH_O", default)]
    pub o: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f32>,
}

impl LipsyncFrame {
    pub fn new(a: f32, i: f32, u: f32, e: f32, o: f32) -> Self {
        Self {
            a,
            i,
            u,
            e,
            o,
            energy: None,
        }
    }

    pub fn with_energy(mut self, energy: f32) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn get(&self, vowel: Vowel) -> f32 {
        match vowel {
            Vowel::A => self.a,
            Vowel::I => self.i,
            Vowel::U => self.u,
            Vowel::E => self.e,
            Vowel::O => self.o,
        }
    }

    pub fn set(&mut self, vowel: Vowel, value: f32) {
        match vowel {
            Vowel::A => self.a = value,
            Vowel::I => self.i = value,
            Vowel::U => self.u = value,
            Vowel::E => self.e = value,
            Vowel::O => self.o = value,
        }
    }

    fn vowels(&self) -> [f32; 5] {
        [self.a, self.i, self.u, self.e, self.o]
    }

    /// Clamp to [0,1] and fill in what the sender left out: a missing energy is
    /// the loudest vowel; an all-zero frame with energy opens "A" to that energy.
    pub fn normalized(&self) -> LipsyncFrame {
        let clean = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let mut out = LipsyncFrame::default();
        for v in Vowel::ALL {
            out.set(v, clean(self.get(v)));
        }
        match self.energy.map(clean) {
            Some(energy) => {
                if energy > 0.0 && out.vowels().iter().all(|v| *v == 0.0) {
                    out.a = energy;
                }
                out.energy = Some(energy);
            }
            None => {
                out.energy = Some(out.vowels().into_iter().fold(0.0, f32::max));
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Channels {
    vowels: [f32; 5],
    energy: f32,
}

#[derive(Debug)]
pub struct LipsyncSmoother {
    cfg: LipsyncConfig,
    current: Channels,
    target: Channels,
    rng: StdRng,
}

impl LipsyncSmoother {
    pub fn new(cfg: LipsyncConfig) -> Self {
        let rng = rng_for(cfg.seed);
        Self {
            cfg,
            current: Channels::default(),
            target: Channels::default(),
            rng,
        }
    }

    /// Replace the target with the latest frame. Earlier frames not yet reached are dropped.
    pub fn receive(&mut self, frame: &LipsyncFrame) {
        let f = frame.normalized();
        self.target = Channels {
            vowels: f.vowels(),
            energy: f.energy.unwrap_or(0.0),
        };
    }

    /// Latest received energy.
    pub fn target_energy(&self) -> f32 {
        self.target.energy
    }

    pub fn current(&self, vowel: Vowel) -> f32 {
        self.current.vowels[vowel.index()]
    }

    pub fn current_energy(&self) -> f32 {
        self.current.energy
    }

    /// True once the mouth is closed and nothing more is pending.
    pub fn is_idle(&self) -> bool {
        self.current.vowels.iter().all(|v| *v == 0.0)
            && self.target.vowels.iter().all(|v| *v == 0.0)
    }

    pub fn reset(&mut self) {
        self.current = Channels::default();
        self.target = Channels::default();
    }

    /// Advance one step and return the shaped frame for the blend-shape manager.
    pub fn tick(&mut self) -> LipsyncFrame {
        let k = self.cfg.smoothing.clamp(0.0, 1.0);
        for (c, t) in self
            .current
            .vowels
            .iter_mut()
            .zip(self.target.vowels.iter())
        {
            *c += (t - *c) * k;
        }
        self.current.energy += (self.target.energy - self.current.energy) * k;

        let gate = self.target.energy;
        if gate < self.cfg.close_threshold {
            let decay = self.cfg.close_decay;
            let snap = self.cfg.snap_below;
            for ch in [&mut self.current, &mut self.target] {
                for v in ch.vowels.iter_mut() {
                    *v *= decay;
                    if *v < snap {
                        *v = 0.0;
                    }
                }
            }
        }

        let mut shaped = self.current.vowels;
        if gate > self.cfg.jitter_threshold {
            let idx = dominant(&shaped);
            let amp = self.cfg.jitter_amplitude * gate;
            let jitter = self.rng.gen_range(-1.0f32..=1.0) * amp;
            shaped[idx] = (shaped[idx] + jitter).clamp(0.0, 1.0);
        }

        let energy = self.current.energy;
        let gain = if energy > 0.0 {
            self.cfg.gain_base + self.cfg.gain_slope * energy
        } else {
            1.0
        };
        let mut out = LipsyncFrame::default().with_energy(energy);
        for v in Vowel::ALL {
            out.set(v, (shaped[v.index()] * gain).clamp(0.0, 1.0));
        }
        out
    }
}

/// Index of the loudest vowel; "A" when all are silent.
fn dominant(vowels: &[f32; 5]) -> usize {
    let mut best = 0;
    let mut max = 0.0;
    for (i, v) in vowels.iter().enumerate() {
        if *v > max {
            max = *v;
            best = i;
        }
    }
    best
}
