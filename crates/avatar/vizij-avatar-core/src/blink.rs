//! Automatic eyelid blinks at random intervals.

use log::trace;
use rand::rngs::StdRng;
use rand::Rng;

use crate::blend_shape::BlendShapeManager;
use crate::config::{rng_for, BlinkConfig};

#[derive(Debug)]
pub struct Blinker {
    cfg: BlinkConfig,
    rng: StdRng,
    clock: f64,
    next_blink_at: f64,
    reopen_at: Option<f64>,
}

impl Blinker {
    pub fn new(cfg: BlinkConfig) -> Self {
        let mut rng = rng_for(cfg.seed);
        let next_blink_at = f64::from(interval(&cfg, &mut rng));
        Self {
            cfg,
            rng,
            clock: 0.0,
            next_blink_at,
            reopen_at: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.cfg.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.cfg.enabled
    }

    /// True between closing and reopening.
    pub fn is_closed(&self) -> bool {
        self.reopen_at.is_some()
    }

    /// Seconds until the next automatic blink.
    pub fn next_in(&self) -> f32 {
        (self.next_blink_at - self.clock).max(0.0) as f32
    }

    /// Advance the blink clock. Returns true when a new blink started this tick.
    pub fn tick(&mut self, dt: f32, shapes: &mut BlendShapeManager) -> bool {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += f64::from(dt);
        if let Some(at) = self.reopen_at {
            if self.clock >= at {
                self.reopen_at = None;
                shapes.set_channel(
                    &self.cfg.channel,
                    0.0,
                    self.cfg.priority,
                    self.cfg.transition_seconds,
                );
            }
        }
        if !self.cfg.enabled || self.reopen_at.is_some() || self.clock < self.next_blink_at {
            return false;
        }
        self.next_blink_at = self.clock + f64::from(interval(&self.cfg, &mut self.rng));
        self.close(shapes);
        true
    }

    /// Blink now, independent of the automatic schedule.
    pub fn trigger(&mut self, shapes: &mut BlendShapeManager) {
        self.close(shapes);
    }

    fn close(&mut self, shapes: &mut BlendShapeManager) {
        trace!("blink");
        shapes.set_channel(
            &self.cfg.channel,
            self.cfg.closed_value,
            self.cfg.priority,
            self.cfg.transition_seconds,
        );
        self.reopen_at = Some(self.clock + f64::from(self.cfg.closed_seconds));
    }
}

fn interval(cfg: &BlinkConfig, rng: &mut StdRng) -> f32 {
    let lo = cfg.min_interval_seconds.max(0.0);
    let hi = cfg.max_interval_seconds.max(lo);
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}
