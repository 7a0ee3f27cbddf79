//! Tone synthesis
//!
//! `PulseTrain` renders one stimulus presentation: a fixed number of sine
//! pulses separated by silent gaps, each pulse ramped in and out to avoid
//! clicks, hard-panned to one ear. `SteadyTone` is the continuous reference
//! tone used during calibration; its level follows a shared [`SteadyGain`].
//!
//! Both implement `rodio::Source` as interleaved stereo `f32`.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::Source;

use crate::config::audio::{
    CHANNELS, GAP_MS, PULSE_COUNT, PULSE_MS, RAMP_MS, SAMPLE_RATE, STEADY_SLEW_MS,
};

use super::types::{Ear, PulseRequest};

/// Timing of a pulse-train presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneTiming {
    pub pulses: u8,
    pub pulse: Duration,
    pub gap: Duration,
    pub ramp: Duration,
}

impl Default for ToneTiming {
    fn default() -> Self {
        Self {
            pulses: PULSE_COUNT,
            pulse: Duration::from_millis(PULSE_MS),
            gap: Duration::from_millis(GAP_MS),
            ramp: Duration::from_millis(RAMP_MS),
        }
    }
}

impl ToneTiming {
    /// Wall-clock length of the whole presentation, gaps included
    pub fn total_duration(&self) -> Duration {
        let pulses = u32::from(self.pulses);
        self.pulse
            .saturating_mul(pulses)
            .saturating_add(self.gap.saturating_mul(pulses.saturating_sub(1)))
    }
}

fn frames(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as u64
}

/// One stimulus presentation as an audio source
pub struct PulseTrain {
    gain: f32,
    ear: Ear,
    sample_rate: u32,
    pulse_frames: u64,
    gap_frames: u64,
    ramp_frames: u64,
    total_frames: u64,
    total_duration: Duration,
    frame: u64,
    channel: u16,
    phase: f32,
    phase_inc: f32,
    current: f32,
}

impl PulseTrain {
    pub fn new(request: &PulseRequest) -> Self {
        Self::with_sample_rate(request, SAMPLE_RATE)
    }

    pub fn with_sample_rate(request: &PulseRequest, sample_rate: u32) -> Self {
        let timing = request.timing;
        let pulse_frames = frames(timing.pulse, sample_rate);
        let gap_frames = frames(timing.gap, sample_rate);
        let pulses = u64::from(timing.pulses);
        let total_frames = pulse_frames * pulses + gap_frames * pulses.saturating_sub(1);

        Self {
            gain: request.effective_gain(),
            ear: request.ear,
            sample_rate,
            pulse_frames,
            gap_frames,
            ramp_frames: frames(timing.ramp, sample_rate).min(pulse_frames / 2),
            total_frames,
            total_duration: timing.total_duration(),
            frame: 0,
            channel: 0,
            phase: 0.0,
            phase_inc: TAU * request.frequency_hz as f32 / sample_rate as f32,
            current: 0.0,
        }
    }

    /// Amplitude envelope (0.0..=1.0) at a frame index
    pub fn envelope(&self, frame: u64) -> f32 {
        if frame >= self.total_frames {
            return 0.0;
        }
        let cycle = self.pulse_frames + self.gap_frames;
        let pos = if cycle == 0 { 0 } else { frame % cycle };
        if pos >= self.pulse_frames {
            return 0.0;
        }
        if self.ramp_frames == 0 {
            return 1.0;
        }
        let rise = pos as f32 / self.ramp_frames as f32;
        let fall = (self.pulse_frames - pos) as f32 / self.ramp_frames as f32;
        rise.min(fall).min(1.0)
    }

    /// Number of stereo frames in the presentation
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Iterator for PulseTrain {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame >= self.total_frames {
            return None;
        }

        if self.channel == 0 {
            self.current = self.phase.sin() * self.gain * self.envelope(self.frame);
            self.phase += self.phase_inc;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }

        let (left, right) = self.ear.channel_gains();
        let sample = if self.channel == 0 {
            self.current * left
        } else {
            self.current * right
        };

        self.channel += 1;
        if self.channel == CHANNELS {
            self.channel = 0;
            self.frame += 1;
        }

        Some(sample)
    }
}

impl Source for PulseTrain {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.total_duration)
    }
}

/// Shared, lock-free gain control for a [`SteadyTone`]
#[derive(Debug, Clone)]
pub struct SteadyGain(Arc<AtomicU32>);

impl SteadyGain {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.clamp(0.0, 1.0).to_bits())))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Continuous reference tone with click-free level changes
pub struct SteadyTone {
    ear: Ear,
    sample_rate: u32,
    target: SteadyGain,
    current_gain: f32,
    max_step: f32,
    channel: u16,
    phase: f32,
    phase_inc: f32,
    current: f32,
}

impl SteadyTone {
    /// Starts silent and fades toward the target gain
    pub fn new(frequency_hz: u32, ear: Ear, target: SteadyGain) -> Self {
        Self::with_sample_rate(frequency_hz, ear, target, SAMPLE_RATE)
    }

    pub fn with_sample_rate(frequency_hz: u32, ear: Ear, target: SteadyGain, sample_rate: u32) -> Self {
        let slew_frames = frames(Duration::from_millis(STEADY_SLEW_MS), sample_rate).max(1);
        Self {
            ear,
            sample_rate,
            target,
            current_gain: 0.0,
            max_step: 1.0 / slew_frames as f32,
            channel: 0,
            phase: 0.0,
            phase_inc: TAU * frequency_hz as f32 / sample_rate as f32,
            current: 0.0,
        }
    }

    /// Gain applied to the most recent frame
    pub fn current_gain(&self) -> f32 {
        self.current_gain
    }
}

impl Iterator for SteadyTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.channel == 0 {
            let target = self.target.get();
            let delta = (target - self.current_gain).clamp(-self.max_step, self.max_step);
            self.current_gain += delta;

            self.current = self.phase.sin() * self.current_gain;
            self.phase += self.phase_inc;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }

        let (left, right) = self.ear.channel_gains();
        let sample = if self.channel == 0 {
            self.current * left
        } else {
            self.current * right
        };

        self.channel = (self.channel + 1) % CHANNELS;
        Some(sample)
    }
}

impl Source for SteadyTone {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
