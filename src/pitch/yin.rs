use tracing::info;

use crate::error::Result;
use crate::pitch::{PitchSample, PitchSource};

const YIN_THRESHOLD: f32 = 0.15;
/// RMS below this is treated as no tone at all.
const GATE_RMS: f32 = 0.02;
/// Global-minimum fallback above this is not a pitched signal.
const UNPITCHED_CMND: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub hz: f32,
    pub confidence: f32,
    pub rms: f32,
}

/// YIN detector with pre-allocated work buffers, sized for the largest lag
/// the frequency range can produce.
#[derive(Clone, Debug)]
pub struct PitchDetector {
    sample_rate: f32,
    min_lag: usize,
    max_lag: usize,
    diff: Vec<f32>,
    cmnd: Vec<f32>,
}

impl PitchDetector {
    /// `min_freq`/`max_freq` bound the search; trumpet concert range is
    /// roughly 80..1200 Hz. `frame_size` is the expected input length.
    pub fn new(sample_rate: f32, min_freq: f32, max_freq: f32, frame_size: usize) -> Self {
        let min_lag = (sample_rate / max_freq).ceil().max(1.0) as usize;
        let max_lag = ((sample_rate / min_freq).floor() as usize).min(frame_size / 2);
        PitchDetector {
            sample_rate,
            min_lag,
            max_lag,
            diff: vec![0.0; max_lag + 1],
            cmnd: vec![0.0; max_lag + 1],
        }
    }

    pub fn for_trumpet(sample_rate: f32) -> Self {
        Self::new(sample_rate, 80.0, 1200.0, 2048)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Returns `None` for silence, frames too short for the range, or
    /// unpitched input; `rms` is reported separately via [`frame_rms`].
    pub fn detect(&mut self, samples: &[f32]) -> Option<Detection> {
        let rms = frame_rms(samples);
        if rms < GATE_RMS {
            return None;
        }

        let half_len = samples.len() / 2;
        let max_lag = self.max_lag.min(half_len);
        if self.min_lag >= max_lag || max_lag < 2 {
            return None;
        }

        for tau in 1..=max_lag {
            self.diff[tau] = samples[..half_len]
                .iter()
                .zip(&samples[tau..tau + half_len])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
        }

        self.cmnd[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..=max_lag {
            running_sum += self.diff[tau];
            self.cmnd[tau] = if running_sum > 0.0 {
                self.diff[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }

        let cmnd = &self.cmnd[..=max_lag];
        let best_tau = match (self.min_lag..=max_lag).find(|&tau| cmnd[tau] < YIN_THRESHOLD) {
            Some(first_dip) => {
                // walk to the bottom of the valley
                let mut t = first_dip;
                while t < max_lag && cmnd[t + 1] < cmnd[t] {
                    t += 1;
                }
                t
            }
            None => {
                let (tau, min_val) = (self.min_lag..=max_lag)
                    .map(|tau| (tau, cmnd[tau]))
                    .fold((0usize, f32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best });
                if min_val > UNPITCHED_CMND {
                    return None;
                }
                tau
            }
        };

        let tau_refined = if best_tau > 0 && best_tau < max_lag {
            let (alpha, beta, gamma) = (cmnd[best_tau - 1], cmnd[best_tau], cmnd[best_tau + 1]);
            let denom = 2.0 * (2.0 * beta - alpha - gamma);
            if denom.abs() > 1e-10 {
                best_tau as f32 + (alpha - gamma) / denom
            } else {
                best_tau as f32
            }
        } else {
            best_tau as f32
        };
        if tau_refined <= 0.0 {
            return None;
        }

        Some(Detection {
            hz: self.sample_rate / tau_refined,
            confidence: 1.0 - cmnd[best_tau].min(1.0),
            rms,
        })
    }

    /// Runs detection and packages the result as a [`PitchSample`].
    pub fn sample(&mut self, samples: &[f32]) -> PitchSample {
        match self.detect(samples) {
            Some(d) => PitchSample::from_frequency(d.hz as f64, d.rms as f64),
            None => PitchSample {
                audio_level: frame_rms(samples).min(1.0) as f64,
                ..PitchSample::silence()
            },
        }
    }
}

/// DC-removed RMS of a frame.
pub fn frame_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let energy: f32 = samples.iter().map(|s| (s - mean) * (s - mean)).sum();
    (energy / samples.len() as f32).sqrt()
}

/// Microphone-fed [`PitchSource`]: the host pushes audio frames, the
/// controller polls the latest sample.
#[derive(Debug)]
pub struct YinPitchSource {
    detector: PitchDetector,
    latest: PitchSample,
    running: bool,
}

impl YinPitchSource {
    pub fn new(sample_rate: f32) -> Self {
        YinPitchSource {
            detector: PitchDetector::for_trumpet(sample_rate),
            latest: PitchSample::silence(),
            running: false,
        }
    }

    /// Frames pushed while stopped are dropped.
    pub fn process_frame(&mut self, samples: &[f32]) {
        if self.running {
            self.latest = self.detector.sample(samples);
        }
    }
}

impl PitchSource for YinPitchSource {
    fn start(&mut self) -> Result<()> {
        if !self.running {
            info!("Pitch detection started at {} Hz", self.detector.sample_rate());
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            info!("Pitch detection stopped");
        }
        self.running = false;
        self.latest = PitchSample::silence();
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_sample(&self) -> PitchSample {
        self.latest.clone()
    }
}
