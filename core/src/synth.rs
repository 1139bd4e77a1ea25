//! Deterministic synthetic recordings for demos and tests.
//!
//! All randomness flows through a PCG stream seeded from `SynthSpec::seed`;
//! the same `SynthSpec` always produces a byte-identical file.

use crate::{error::TwinResult, types::Timestamp};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SynthSpec {
    pub rows:      usize,
    pub start:     Timestamp,
    pub step_secs: i64,
    pub seed:      u64,
    /// Standard deviation scale of the noise added to the output.
    pub noise:     f64,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self { rows: 500, start: 0, step_secs: 5, seed: 42, noise: 0.05 }
    }
}

/// Signals written per timestamp, output last.
pub const SIGNALS: [&str; 6] = ["u1", "u2", "y2", "y3", "y4", "y1"];

/// Write a long-form (`dt,sensor,value`) recording.
///
/// `y1 = 3 + 2·u1 − 1.5·u2 + 0.5·u1[t−1] + noise`; the other unknowns are
/// loosely coupled to the inputs so the dashboard has something to draw.
pub fn generate(path: &Path, spec: &SynthSpec) -> TwinResult<usize> {
    let mut rng = Pcg64Mcg::seed_from_u64(spec.seed);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["dt", "sensor", "value"])?;

    let mut u2 = 0.0f64;
    let mut prev_u1 = 0.0f64;
    for i in 0..spec.rows {
        let dt = spec.start + spec.step_secs * i as i64;
        let phase = i as f64 * 0.05;

        let u1 = phase.sin() * 2.0 + rng.gen_range(-0.2..0.2);
        u2 = (u2 + rng.gen_range(-0.3..0.3)).clamp(-5.0, 5.0);
        let y2 = 0.8 * u1 + rng.gen_range(-0.5..0.5);
        let y3 = -0.3 * u2 + rng.gen_range(-0.5..0.5);
        let y4 = (phase * 0.5).cos() + rng.gen_range(-0.1..0.1);
        let y1 = 3.0 + 2.0 * u1 - 1.5 * u2 + 0.5 * prev_u1
            + spec.noise * rng.gen_range(-1.0..1.0);

        for (sensor, value) in SIGNALS.iter().zip([u1, u2, y2, y3, y4, y1]) {
            writer.write_record([dt.to_string(), sensor.to_string(), format!("{value:.6}")])?;
        }
        prev_u1 = u1;
    }
    writer.flush()?;
    log::info!("Generated {} timestamps into {}", spec.rows, path.display());
    Ok(spec.rows * SIGNALS.len())
}
