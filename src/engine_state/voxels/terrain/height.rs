//! # Height Field
//!
//! Composes the terrain surface from three independently seeded noise signals.
//!
//! ## Layers
//!
//! | Layer       | Seed       | Frequency | Spline output range |
//! |-------------|------------|-----------|---------------------|
//! | continental | `seed`     | 0.004     | 0.05 – 0.9          |
//! | mountain    | `seed + 1` | 0.01      | 0.6 – 1.6           |
//! | peak        | `seed + 2` | 0.03      | 0.9 – 1.3           |
//!
//! Each signal is a four-octave [`fbm`] sum reshaped by its [`Spline`]. The
//! three values are multiplied, so mountains and peaks only rise where the
//! continental base is already high, and the product is scaled by the world
//! amplitude.

use super::noise::{fbm, GradientNoise, Spline};

const OCTAVES: u32 = 4;
const PERSISTENCE: f64 = 0.5;

const CONTINENTAL_FREQUENCY: f64 = 0.004;
const MOUNTAIN_FREQUENCY: f64 = 0.01;
const PEAK_FREQUENCY: f64 = 0.03;

const CONTINENTAL_POINTS: [(f64, f64); 6] = [
    (0.0, 0.05),
    (0.3, 0.15),
    (0.45, 0.3),
    (0.6, 0.45),
    (0.8, 0.7),
    (1.0, 0.9),
];
const MOUNTAIN_POINTS: [(f64, f64); 5] = [
    (0.0, 0.6),
    (0.4, 0.9),
    (0.6, 1.1),
    (0.8, 1.4),
    (1.0, 1.6),
];
const PEAK_POINTS: [(f64, f64); 4] = [(0.0, 0.9), (0.5, 1.0), (0.8, 1.15), (1.0, 1.3)];

/// Deterministic surface height generator for one world seed.
#[derive(Clone)]
pub struct HeightGenerator {
    continental: GradientNoise,
    mountain: GradientNoise,
    peaks: GradientNoise,
    continental_spline: Spline,
    mountain_spline: Spline,
    peak_spline: Spline,
    amplitude: f64,
    max_height: i32,
}

impl HeightGenerator {
    /// Creates a generator.
    ///
    /// # Arguments
    /// * `seed` - World seed
    /// * `amplitude` - Global vertical scale
    /// * `max_height` - Upper clamp of the returned heights, usually the chunk height
    pub fn new(seed: u32, amplitude: f64, max_height: i32) -> Self {
        HeightGenerator {
            continental: GradientNoise::new(seed),
            mountain: GradientNoise::new(seed.wrapping_add(1)),
            peaks: GradientNoise::new(seed.wrapping_add(2)),
            continental_spline: Spline::new(&CONTINENTAL_POINTS),
            mountain_spline: Spline::new(&MOUNTAIN_POINTS),
            peak_spline: Spline::new(&PEAK_POINTS),
            amplitude,
            max_height,
        }
    }

    /// Surface height of the world column `(world_x, world_z)`, in `[0, max_height]`.
    ///
    /// The column is filled for `0 <= y < height`.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> i32 {
        let (x, z) = (world_x as f64, world_z as f64);

        let continental = self.continental_spline.evaluate(fbm(
            &self.continental,
            x,
            z,
            CONTINENTAL_FREQUENCY,
            OCTAVES,
            PERSISTENCE,
        ));
        let mountain = self.mountain_spline.evaluate(fbm(
            &self.mountain,
            x,
            z,
            MOUNTAIN_FREQUENCY,
            OCTAVES,
            PERSISTENCE,
        ));
        let peak = self
            .peak_spline
            .evaluate(fbm(&self.peaks, x, z, PEAK_FREQUENCY, OCTAVES, PERSISTENCE));

        let height = (continental * mountain * peak * self.amplitude).floor();
        height.clamp(0.0, self.max_height as f64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heights_are_deterministic_and_clamped() {
        let a = HeightGenerator::new(42, 48.0, 128);
        let b = HeightGenerator::new(42, 48.0, 128);
        for x in -40..40 {
            for z in (-40..40).step_by(7) {
                let h = a.height_at(x, z);
                assert_eq!(h, b.height_at(x, z));
                assert!((0..=128).contains(&h));
            }
        }
    }

    #[test]
    fn amplitude_bounds_the_surface() {
        let low = HeightGenerator::new(5, 10.0, 128);
        let max = (0.9 * 1.6 * 1.3 * 10.0_f64).floor() as i32;
        for x in 0..64 {
            assert!(low.height_at(x, 3 * x) <= max);
        }
        let clamped = HeightGenerator::new(5, 10_000.0, 20);
        assert!((0..64).all(|x| clamped.height_at(x, x) <= 20));
    }

    #[test]
    fn seeds_change_the_field() {
        let a = HeightGenerator::new(1, 48.0, 128);
        let b = HeightGenerator::new(2, 48.0, 128);
        let differs = (0..256).any(|i| a.height_at(i * 13, i * 7) != b.height_at(i * 13, i * 7));
        assert!(differs);
    }
}
