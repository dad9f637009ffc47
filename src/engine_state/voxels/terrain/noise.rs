//! # Gradient Noise
//!
//! Seeded 2D gradient noise, octave summation and the spline curves used to
//! reshape noise into terrain features.
//!
//! [`GradientNoise`] implements [`noise::NoiseFn`], so it can be combined with
//! the combinators of the `noise` crate as well as with [`fbm`].

use noise::NoiseFn;

/// The eight gradient directions of the 2D noise.
const GRADIENTS: [[f64; 2]; 8] = [
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
];

/// LCG multiplier of the permutation table generator.
const LCG_MULTIPLIER: u32 = 1664525;
/// LCG increment of the permutation table generator.
const LCG_INCREMENT: u32 = 1013904223;

/// Perlin-style gradient noise over a seeded 512-entry permutation table.
#[derive(Clone)]
pub struct GradientNoise {
    perm: [u8; 512],
}

impl GradientNoise {
    /// Builds the permutation table for `seed`.
    ///
    /// Each of the first 256 entries is the top byte of the next LCG state
    /// (`value = value * 1664525 + 1013904223 mod 2^32`); the second half repeats
    /// the first so lookups never wrap.
    pub fn new(seed: u32) -> Self {
        let mut perm = [0u8; 512];
        let mut value = seed;
        for i in 0..256 {
            value = value.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT);
            perm[i] = (value >> 24) as u8;
            perm[i + 256] = perm[i];
        }
        GradientNoise { perm }
    }

    /// Samples the noise at `(x, z)`. The result lies roughly in `[-1, 1]`.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let x_floor = x.floor();
        let z_floor = z.floor();
        let cell_x = (x_floor as i64 & 255) as usize;
        let cell_z = (z_floor as i64 & 255) as usize;
        let xf = x - x_floor;
        let zf = z - z_floor;
        let u = fade(xf);
        let v = fade(zf);

        let a = self.perm[cell_x] as usize + cell_z;
        let b = self.perm[cell_x + 1] as usize + cell_z;
        let aa = self.perm[a] as usize;
        let ab = self.perm[a + 1] as usize;
        let ba = self.perm[b] as usize;
        let bb = self.perm[b + 1] as usize;

        let g1 = grad(self.perm[aa], xf, zf);
        let g2 = grad(self.perm[ba], xf - 1.0, zf);
        let g3 = grad(self.perm[ab], xf, zf - 1.0);
        let g4 = grad(self.perm[bb], xf - 1.0, zf - 1.0);

        lerp(lerp(g1, g2, u), lerp(g3, g4, u), v)
    }
}

impl NoiseFn<f64, 2> for GradientNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0], point[1])
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, z: f64) -> f64 {
    let [gx, gz] = GRADIENTS[(hash & 7) as usize];
    gx * x + gz * z
}

/// Sums `octaves` layers of `noise`, doubling the frequency and multiplying the
/// amplitude by `persistence` each layer.
///
/// # Returns
/// The normalized sum remapped from `[-1, 1]` to `[0, 1]`.
pub fn fbm<N: NoiseFn<f64, 2>>(
    noise: &N,
    x: f64,
    z: f64,
    base_frequency: f64,
    octaves: u32,
    persistence: f64,
) -> f64 {
    let mut total = 0.0;
    let mut max_amplitude = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = base_frequency;

    for _ in 0..octaves {
        total += noise.get([x * frequency, z * frequency]) * amplitude;
        max_amplitude += amplitude;
        frequency *= 2.0;
        amplitude *= persistence;
    }

    if max_amplitude == 0.0 {
        return 0.5;
    }
    ((total / max_amplitude + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// A curve through control points, smoothstep-interpolated between neighbours.
///
/// Inputs left of the first point or right of the last are clamped to the end
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct Spline {
    points: Vec<(f64, f64)>,
}

impl Spline {
    /// Creates a spline from `(input, output)` control points.
    pub fn new(points: &[(f64, f64)]) -> Self {
        let mut points = points.to_vec();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Spline { points }
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return t;
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if t <= x1 {
                let span = x1 - x0;
                if span <= f64::EPSILON {
                    return y1;
                }
                let local = (t - x0) / span;
                let smooth = local * local * (3.0 - 2.0 * local);
                return y0 + (y1 - y0) * smooth;
            }
        }
        last.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_matches_lcg() {
        let noise = GradientNoise::new(42);
        let mut value: u32 = 42;
        for i in 0..256 {
            value = value.wrapping_mul(1664525).wrapping_add(1013904223);
            let expected = ((value as f64 / 4294967296.0) * 256.0).floor() as u8;
            assert_eq!(noise.perm[i], expected);
            assert_eq!(noise.perm[i + 256], expected);
        }
    }

    #[test]
    fn noise_is_zero_on_lattice_and_deterministic() {
        let a = GradientNoise::new(7);
        let b = GradientNoise::new(7);
        assert_eq!(a.sample(3.0, -5.0), 0.0);
        let mut rng = fastrand::Rng::with_seed(1);
        for _ in 0..200 {
            let (x, z) = (rng.f64() * 500.0 - 250.0, rng.f64() * 500.0 - 250.0);
            let value = a.get([x, z]);
            assert_eq!(value, b.sample(x, z));
            assert!((-1.5..=1.5).contains(&value));
        }
    }

    #[test]
    fn fbm_stays_in_unit_range() {
        let noise = GradientNoise::new(11);
        let mut rng = fastrand::Rng::with_seed(2);
        for _ in 0..200 {
            let value = fbm(&noise, rng.f64() * 1e4, rng.f64() * 1e4, 0.01, 4, 0.5);
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn spline_interpolates_and_clamps() {
        let spline = Spline::new(&[(1.0, 10.0), (0.0, 0.0)]);
        assert_eq!(spline.evaluate(-1.0), 0.0);
        assert_eq!(spline.evaluate(2.0), 10.0);
        assert_eq!(spline.evaluate(0.5), 5.0);
        assert!(spline.evaluate(0.25) < 2.5);
    }
}
