//! Layered coherent noise.

use noise::{NoiseFn, Perlin};

use super::layer_seed;

/// Sum of Perlin octaves at doubling frequency and falling amplitude.
///
/// Output is normalised by the total amplitude, so samples stay roughly in
/// `-1.0..=1.0`.
pub struct OctaveNoise {
    layers: Vec<Perlin>,
    base_frequency: f64,
    persistence: f64,
    amplitude_sum: f64,
}

/// Frequency growth per octave.
const LACUNARITY: f64 = 2.0;

impl std::fmt::Debug for OctaveNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctaveNoise")
            .field("octaves", &self.layers.len())
            .field("base_frequency", &self.base_frequency)
            .field("persistence", &self.persistence)
            .finish()
    }
}

impl OctaveNoise {
    /// Creates a noise source. `stream` separates independent fields that
    /// share one world seed.
    #[must_use]
    pub fn new(seed: u64, stream: u32, octaves: u32, base_frequency: f64) -> Self {
        let octaves = octaves.max(1);
        let layers = (0..octaves)
            .map(|i| Perlin::new(layer_seed(seed, stream * 64 + i)))
            .collect();
        let mut noise = Self {
            layers,
            base_frequency,
            persistence: 0.5,
            amplitude_sum: 0.0,
        };
        noise.amplitude_sum = noise.total_amplitude();
        noise
    }

    /// Sets how much each octave's amplitude shrinks.
    #[must_use]
    pub fn with_persistence(mut self, persistence: f64) -> Self {
        self.persistence = persistence;
        self.amplitude_sum = self.total_amplitude();
        self
    }

    fn total_amplitude(&self) -> f64 {
        let mut amplitude = 1.0;
        let mut sum = 0.0;
        for _ in &self.layers {
            sum += amplitude;
            amplitude *= self.persistence;
        }
        sum
    }

    /// Samples along one axis (height profiles).
    #[must_use]
    pub fn sample1(&self, x: f64) -> f64 {
        // Offset off the integer lattice where Perlin is always zero.
        self.sample2(x, 0.5)
    }

    /// Samples the 2D field.
    #[must_use]
    pub fn sample2(&self, x: f64, y: f64) -> f64 {
        let mut frequency = self.base_frequency;
        let mut amplitude = 1.0;
        let mut total = 0.0;
        for layer in &self.layers {
            total += layer.get([x * frequency, y * frequency]) * amplitude;
            frequency *= LACUNARITY;
            amplitude *= self.persistence;
        }
        total / self.amplitude_sum
    }

    /// Samples the 2D field remapped to `0.0..=1.0`.
    #[must_use]
    pub fn sample2_unit(&self, x: f64, y: f64) -> f64 {
        ((self.sample2(x, y) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_samples() {
        let a = OctaveNoise::new(7, 0, 4, 0.01);
        let b = OctaveNoise::new(7, 0, 4, 0.01);
        for i in 0..32 {
            let x = f64::from(i) * 13.7;
            assert_eq!(a.sample2(x, x * 0.5).to_bits(), b.sample2(x, x * 0.5).to_bits());
        }
    }

    #[test]
    fn test_streams_differ() {
        let a = OctaveNoise::new(7, 0, 4, 0.01);
        let b = OctaveNoise::new(7, 1, 4, 0.01);
        let differs = (0..32).any(|i| {
            let x = f64::from(i) * 13.7;
            (a.sample1(x) - b.sample1(x)).abs() > 1e-9
        });
        assert!(differs);
    }

    #[test]
    fn test_samples_stay_bounded() {
        let noise = OctaveNoise::new(99, 3, 6, 0.05).with_persistence(0.6);
        for i in 0..500 {
            let v = noise.sample2(f64::from(i) * 3.1, f64::from(i) * -1.7);
            assert!((-1.5..=1.5).contains(&v), "sample {v} out of range");
            let u = noise.sample2_unit(f64::from(i), 0.0);
            assert!((0.0..=1.0).contains(&u));
        }
    }
}
