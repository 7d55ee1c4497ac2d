//! Prior distributions over the generator's latent inputs.
//!
//! These are descriptors: the model worker owns sampling during training. The only
//! sampling done here is the fixed noise vector behind disentanglement grids.

use crate::config::RunConfig;
use crate::export::CodeMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A stateless latent distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Uniform over `[-1, 1]^dim`. `fix_std` is set only for regularised codes.
    Uniform {
        dim: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        fix_std: Option<bool>,
    },
    /// Standard normal over `R^dim`.
    Gaussian { dim: usize },
}

impl Distribution {
    pub fn uniform(dim: usize) -> Self {
        Self::Uniform { dim, fix_std: None }
    }

    pub fn uniform_code(dim: usize, fix_std: bool) -> Self {
        Self::Uniform {
            dim,
            fix_std: Some(fix_std),
        }
    }

    pub fn gaussian(dim: usize) -> Self {
        Self::Gaussian { dim }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::Uniform { dim, .. } | Self::Gaussian { dim } => *dim,
        }
    }

    /// Draw `n` row-major samples (`n * dim` values).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f32> {
        let len = n * self.dim();
        match self {
            Self::Uniform { .. } => (0..len).map(|_| rng.gen_range(-1.0f32..=1.0)).collect(),
            Self::Gaussian { .. } => {
                // Box-Muller, two normals per pair of uniforms.
                let mut out = Vec::with_capacity(len + 1);
                while out.len() < len {
                    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
                    let u2: f32 = rng.gen_range(0.0f32..1.0);
                    let radius = (-2.0 * u1.ln()).sqrt();
                    let angle = std::f32::consts::TAU * u2;
                    out.push(radius * angle.cos());
                    out.push(radius * angle.sin());
                }
                out.truncate(len);
                out
            }
        }
    }
}

/// The three distributions a run is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Priors {
    /// Unregularised noise `z`.
    pub noise: Distribution,
    /// Regularised codes `c`.
    pub codes: Distribution,
    /// Output distribution over flattened images.
    pub output: Distribution,
}

impl Priors {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            noise: Distribution::uniform(config.noise_variables),
            codes: Distribution::uniform_code(config.latent_codes, config.fix_std),
            output: Distribution::gaussian(config.output_dim()),
        }
    }
}

/// `n` evenly spaced values over `[-1, 1]`.
pub fn linspace(n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|j| -1.0 + 2.0 * j as f32 / (n - 1) as f32)
            .collect(),
    }
}

/// Traversal grid: row `d * n + j` varies code `d` over `linspace(n)[j]`, all other codes zero.
pub fn latent_traversal(code_dim: usize, n: usize) -> CodeMatrix {
    let values = linspace(n);
    let mut data = vec![0.0f32; code_dim * n * code_dim];
    for d in 0..code_dim {
        for (j, value) in values.iter().enumerate() {
            data[(d * n + j) * code_dim + d] = *value;
        }
    }
    CodeMatrix::from_parts(code_dim * n, code_dim, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_priors_follow_config() {
        let config = RunConfig::resolve(RunSettings::default()).unwrap();
        let priors = Priors::from_config(&config);
        assert_eq!(priors.noise.dim(), 128);
        assert_eq!(priors.codes, Distribution::uniform_code(6, true));
        assert_eq!(priors.output.dim(), 3 * 64 * 64);
    }

    #[test]
    fn test_uniform_samples_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = Distribution::uniform(16).sample(&mut rng, 4);
        assert_eq!(samples.len(), 64);
        assert!(samples.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_gaussian_samples_are_finite_and_centered() {
        let mut rng = StdRng::seed_from_u64(11);
        let samples = Distribution::gaussian(3).sample(&mut rng, 2001);
        assert_eq!(samples.len(), 6003);
        assert!(samples.iter().all(|v| v.is_finite()));
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!(mean.abs() < 0.1, "mean {mean} too far from 0");
    }

    #[test]
    fn test_descriptor_json_shape() {
        let json = serde_json::to_value(Distribution::uniform_code(6, true)).unwrap();
        assert_eq!(json["kind"], "uniform");
        assert_eq!(json["fix_std"], true);
        let json = serde_json::to_value(Distribution::uniform(128)).unwrap();
        assert!(json.get("fix_std").is_none());
    }

    #[test]
    fn test_linspace_endpoints() {
        assert_eq!(linspace(3), vec![-1.0, 0.0, 1.0]);
        assert_eq!(linspace(1), vec![0.0]);
        assert!(linspace(0).is_empty());
    }

    #[test]
    fn test_latent_traversal_grid() {
        let grid = latent_traversal(2, 3);
        assert_eq!((grid.rows(), grid.cols()), (6, 2));
        assert_eq!(grid.row(0), &[-1.0, 0.0]);
        assert_eq!(grid.row(2), &[1.0, 0.0]);
        assert_eq!(grid.row(3), &[0.0, -1.0]);
        assert_eq!(grid.row(4), &[0.0, 0.0]);
    }
}
