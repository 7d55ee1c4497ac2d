//! Run configuration.
//!
//! Raw flag values are loaded with `figment` in layers (defaults -> user config ->
//! explicit config file -> `INFOGAN_` environment -> command-line overrides) into
//! [`RunSettings`], then resolved once into the immutable [`RunConfig`] that every
//! other component receives by reference.

use crate::error::{InfoGanError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Data root used when `data_dir` is not configured.
pub const DEFAULT_DATA_DIR: &str = "../../data";

/// Raw, layered run settings. Field names are the stable flag names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Number of epochs to train.
    pub epochs: usize,
    /// Log stats every this many epochs (a fraction of an epoch is allowed).
    pub epochs_per_stats: f64,
    /// Save a checkpoint every this many epochs (a fraction of an epoch is allowed).
    pub snapshot_interval: f64,
    /// Number of regularised latent variables.
    pub latent_codes: usize,
    /// Number of unregularised latent variables.
    pub noise_variables: usize,
    /// Fix the standard deviation of the regularised codes.
    pub fix_std: bool,
    /// Mutual information coefficient.
    pub mi_coeff: f64,
    /// Gradient penalty coefficient (wgan-gp only).
    pub gp_coeff: f64,
    /// Critic updates per generator update (wgan-gp only).
    pub critic_iters: usize,
    pub batch_size: usize,
    /// Channels-first image shape, e.g. `(3,64,64)`.
    pub image_shape: String,
    pub file_ext: String,
    /// Objective: `gan` or `wgan-gp`.
    pub mode: String,
    /// Experiment name; derived from the hyperparameters when unset.
    pub exp_name: Option<String>,
    /// Architecture: `low_cap`, `high_cap`, `dcgan` or `resnet`.
    pub arch: String,
    pub output_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    /// Withhold factor combinations from the training split.
    pub gaps: bool,
    pub train: bool,
    pub save_codes: bool,
    pub visualize_reconstruct: bool,
    pub visualize_disentangle: bool,
    /// Evenly spaced values per code over `[-1, 1]` in traversal grids.
    pub n_disentangle_samples: usize,
    /// Seed for split permutation and per-epoch shuffling.
    pub seed: u64,
    /// Fail training when the generator loss exceeds this multiple of its recent mean.
    pub divergence_spike_factor: Option<f64>,
    pub worker: WorkerSettings,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            epochs: 25,
            epochs_per_stats: 0.5,
            snapshot_interval: 0.5,
            latent_codes: 6,
            noise_variables: 128,
            fix_std: true,
            mi_coeff: 8.0,
            gp_coeff: 10.0,
            critic_iters: 5,
            batch_size: 64,
            image_shape: "(3,64,64)".to_string(),
            file_ext: ".jpeg".to_string(),
            mode: "wgan-gp".to_string(),
            exp_name: None,
            arch: "resnet".to_string(),
            output_dir: PathBuf::from("./"),
            data_dir: None,
            gaps: false,
            train: true,
            save_codes: false,
            visualize_reconstruct: false,
            visualize_disentangle: true,
            n_disentangle_samples: 10,
            seed: 42,
            divergence_spike_factor: None,
            worker: WorkerSettings::default(),
        }
    }
}

/// How to launch the out-of-process model worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub command: String,
    pub args: Vec<String>,
    /// Upper bound on a single worker request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["-m".to_string(), "infogan_worker".to_string()],
            request_timeout_secs: 3600,
        }
    }
}

/// Flags given explicitly on the command line. Unset fields leave lower layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs_per_stats: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_interval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latent_codes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_variables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_std: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mi_coeff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gp_coeff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic_iters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_codes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualize_reconstruct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualize_disentangle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_disentangle_samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence_spike_factor: Option<f64>,
    #[serde(skip_serializing_if = "WorkerOverrides::is_empty")]
    pub worker: WorkerOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl WorkerOverrides {
    fn is_empty(&self) -> bool {
        self.command.is_none() && self.args.is_none()
    }
}

/// Load settings from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit command-line overrides
/// 2. Environment variables (`INFOGAN_BATCH_SIZE`, `INFOGAN_WORKER__COMMAND`, ...)
/// 3. The config file passed with `--config` (must exist)
/// 4. User config (`~/.config/infogan/config.toml`)
/// 5. Built-in defaults
pub fn load_settings(
    config_file: Option<&Path>,
    overrides: &SettingsOverrides,
) -> std::result::Result<RunSettings, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RunSettings::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "infogan", "infogan") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(Box::new(figment::Error::from(format!(
                "config file not found: {}",
                path.display()
            ))));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("INFOGAN_").split("__"));
    figment = figment.merge(Serialized::defaults(overrides));

    figment.extract().map_err(Box::new)
}

/// A cadence expressed as a (possibly fractional) number of epochs.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochFraction(f64);

impl EpochFraction {
    pub fn new(epochs: f64) -> Result<Self> {
        if !epochs.is_finite() || epochs < 0.0 {
            return Err(InfoGanError::config(format!(
                "epoch fraction must be a finite, non-negative number (got {epochs})"
            )));
        }
        Ok(Self(epochs))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Whole iterations covered by this fraction, truncated towards zero.
    pub fn of(self, iterations_per_epoch: u64) -> u64 {
        (self.0 * iterations_per_epoch as f64).floor() as u64
    }
}

/// Split an image-shape string such as `(3,64,64)` or `[1, 28, 28]` into its components.
///
/// Only the syntax is checked here; the number of components is validated by
/// [`ImageShape::try_from`].
pub fn parse_image_shape(input: &str) -> Result<Vec<usize>> {
    let inner = input.trim().trim_matches(|c| "()[]{}".contains(c));
    if inner.trim().is_empty() {
        return Err(InfoGanError::parse(input, "no dimensions given"));
    }
    inner
        .split(',')
        .map(str::trim)
        .map(|part| match part.parse::<usize>() {
            Ok(0) => Err(InfoGanError::parse(input, "dimensions must be positive")),
            Ok(dim) => Ok(dim),
            Err(_) => Err(InfoGanError::parse(
                input,
                format!("'{part}' is not a positive integer"),
            )),
        })
        .collect()
}

/// Channels-first image shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Number of scalars in one image; the dimensionality of the output distribution.
    pub fn product(&self) -> usize {
        self.channels * self.height * self.width
    }
}

impl TryFrom<Vec<usize>> for ImageShape {
    type Error = InfoGanError;

    fn try_from(dims: Vec<usize>) -> Result<Self> {
        match dims.as_slice() {
            &[c, h, w] if c > 0 && h > 0 && w > 0 => Ok(Self::new(c, h, w)),
            &[_, _, _] => Err(InfoGanError::config("image dimensions must be positive")),
            other => Err(InfoGanError::config(format!(
                "image shape needs 3 dimensions (channels, height, width), got {}",
                other.len()
            ))),
        }
    }
}

impl FromStr for ImageShape {
    type Err = InfoGanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(parse_image_shape(s)?)
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.channels, self.height, self.width)
    }
}

/// Training objective. Each arm knows how many logical iterations fit in an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Objective {
    /// Vanilla GAN: one batch per generator step.
    Gan,
    /// Wasserstein GAN with gradient penalty: `critic_iters` critic batches per generator step.
    WganGp { critic_iters: usize, gp_coeff: f64 },
}

impl Objective {
    pub fn from_mode(mode: &str, critic_iters: usize, gp_coeff: f64) -> Result<Self> {
        match mode {
            "gan" => Ok(Self::Gan),
            "wgan-gp" => {
                if critic_iters == 0 {
                    return Err(InfoGanError::config("critic_iters must be at least 1"));
                }
                if !gp_coeff.is_finite() || gp_coeff < 0.0 {
                    return Err(InfoGanError::config(format!(
                        "gp_coeff must be finite and non-negative (got {gp_coeff})"
                    )));
                }
                Ok(Self::WganGp {
                    critic_iters,
                    gp_coeff,
                })
            }
            other => Err(InfoGanError::config(format!(
                "unknown mode '{other}' (expected 'gan' or 'wgan-gp')"
            ))),
        }
    }

    /// Logical iterations per epoch given the number of full batches in the train split.
    pub fn iterations_per_epoch(&self, batches_per_epoch: u64) -> u64 {
        match self {
            Self::Gan => batches_per_epoch,
            Self::WganGp { critic_iters, .. } => batches_per_epoch / *critic_iters as u64,
        }
    }

    /// Real batches consumed by one generator step.
    pub fn batches_per_step(&self) -> usize {
        match self {
            Self::Gan => 1,
            Self::WganGp { critic_iters, .. } => *critic_iters,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gan => "gan",
            Self::WganGp { .. } => "wgan-gp",
        }
    }
}

/// Network architecture tag. Topology lives in the model worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    LowCap,
    HighCap,
    Dcgan,
    Resnet,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowCap => "low_cap",
            Self::HighCap => "high_cap",
            Self::Dcgan => "dcgan",
            Self::Resnet => "resnet",
        }
    }

    /// The architecture the vanilla objective is known to be stable with.
    pub fn is_baseline(&self) -> bool {
        matches!(self, Self::Dcgan)
    }
}

impl FromStr for Architecture {
    type Err = InfoGanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low_cap" => Ok(Self::LowCap),
            "high_cap" => Ok(Self::HighCap),
            "dcgan" => Ok(Self::Dcgan),
            "resnet" => Ok(Self::Resnet),
            other => Err(InfoGanError::config(format!(
                "unknown arch '{other}' (expected low_cap, high_cap, dcgan or resnet)"
            ))),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal observations about a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Vanilla objective paired with a non-baseline architecture.
    UnstableObjective { arch: Architecture },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnstableObjective { arch } => write!(
                f,
                "using the vanilla GAN objective with the '{arch}' architecture may be unstable; \
                 'dcgan' is the tested pairing"
            ),
        }
    }
}

/// Deterministic experiment name for a set of hyperparameters.
///
/// Re-running with the same `(gaps, arch, latent_codes, mi_coeff)` reuses the same
/// experiment directory.
pub fn derive_exp_name(
    gaps: bool,
    arch: Architecture,
    latent_codes: usize,
    mi_coeff: f64,
) -> String {
    format!("gan_{gaps}_{arch}_{latent_codes}_{mi_coeff:?}")
}

/// Immutable, validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub epochs: usize,
    pub epochs_per_stats: EpochFraction,
    pub snapshot_interval: EpochFraction,
    pub latent_codes: usize,
    pub noise_variables: usize,
    pub fix_std: bool,
    pub mi_coeff: f64,
    pub objective: Objective,
    pub batch_size: usize,
    pub image_shape: ImageShape,
    pub file_ext: String,
    pub arch: Architecture,
    pub exp_name: String,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub gaps: bool,
    pub train: bool,
    pub save_codes: bool,
    pub visualize_reconstruct: bool,
    pub visualize_disentangle: bool,
    pub n_disentangle_samples: usize,
    pub seed: u64,
    pub divergence_spike_factor: Option<f64>,
    pub worker: WorkerSettings,
}

impl RunConfig {
    /// Validate raw settings and derive the experiment name. Fails before anything is allocated.
    pub fn resolve(settings: RunSettings) -> Result<Self> {
        let image_shape: ImageShape = settings.image_shape.parse()?;
        let arch: Architecture = settings.arch.parse()?;
        let objective =
            Objective::from_mode(&settings.mode, settings.critic_iters, settings.gp_coeff)?;

        if settings.batch_size == 0 {
            return Err(InfoGanError::config("batch_size must be at least 1"));
        }
        if settings.latent_codes == 0 {
            return Err(InfoGanError::config("latent_codes must be at least 1"));
        }
        if settings.noise_variables == 0 {
            return Err(InfoGanError::config("noise_variables must be at least 1"));
        }
        if !settings.mi_coeff.is_finite() || settings.mi_coeff < 0.0 {
            return Err(InfoGanError::config(format!(
                "mi_coeff must be finite and non-negative (got {})",
                settings.mi_coeff
            )));
        }
        if settings.visualize_disentangle && settings.n_disentangle_samples < 2 {
            return Err(InfoGanError::config(
                "n_disentangle_samples must be at least 2 to span [-1, 1]",
            ));
        }

        if let Some(factor) = settings.divergence_spike_factor
            && !(factor.is_finite() && factor > 1.0)
        {
            return Err(InfoGanError::config(format!(
                "divergence_spike_factor must be finite and greater than 1 (got {factor})"
            )));
        }

        let epochs_per_stats = EpochFraction::new(settings.epochs_per_stats)?;
        let snapshot_interval = EpochFraction::new(settings.snapshot_interval)?;

        let exp_name = settings
            .exp_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                derive_exp_name(settings.gaps, arch, settings.latent_codes, settings.mi_coeff)
            });

        let file_ext = if settings.file_ext.starts_with('.') {
            settings.file_ext
        } else {
            format!(".{}", settings.file_ext)
        };

        Ok(Self {
            epochs: settings.epochs,
            epochs_per_stats,
            snapshot_interval,
            latent_codes: settings.latent_codes,
            noise_variables: settings.noise_variables,
            fix_std: settings.fix_std,
            mi_coeff: settings.mi_coeff,
            objective,
            batch_size: settings.batch_size,
            image_shape,
            file_ext,
            arch,
            exp_name,
            output_dir: settings.output_dir,
            data_dir: settings
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            gaps: settings.gaps,
            train: settings.train,
            save_codes: settings.save_codes,
            visualize_reconstruct: settings.visualize_reconstruct,
            visualize_disentangle: settings.visualize_disentangle,
            n_disentangle_samples: settings.n_disentangle_samples,
            seed: settings.seed,
            divergence_spike_factor: settings.divergence_spike_factor,
            worker: settings.worker,
        })
    }

    /// Dimensionality of the output distribution.
    pub fn output_dim(&self) -> usize {
        self.image_shape.product()
    }

    pub fn advisories(&self) -> Vec<Advisory> {
        let mut advisories = Vec::new();
        if matches!(self.objective, Objective::Gan) && !self.arch.is_baseline() {
            advisories.push(Advisory::UnstableObjective { arch: self.arch });
        }
        advisories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings_match_flags() {
        let s = RunSettings::default();
        assert_eq!(s.epochs, 25);
        assert_eq!(s.epochs_per_stats, 0.5);
        assert_eq!(s.snapshot_interval, 0.5);
        assert_eq!(s.latent_codes, 6);
        assert_eq!(s.noise_variables, 128);
        assert!(s.fix_std);
        assert_eq!(s.critic_iters, 5);
        assert_eq!(s.batch_size, 64);
        assert_eq!(s.mode, "wgan-gp");
        assert!(s.train && !s.save_codes && s.visualize_disentangle);
    }

    #[test]
    fn test_parse_image_shape() {
        assert_eq!(parse_image_shape("(3,64,64)").unwrap(), vec![3, 64, 64]);
        assert_eq!(parse_image_shape("[1, 28, 28]").unwrap(), vec![1, 28, 28]);
        assert_eq!(parse_image_shape("{3,32,32}").unwrap(), vec![3, 32, 32]);
        assert_eq!(parse_image_shape("(3,64)").unwrap(), vec![3, 64]);

        assert!(matches!(
            parse_image_shape("(3,x,64)"),
            Err(InfoGanError::Parse { .. })
        ));
        assert!(matches!(parse_image_shape("()"), Err(InfoGanError::Parse { .. })));
        assert!(matches!(
            parse_image_shape("(3,,64)"),
            Err(InfoGanError::Parse { .. })
        ));
        assert!(matches!(
            parse_image_shape("(3,0,64)"),
            Err(InfoGanError::Parse { .. })
        ));
    }

    #[test]
    fn test_image_shape_product_and_arity() {
        let shape: ImageShape = "(3,64,64)".parse().unwrap();
        assert_eq!(shape.dims(), [3, 64, 64]);
        assert_eq!(shape.product(), 12288);
        assert_eq!(shape.to_string(), "(3,64,64)");

        let err = "(3,64)".parse::<ImageShape>().unwrap_err();
        assert!(matches!(err, InfoGanError::Config(_)));
    }

    #[test]
    fn test_objective_iterations_per_epoch() {
        let wgan = Objective::from_mode("wgan-gp", 5, 10.0).unwrap();
        assert_eq!(wgan.iterations_per_epoch(125), 25);
        assert_eq!(wgan.batches_per_step(), 5);
        assert_eq!(wgan.name(), "wgan-gp");

        let gan = Objective::from_mode("gan", 5, 10.0).unwrap();
        assert_eq!(gan.iterations_per_epoch(125), 125);
        assert_eq!(gan.batches_per_step(), 1);

        assert!(Objective::from_mode("wgan", 5, 10.0).is_err());
        assert!(Objective::from_mode("wgan-gp", 0, 10.0).is_err());
    }

    #[test]
    fn test_divergence_spike_factor_must_exceed_one() {
        let config = RunConfig::resolve(RunSettings {
            divergence_spike_factor: Some(25.0),
            ..RunSettings::default()
        })
        .unwrap();
        assert_eq!(config.divergence_spike_factor, Some(25.0));
        let default = RunConfig::resolve(RunSettings::default()).unwrap();
        assert_eq!(default.divergence_spike_factor, None);

        for bad in [1.0, 0.5, f64::INFINITY, f64::NAN] {
            let err = RunConfig::resolve(RunSettings {
                divergence_spike_factor: Some(bad),
                ..RunSettings::default()
            })
            .unwrap_err();
            assert!(matches!(err, InfoGanError::Config(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn test_mode_and_arch_are_exact() {
        for mode in ["GAN", "wgan_gp", "WGAN-GP", " gan"] {
            let err = Objective::from_mode(mode, 5, 10.0).unwrap_err();
            assert!(matches!(err, InfoGanError::Config(_)), "{mode}: {err}");
        }
        for arch in ["ResNet", "DCGAN", "low-cap", "high_cap "] {
            let err = arch.parse::<Architecture>().unwrap_err();
            assert!(matches!(err, InfoGanError::Config(_)), "{arch}: {err}");
        }
        assert_eq!("high_cap".parse::<Architecture>().unwrap(), Architecture::HighCap);
    }

    #[test]
    fn test_objective_serializes_with_mode_tag() {
        let json = serde_json::to_value(Objective::WganGp {
            critic_iters: 5,
            gp_coeff: 10.0,
        })
        .unwrap();
        assert_eq!(json["mode"], "wgan-gp");
        assert_eq!(json["critic_iters"], 5);
    }

    #[test]
    fn test_epoch_fraction() {
        let half = EpochFraction::new(0.5).unwrap();
        assert_eq!(half.of(25), 12);
        assert_eq!(half.of(0), 0);
        assert_eq!(EpochFraction::new(25.0).unwrap().of(25), 625);
        assert!(EpochFraction::new(-0.1).is_err());
        assert!(EpochFraction::new(f64::NAN).is_err());
    }

    #[test]
    fn test_resolve_derives_exp_name() {
        let config = RunConfig::resolve(RunSettings::default()).unwrap();
        assert_eq!(config.exp_name, "gan_false_resnet_6_8.0");
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.output_dim(), 12288);
        assert_eq!(
            config.objective,
            Objective::WganGp {
                critic_iters: 5,
                gp_coeff: 10.0
            }
        );
    }

    #[test]
    fn test_resolve_keeps_explicit_exp_name() {
        let settings = RunSettings {
            exp_name: Some("teapots_baseline".into()),
            ..RunSettings::default()
        };
        assert_eq!(
            RunConfig::resolve(settings).unwrap().exp_name,
            "teapots_baseline"
        );

        let blank = RunSettings {
            exp_name: Some("  ".into()),
            ..RunSettings::default()
        };
        assert_eq!(
            RunConfig::resolve(blank).unwrap().exp_name,
            "gan_false_resnet_6_8.0"
        );
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        let bad_mode = RunSettings {
            mode: "vae".into(),
            ..RunSettings::default()
        };
        assert!(RunConfig::resolve(bad_mode).unwrap_err().is_configuration());

        let bad_arch = RunSettings {
            arch: "transformer".into(),
            ..RunSettings::default()
        };
        assert!(RunConfig::resolve(bad_arch).unwrap_err().is_configuration());

        let bad_shape = RunSettings {
            image_shape: "(3,64)".into(),
            ..RunSettings::default()
        };
        assert!(RunConfig::resolve(bad_shape).unwrap_err().is_configuration());

        let zero_batch = RunSettings {
            batch_size: 0,
            ..RunSettings::default()
        };
        assert!(RunConfig::resolve(zero_batch).is_err());
    }

    #[test]
    fn test_file_ext_is_normalised() {
        let settings = RunSettings {
            file_ext: "png".into(),
            ..RunSettings::default()
        };
        assert_eq!(RunConfig::resolve(settings).unwrap().file_ext, ".png");
    }

    #[test]
    fn test_advisory_for_vanilla_objective() {
        let gan_resnet = RunSettings {
            mode: "gan".into(),
            ..RunSettings::default()
        };
        let config = RunConfig::resolve(gan_resnet).unwrap();
        assert_eq!(
            config.advisories(),
            vec![Advisory::UnstableObjective {
                arch: Architecture::Resnet
            }]
        );

        let gan_dcgan = RunSettings {
            mode: "gan".into(),
            arch: "dcgan".into(),
            ..RunSettings::default()
        };
        assert!(RunConfig::resolve(gan_dcgan).unwrap().advisories().is_empty());

        assert!(RunConfig::resolve(RunSettings::default())
            .unwrap()
            .advisories()
            .is_empty());
    }

    #[test]
    fn test_load_settings_layers_file_and_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            "batch_size = 32\narch = \"dcgan\"\n[worker]\ncommand = \"/opt/worker\"\n",
        )
        .unwrap();

        let overrides = SettingsOverrides {
            arch: Some("low_cap".into()),
            ..SettingsOverrides::default()
        };
        let settings = load_settings(Some(&path), &overrides).unwrap();
        assert_eq!(settings.batch_size, 32);
        assert_eq!(settings.arch, "low_cap");
        assert_eq!(settings.worker.command, "/opt/worker");
        assert_eq!(settings.worker.args, WorkerSettings::default().args);
        assert_eq!(settings.epochs, 25);
    }

    #[test]
    fn test_load_settings_missing_file_is_error() {
        let missing = Path::new("/nonexistent/infogan/run.toml");
        assert!(load_settings(Some(missing), &SettingsOverrides::default()).is_err());
    }
}
