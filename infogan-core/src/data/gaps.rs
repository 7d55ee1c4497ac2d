//! Regions of factor space withheld from the training split.

use serde::{Deserialize, Serialize};

/// Closed interval over one generating factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    pub factor: usize,
    pub lo: f32,
    pub hi: f32,
}

impl FactorRange {
    pub fn new(factor: usize, lo: f32, hi: f32) -> Self {
        Self { factor, lo, hi }
    }

    fn contains(&self, factors: &[f32]) -> bool {
        factors
            .get(self.factor)
            .is_some_and(|v| (self.lo..=self.hi).contains(v))
    }
}

/// A sample falls in a region when every range matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRegion {
    pub ranges: Vec<FactorRange>,
}

impl GapRegion {
    pub fn contains(&self, factors: &[f32]) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(|r| r.contains(factors))
    }
}

/// Union of regions never shown during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapPolicy {
    pub regions: Vec<GapRegion>,
}

impl GapPolicy {
    pub fn withholds(&self, factors: &[f32]) -> bool {
        self.regions.iter().any(|region| region.contains(factors))
    }

    /// Number of factors a sample must carry for the policy to be evaluated.
    pub fn required_factors(&self) -> usize {
        self.regions
            .iter()
            .flat_map(|region| region.ranges.iter())
            .map(|range| range.factor + 1)
            .max()
            .unwrap_or(0)
    }
}

impl Default for GapPolicy {
    /// The upper corner of the first two factors.
    fn default() -> Self {
        Self {
            regions: vec![GapRegion {
                ranges: vec![FactorRange::new(0, 0.75, 1.0), FactorRange::new(1, 0.75, 1.0)],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_corner() {
        let policy = GapPolicy::default();
        assert!(policy.withholds(&[0.8, 0.9]));
        assert!(policy.withholds(&[1.0, 0.75, 0.0]));
        assert!(!policy.withholds(&[0.8, 0.5]));
        assert!(!policy.withholds(&[0.1, 0.9]));
        assert_eq!(policy.required_factors(), 2);
    }

    #[test]
    fn test_missing_factor_never_matches() {
        let policy = GapPolicy::default();
        assert!(!policy.withholds(&[0.9]));
        assert!(!policy.withholds(&[]));
    }

    #[test]
    fn test_regions_are_unioned() {
        let policy = GapPolicy {
            regions: vec![
                GapRegion {
                    ranges: vec![FactorRange::new(0, 0.0, 0.1)],
                },
                GapRegion {
                    ranges: vec![FactorRange::new(2, 0.5, 0.6)],
                },
            ],
        };
        assert!(policy.withholds(&[0.05, 0.0, 0.0]));
        assert!(policy.withholds(&[0.5, 0.0, 0.55]));
        assert!(!policy.withholds(&[0.5, 0.0, 0.9]));
        assert_eq!(policy.required_factors(), 3);
    }

    #[test]
    fn test_empty_region_matches_nothing() {
        let policy = GapPolicy {
            regions: vec![GapRegion { ranges: vec![] }],
        };
        assert!(!policy.withholds(&[0.5]));
    }
}
