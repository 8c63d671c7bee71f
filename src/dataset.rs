//! Dataset collaborator: train/validation/test splitting, feature
//! standardization and one-hot labels.
//!
//! Standardization statistics are always fitted on the training split and
//! reused unchanged for validation and test.

use crate::error::{NetworkError, Result};
use crate::utils::SimpleRng;

/// One-hot encoding of `label` over `n_classes` classes.
pub fn one_hot(label: usize, n_classes: usize) -> Vec<f32> {
    let mut row = vec![0.0f32; n_classes];
    if let Some(slot) = row.get_mut(label) {
        *slot = 1.0;
    }
    row
}

/// Per-feature z-score scaling fitted on one set of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Standardizer {
    /// Features with (near) zero spread are centred but not scaled.
    const MIN_STD: f32 = 1e-8;

    pub fn fit(samples: &[Vec<f32>]) -> Self {
        let width = samples.first().map_or(0, Vec::len);
        let n = samples.len().max(1) as f32;

        let mut mean = vec![0.0f32; width];
        for row in samples {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut var = vec![0.0f32; width];
        for row in samples {
            for ((s, &v), &m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m) / n;
            }
        }
        let std = var
            .into_iter()
            .map(|v| {
                let s = v.sqrt();
                if s < Self::MIN_STD {
                    1.0
                } else {
                    s
                }
            })
            .collect();

        Self { mean, std }
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn std(&self) -> &[f32] {
        &self.std
    }

    pub fn transform(&self, samples: &mut [Vec<f32>]) {
        for row in samples {
            for ((v, &m), &s) in row.iter_mut().zip(&self.mean).zip(&self.std) {
                *v = (*v - m) / s;
            }
        }
    }
}

/// Features and one-hot labels of one split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Split {
    pub x: Vec<Vec<f32>>,
    pub y: Vec<Vec<f32>>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// The three disjoint splits produced by [`Dataset::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct Splits {
    pub train: Split,
    pub valid: Split,
    pub test: Split,
    /// Scaling fitted on `train`, when normalization was requested.
    pub standardizer: Option<Standardizer>,
}

/// `(X_train, y_train, X_valid, y_valid, X_test, y_test)`
pub type SplitTuple = (
    Vec<Vec<f32>>,
    Vec<Vec<f32>>,
    Vec<Vec<f32>>,
    Vec<Vec<f32>>,
    Vec<Vec<f32>>,
    Vec<Vec<f32>>,
);

impl Splits {
    pub fn into_tuple(self) -> SplitTuple {
        (
            self.train.x,
            self.train.y,
            self.valid.x,
            self.valid.y,
            self.test.x,
            self.test.y,
        )
    }
}

/// Labelled samples plus the split policy.
///
/// # Example
///
/// ```
/// use scratch_mlp::dataset::Dataset;
///
/// let features = (0..10).map(|i| vec![i as f32]).collect();
/// let labels = (0..10).map(|i| i % 2).collect();
/// let data = Dataset::new(features, labels, 2).unwrap().with_random_state(0);
///
/// let splits = data.load(true);
/// assert_eq!(splits.train.len() + splits.valid.len() + splits.test.len(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Vec<Vec<f32>>,
    labels: Vec<usize>,
    n_classes: usize,
    random_state: u64,
    valid_fraction: f32,
    test_fraction: f32,
}

impl Dataset {
    /// # Errors
    ///
    /// `ShapeMismatch` for ragged features or unequal counts, `Configuration`
    /// for an empty set or a label outside `0..n_classes`.
    pub fn new(features: Vec<Vec<f32>>, labels: Vec<usize>, n_classes: usize) -> Result<Self> {
        if features.is_empty() {
            return Err(NetworkError::config("dataset has no samples"));
        }
        if features.len() != labels.len() {
            return Err(NetworkError::shape(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let width = features[0].len();
        if let Some(i) = features.iter().position(|row| row.len() != width) {
            return Err(NetworkError::shape(format!(
                "feature row {} has width {}, expected {}",
                i,
                features[i].len(),
                width
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(NetworkError::config(format!(
                "label {} outside 0..{}",
                bad, n_classes
            )));
        }

        Ok(Self {
            features,
            labels,
            n_classes,
            random_state: 0,
            valid_fraction: 0.2,
            test_fraction: 0.2,
        })
    }

    /// Seed of the shuffle that assigns samples to splits.
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Fractions of samples held out for validation and test.
    pub fn with_split(mut self, valid_fraction: f32, test_fraction: f32) -> Result<Self> {
        let ok = |f: f32| (0.0..1.0).contains(&f);
        if !ok(valid_fraction) || !ok(test_fraction) || valid_fraction + test_fraction >= 1.0 {
            return Err(NetworkError::config(format!(
                "invalid split fractions: valid {} test {}",
                valid_fraction, test_fraction
            )));
        }
        self.valid_fraction = valid_fraction;
        self.test_fraction = test_fraction;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Shuffles, splits and one-hot encodes; optionally standardizes features
    /// with statistics of the training split only.
    pub fn load(&self, normalize: bool) -> Splits {
        let n = self.len();
        let n_test = (n as f32 * self.test_fraction).round() as usize;
        let n_valid = (n as f32 * self.valid_fraction).round() as usize;
        let n_train = n.saturating_sub(n_test + n_valid);

        let order = SimpleRng::new(self.random_state).permutation(n);
        let take = |indices: &[usize]| Split {
            x: indices.iter().map(|&i| self.features[i].clone()).collect(),
            y: indices
                .iter()
                .map(|&i| one_hot(self.labels[i], self.n_classes))
                .collect(),
        };

        let mut train = take(&order[..n_train]);
        let mut valid = take(&order[n_train..n_train + n_valid]);
        let mut test = take(&order[n_train + n_valid..]);

        let standardizer = normalize.then(|| {
            let scaler = Standardizer::fit(&train.x);
            scaler.transform(&mut train.x);
            scaler.transform(&mut valid.x);
            scaler.transform(&mut test.x);
            scaler
        });

        Splits {
            train,
            valid,
            test,
            standardizer,
        }
    }
}

/// Seeded toy datasets. Each generator returns `Configuration` when it would
/// produce no samples.
pub mod synthetic {
    use super::Dataset;
    use crate::error::Result;
    use crate::utils::SimpleRng;
    use std::f32::consts::PI;

    /// XOR corners `(±1, ±1)` with Gaussian jitter; class 1 when the signs differ.
    pub fn xor(per_corner: usize, noise: f32, seed: u64) -> Result<Dataset> {
        let mut rng = SimpleRng::new(seed);
        let mut features = Vec::with_capacity(4 * per_corner);
        let mut labels = Vec::with_capacity(4 * per_corner);
        for &(a, b) in &[(-1.0f32, -1.0f32), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
            for _ in 0..per_corner {
                features.push(vec![
                    a + noise * rng.gen_normal_f32(),
                    b + noise * rng.gen_normal_f32(),
                ]);
                labels.push(usize::from((a > 0.0) != (b > 0.0)));
            }
        }
        Dataset::new(features, labels, 2)
    }

    /// Two Gaussian clouds centred at `(-separation/2, 0)` and `(separation/2, 0)`.
    pub fn two_blobs(per_class: usize, separation: f32, seed: u64) -> Result<Dataset> {
        let mut rng = SimpleRng::new(seed);
        let mut features = Vec::with_capacity(2 * per_class);
        let mut labels = Vec::with_capacity(2 * per_class);
        for class in 0..2 {
            let cx = if class == 0 { -separation / 2.0 } else { separation / 2.0 };
            for _ in 0..per_class {
                features.push(vec![cx + rng.gen_normal_f32(), rng.gen_normal_f32()]);
                labels.push(class);
            }
        }
        Dataset::new(features, labels, 2)
    }

    /// Interleaved 2-D spiral arms, one per class.
    pub fn spirals(
        per_class: usize,
        n_classes: usize,
        noise: f32,
        seed: u64,
    ) -> Result<Dataset> {
        let mut rng = SimpleRng::new(seed);
        let mut features = Vec::with_capacity(per_class * n_classes);
        let mut labels = Vec::with_capacity(per_class * n_classes);
        for class in 0..n_classes {
            for i in 0..per_class {
                let r = i as f32 / per_class as f32;
                let theta = class as f32 * 2.0 * PI / n_classes as f32
                    + 4.0 * r
                    + noise * rng.gen_normal_f32();
                features.push(vec![r * theta.cos(), r * theta.sin()]);
                labels.push(class);
            }
        }
        Dataset::new(features, labels, n_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n: usize) -> Dataset {
        let features = (0..n).map(|i| vec![i as f32, 2.0 * i as f32 + 1.0]).collect();
        let labels = (0..n).map(|i| i % 3).collect();
        Dataset::new(features, labels, 3).unwrap()
    }

    #[test]
    fn test_one_hot() {
        assert_eq!(one_hot(2, 4), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(Dataset::new(vec![], vec![], 2).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![0, 1], 2).is_err());
        assert!(Dataset::new(vec![vec![1.0], vec![1.0, 2.0]], vec![0, 1], 2).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![5], 2).is_err());
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let splits = toy(50).with_random_state(3).load(false);
        assert_eq!(splits.train.len(), 30);
        assert_eq!(splits.valid.len(), 10);
        assert_eq!(splits.test.len(), 10);

        let mut seen: Vec<f32> = splits
            .train
            .x
            .iter()
            .chain(&splits.valid.x)
            .chain(&splits.test.x)
            .map(|r| r[0])
            .collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn test_normalization_uses_train_statistics_only() {
        let data = toy(50).with_random_state(3);
        let raw = data.load(false);
        let scaled = data.load(true);
        let scaler = scaled.standardizer.clone().unwrap();

        assert_eq!(scaler, Standardizer::fit(&raw.train.x));
        let expected = (raw.test.x[0][0] - scaler.mean()[0]) / scaler.std()[0];
        assert!((scaled.test.x[0][0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_random_state_is_deterministic() {
        assert_eq!(toy(20).with_random_state(9).load(true), toy(20).with_random_state(9).load(true));
    }

    #[test]
    fn test_with_split_validation() {
        assert!(toy(10).with_split(0.5, 0.5).is_err());
        assert!(toy(10).with_split(-0.1, 0.2).is_err());
        assert!(toy(10).with_split(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_constant_feature_is_not_scaled_to_infinity() {
        let scaler = Standardizer::fit(&[vec![3.0], vec![3.0]]);
        let mut rows = vec![vec![3.0]];
        scaler.transform(&mut rows);
        assert_eq!(rows[0][0], 0.0);
    }

    #[test]
    fn test_synthetic_generators_shapes() {
        let xor = synthetic::xor(5, 0.1, 1).unwrap();
        assert_eq!(xor.len(), 20);
        assert_eq!(xor.n_classes(), 2);

        let spirals = synthetic::spirals(10, 3, 0.0, 1).unwrap();
        assert_eq!(spirals.len(), 30);
        assert_eq!(spirals.n_features(), 2);
    }

    #[test]
    fn test_synthetic_generators_reject_zero_samples() {
        assert!(matches!(
            synthetic::xor(0, 0.1, 1),
            Err(NetworkError::Configuration(_))
        ));
        assert!(matches!(
            synthetic::two_blobs(0, 3.0, 1),
            Err(NetworkError::Configuration(_))
        ));
        assert!(matches!(
            synthetic::spirals(0, 3, 0.0, 1),
            Err(NetworkError::Configuration(_))
        ));
        assert!(matches!(
            synthetic::spirals(10, 0, 0.0, 1),
            Err(NetworkError::Configuration(_))
        ));
    }
}
