//! K-means clustering and RBF similarity to the cluster centres.

use crate::error::{ProcessingError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lloyd's k-means with k-means++ seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    tol: f64,
    random_state: u64,
    centroids: Option<Array2<f64>>,
    inertia: Option<f64>,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
            centroids: None,
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            // Distance to the nearest centroid chosen so far
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    (0..c)
                        .map(|j| euclidean_sq(x.row(i), centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let idx = rng.gen_range(0..n_samples);
                centroids.row_mut(c).assign(&x.row(idx));
                continue;
            }

            // Weighted random selection proportional to D²
            let r = rng.r#gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    /// Fit the centroids (unsupervised, no target needed).
    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 {
            return Err(ProcessingError::InvalidConfig(
                "k-means needs at least one cluster".to_string(),
            ));
        }
        if n_samples < self.n_clusters {
            return Err(ProcessingError::InvalidData(format!(
                "n_samples ({}) < n_clusters ({})",
                n_samples, self.n_clusters
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;

            // Assignment step
            let mut changed = 0usize;
            for (i, label) in labels.iter_mut().enumerate() {
                let nearest = nearest_centroid(x.row(i), centroids.view());
                if nearest != *label {
                    *label = nearest;
                    changed += 1;
                }
            }

            // Update step
            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }
            for (c, &count) in counts.iter().enumerate() {
                if count > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / count as f64);
                } else {
                    // Empty cluster, reseed from a random sample
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        let inertia: f64 = labels
            .iter()
            .enumerate()
            .map(|(i, &c)| euclidean_sq(x.row(i), centroids.row(c)))
            .sum();
        debug!(iterations, inertia, clusters = self.n_clusters, "k-means fitted");

        self.centroids = Some(centroids);
        self.inertia = Some(inertia);
        Ok(self)
    }

    /// Index of the nearest centroid for every row.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let centroids = self.centroids()?;
        Ok(x.rows()
            .into_iter()
            .map(|row| nearest_centroid(row, centroids.view()))
            .collect())
    }

    pub fn centroids(&self) -> Result<&Array2<f64>> {
        self.centroids
            .as_ref()
            .ok_or_else(|| ProcessingError::NotFitted("KMeans".to_string()))
    }

    pub fn inertia(&self) -> Option<f64> {
        self.inertia
    }
}

/// Gaussian RBF similarity of each sample to k-means cluster centres.
///
/// Fitting clusters the training rows. Transforming yields one column per
/// cluster holding `exp(-gamma * ||x - c||²)`, so values lie in `(0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSimilarity {
    gamma: f64,
    kmeans: KMeans,
}

impl ClusterSimilarity {
    pub fn new(n_clusters: usize, gamma: f64, random_state: u64) -> Self {
        Self {
            gamma,
            kmeans: KMeans::new(n_clusters).with_random_state(random_state),
        }
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<&mut Self> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(ProcessingError::InvalidConfig(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        self.kmeans.fit(x)?;
        Ok(self)
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let centroids = self.kmeans.centroids()?;
        if x.ncols() != centroids.ncols() {
            return Err(ProcessingError::InvalidData(format!(
                "cluster similarity fitted on {} inputs but received {}",
                centroids.ncols(),
                x.ncols()
            )));
        }
        let gamma = self.gamma;
        Ok(Array2::from_shape_fn(
            (x.nrows(), centroids.nrows()),
            |(i, c)| (-gamma * euclidean_sq(x.row(i), centroids.row(c))).exp(),
        ))
    }

    /// Output column names, `cluster_{i}_similarity`.
    pub fn output_names(&self) -> Vec<String> {
        (0..self.kmeans.n_clusters)
            .map(|i| format!("cluster_{}_similarity", i))
            .collect()
    }

    pub fn centroids(&self) -> Result<&Array2<f64>> {
        self.kmeans.centroids()
    }
}

fn euclidean_sq(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_centroid(row: ArrayView1<'_, f64>, centroids: ArrayView2<'_, f64>) -> usize {
    let mut best_c = 0;
    let mut best_dist = f64::MAX;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = euclidean_sq(row, centroid);
        if d < best_dist {
            best_dist = d;
            best_c = c;
        }
    }
    best_c
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
        ]
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let x = two_blobs();
        let mut kmeans = KMeans::new(2).with_random_state(42);
        kmeans.fit(x.view()).unwrap();
        let labels = kmeans.predict(x.view()).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert!(kmeans.inertia().unwrap() < 0.1);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let x = two_blobs();
        let mut a = KMeans::new(2).with_random_state(7);
        let mut b = KMeans::new(2).with_random_state(7);
        a.fit(x.view()).unwrap();
        b.fit(x.view()).unwrap();
        assert_eq!(a.centroids().unwrap(), b.centroids().unwrap());
    }

    #[test]
    fn test_kmeans_too_few_samples() {
        let x = array![[1.0, 2.0]];
        assert!(KMeans::new(3).fit(x.view()).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let err = KMeans::new(2).predict(two_blobs().view()).unwrap_err();
        assert!(err.is_not_fitted());
    }

    #[test]
    fn test_similarity_range_and_names() {
        let x = two_blobs();
        let mut similarity = ClusterSimilarity::new(2, 1.0, 42);
        similarity.fit(x.view()).unwrap();
        let out = similarity.transform(x.view()).unwrap();

        assert_eq!(out.shape(), &[6, 2]);
        assert!(out.iter().all(|&v| v > 0.0 && v <= 1.0));
        // Each sample sits on top of one centre and far from the other
        for row in out.rows() {
            let max = row.iter().cloned().fold(f64::MIN, f64::max);
            let min = row.iter().cloned().fold(f64::MAX, f64::min);
            assert!(max > 0.9);
            assert!(min < 1e-10);
        }
        assert_eq!(
            similarity.output_names(),
            vec!["cluster_0_similarity", "cluster_1_similarity"]
        );
    }

    #[test]
    fn test_similarity_rejects_bad_gamma() {
        let mut similarity = ClusterSimilarity::new(2, 0.0, 42);
        assert!(similarity.fit(two_blobs().view()).is_err());
    }
}
