//! Component D: online K-way clustering with background, single-flight
//! retraining and atomic immutable model publication.

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

pub const DEFAULT_K: usize = 4;
const MIN_FEATURES_TO_FIT: usize = 50;
const KMEANS_ITERATIONS: usize = 25;

fn regime_label(k: usize, rank: usize) -> String {
    if k == DEFAULT_K {
        match rank {
            0 => "Calm".to_string(),
            1 => "Stressed".to_string(),
            2 => "Execution Hot".to_string(),
            3 => "Manipulation Suspected".to_string(),
            _ => format!("Regime {rank}"),
        }
    } else {
        format!("Regime {rank}")
    }
}

/// An immutable, fully-fitted clustering model. Readers hold an `Arc` to one
/// of these; a retrain publishes a brand new instance rather than mutating
/// this one in place, so no reader ever observes a partially-updated model.
#[derive(Debug, Clone)]
pub struct FittedModel {
    k: usize,
    centroids: Vec<[f64; 4]>,
    /// `rank_map[raw_cluster_index] = stress_rank`
    rank_map: Vec<usize>,
}

impl FittedModel {
    fn fit(features: &[[f64; 4]], k: usize) -> Self {
        let mut rng = rand::thread_rng();
        let mut centroids = kmeans_plus_plus_init(features, k, &mut rng);

        for _ in 0..KMEANS_ITERATIONS {
            let mut sums = vec![[0.0_f64; 4]; k];
            let mut counts = vec![0usize; k];
            for f in features {
                let c = nearest(f, &centroids);
                for d in 0..4 {
                    sums[c][d] += f[d];
                }
                counts[c] += 1;
            }
            for c in 0..k {
                if counts[c] > 0 {
                    for d in 0..4 {
                        centroids[c][d] = sums[c][d] / counts[c] as f64;
                    }
                }
            }
        }

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| stress(&centroids[a]).total_cmp(&stress(&centroids[b])));
        let mut rank_map = vec![0usize; k];
        for (rank, &raw) in order.iter().enumerate() {
            rank_map[raw] = rank;
        }

        Self {
            k,
            centroids,
            rank_map,
        }
    }

    fn predict(&self, feature: [f64; 4]) -> usize {
        let raw = nearest(&feature, &self.centroids);
        self.rank_map[raw]
    }
}

fn stress(c: &[f64; 4]) -> f64 {
    c[0] + c[2] + c[3]
}

fn nearest(feature: &[f64; 4], centroids: &[[f64; 4]]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, sq_dist(feature, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn sq_dist(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn kmeans_plus_plus_init(features: &[[f64; 4]], k: usize, rng: &mut impl Rng) -> Vec<[f64; 4]> {
    let mut centroids = Vec::with_capacity(k);
    if let Some(first) = features.choose(rng) {
        centroids.push(*first);
    }
    while centroids.len() < k && centroids.len() < features.len() {
        let weights: Vec<f64> = features
            .iter()
            .map(|f| {
                centroids
                    .iter()
                    .map(|c| sq_dist(f, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            centroids.push(features[rng.gen_range(0..features.len())]);
            continue;
        }
        let mut target = rng.gen_range(0.0..total);
        let mut chosen = features[0];
        for (f, w) in features.iter().zip(weights.iter()) {
            if target <= *w {
                chosen = *f;
                break;
            }
            target -= w;
        }
        centroids.push(chosen);
    }
    while centroids.len() < k {
        centroids.push([0.0; 4]);
    }
    centroids
}

/// Per-session state for component D.
pub struct RegimeState {
    model: ArcSwapOption<FittedModel>,
    last_train_time: Mutex<Instant>,
    training_in_flight: AtomicBool,
    k: usize,
}

impl RegimeState {
    pub fn new(k: usize) -> Self {
        Self {
            model: ArcSwapOption::from(None),
            last_train_time: Mutex::new(Instant::now() - Duration::from_secs(3600)),
            training_in_flight: AtomicBool::new(false),
            k,
        }
    }
}

impl Default for RegimeState {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

pub struct RegimeClassifier;

#[derive(Debug, Clone)]
pub struct RegimeOutput {
    pub regime: usize,
    pub regime_label: String,
}

impl RegimeClassifier {
    /// Before any successful fit, regime is always 0 ("Calm").
    pub fn predict(state: &RegimeState, feature_vector: [f64; 4]) -> RegimeOutput {
        match state.model.load_full() {
            Some(model) => {
                let rank = model.predict(feature_vector);
                RegimeOutput {
                    regime: rank,
                    regime_label: regime_label(model.k, rank),
                }
            }
            None => RegimeOutput {
                regime: 0,
                regime_label: regime_label(state.k, 0),
            },
        }
    }

    /// Called once per tick by the analytics worker. If a retrain is due and
    /// none is in flight, spawns a background fit over a snapshot of the
    /// feature ring and returns immediately; the hot path never blocks on it.
    pub fn maybe_retrain(
        state: Arc<RegimeState>,
        feature_snapshot: Vec<[f64; 4]>,
        retrain_interval: Duration,
    ) {
        if feature_snapshot.len() <= MIN_FEATURES_TO_FIT {
            return;
        }
        {
            let last = *state.last_train_time.lock();
            if last.elapsed() < retrain_interval {
                return;
            }
        }
        if state
            .training_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        *state.last_train_time.lock() = Instant::now();
        let k = state.k;
        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || FittedModel::fit(&feature_snapshot, k)).await;
            match result {
                Ok(model) => {
                    state.model.store(Some(Arc::new(model)));
                }
                Err(join_err) => {
                    error!(error = %join_err, "regime retrain task panicked; keeping previous model");
                    warn!("regime classifier retrain failed, previous model retained");
                }
            }
            state.training_in_flight.store(false, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_defaults_to_calm_before_first_fit() {
        let state = RegimeState::new(DEFAULT_K);
        let out = RegimeClassifier::predict(&state, [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(out.regime, 0);
        assert_eq!(out.regime_label, "Calm");
    }

    #[test]
    fn fitted_model_ranks_centroids_by_stress_ascending() {
        let calm: [f64; 4] = [0.0, 0.1, 0.0, 0.0];
        let stressed: [f64; 4] = [5.0, 0.1, 5.0, 5.0];
        let mut features = Vec::new();
        for _ in 0..30 {
            features.push(calm);
            features.push(stressed);
        }
        let model = FittedModel::fit(&features, 2);
        let calm_rank = model.predict(calm);
        let stressed_rank = model.predict(stressed);
        assert!(calm_rank < stressed_rank);
    }
}
