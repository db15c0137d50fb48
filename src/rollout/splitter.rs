//! Percentage-based deployment selection.
//!
//! # Responsibilities
//! - Pick one deployment out of the environment's active set
//! - Keep a client on the same deployment across requests (sticky key)
//! - Report "no deployment" for the dark remainder of a partial rollout
//!
//! # Design Decisions
//! - Single deployment at 100% short-circuits: no hashing, no randomness
//! - Ranges are cumulative in stored order, measured in basis points
//! - Sticky keys hash with FNV-1a plus an avalanche finalizer, which is
//!   stable across processes and toolchains
//! - Randomness is injected through `RandomSource` so callers can observe it

use std::fmt;

use rand::Rng;

use crate::rollout::ActiveDeployment;

/// Resolution of the selection space: 100% == 10_000 basis points.
pub const BASIS_POINTS: u32 = 10_000;

/// Source of uniform draws for visitors without a sticky key.
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Return a uniformly distributed value in `[0, BASIS_POINTS)`.
    fn draw(&self) -> u32;
}

/// Thread-local RNG backed source.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn draw(&self) -> u32 {
        rand::thread_rng().gen_range(0..BASIS_POINTS)
    }
}

/// Selects the deployment that serves a request.
#[derive(Debug)]
pub struct TrafficSplitter<R = ThreadRandom> {
    random: R,
}

impl TrafficSplitter<ThreadRandom> {
    pub fn new() -> Self {
        Self { random: ThreadRandom }
    }
}

impl Default for TrafficSplitter<ThreadRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> TrafficSplitter<R> {
    /// Use a custom randomness source for the keyless fallback.
    pub fn with_random(random: R) -> Self {
        Self { random }
    }

    /// Select the deployment for a request.
    ///
    /// Returns `None` when the point lands beyond the summed percentages,
    /// which callers serve as a not-found.
    pub fn select<'a>(
        &self,
        deployments: &'a [ActiveDeployment],
        sticky_key: Option<&str>,
    ) -> Option<&'a ActiveDeployment> {
        if let [only] = deployments {
            if only.percentage >= 100 {
                metrics::counter!("edge_rollout_selections_total", "path" => "fast").increment(1);
                return Some(only);
            }
        }
        if deployments.is_empty() {
            return None;
        }

        let (point, path) = match sticky_key.filter(|k| !k.is_empty()) {
            Some(key) => (sticky_point(key), "sticky"),
            None => (self.random.draw() % BASIS_POINTS, "random"),
        };
        metrics::counter!("edge_rollout_selections_total", "path" => path).increment(1);

        let chosen = pick(deployments, point);
        if chosen.is_none() {
            tracing::debug!(point, "Selection landed in the unpublished remainder");
        }
        chosen
    }
}

/// First deployment whose cumulative range contains `point`.
fn pick(deployments: &[ActiveDeployment], point: u32) -> Option<&ActiveDeployment> {
    let mut upper = 0u32;
    for deployment in deployments {
        upper = upper.saturating_add(deployment.percentage.min(100) * 100);
        if point < upper {
            return Some(deployment);
        }
    }
    None
}

/// Map a sticky key to a stable point in `[0, BASIS_POINTS)`.
pub fn sticky_point(key: &str) -> u32 {
    (mix64(fnv1a64(key.as_bytes())) % u64::from(BASIS_POINTS)) as u32
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// 64-bit avalanche (MurmurHash3 fmix64); FNV alone leaves low bits weak.
fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51afd7ed558ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
    h ^= h >> 33;
    h
}
