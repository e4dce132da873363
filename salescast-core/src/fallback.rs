//! Heuristic predictor used while no model registry is loaded.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{DEFAULT_FUEL_PRICE, DEFAULT_TEMPERATURE, DEFAULT_UNEMPLOYMENT};
use crate::forecast::PredictionRequest;

pub const FALLBACK_MODEL_NAME: &str = "fallback_algorithm";
pub const BASE_SALES: f64 = 1000.0;

/// Source of the uniform draw in `[0, 1)` behind the fallback jitter.
pub trait JitterSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Unseeded; draws from the thread-local generator.
#[derive(Debug, Default)]
pub struct EntropyJitter;

impl JitterSource for EntropyJitter {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible sequence for a given seed.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn next_unit(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen::<f64>()
    }
}

/// Always returns the same draw. Useful for pinning the jitter factor.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn next_unit(&self) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

/// Base sales times every deterministic factor, before jitter and rounding.
pub fn heuristic_base(request: &PredictionRequest) -> f64 {
    let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    let unemployment = request.unemployment.unwrap_or(DEFAULT_UNEMPLOYMENT);
    let fuel_price = request.fuel_price.unwrap_or(DEFAULT_FUEL_PRICE);

    let mut sales = BASE_SALES;

    if request.is_holiday {
        sales *= 1.5;
    }

    if (60.0..=80.0).contains(&temperature) {
        sales *= 1.2;
    } else if temperature < 32.0 || temperature > 90.0 {
        sales *= 0.8;
    }

    if unemployment > 8.0 {
        sales *= 0.9;
    }

    if fuel_price > 3.0 {
        sales *= 0.95;
    }

    sales *= 1.0 + request.store_id.rem_euclid(10) as f64 * 0.05;
    sales *= 1.0 + request.dept_id.rem_euclid(5) as f64 * 0.03;

    sales
}

/// Heuristic forecast: `heuristic_base` times a jitter factor in
/// `[0.9, 1.1]`, rounded to cents.
pub fn fallback_prediction(request: &PredictionRequest, jitter: &dyn JitterSource) -> f64 {
    let factor = 0.9 + jitter.next_unit() * 0.2;
    round_cents(heuristic_base(request) * factor)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
