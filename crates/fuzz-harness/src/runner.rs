//! Seeded fuzz runner
//!
//! Complements proptest for checks that are too expensive to shrink: each
//! case receives its index, which tests use as an RNG seed.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

/// Fuzz test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzConfig {
    /// Number of test cases to run
    pub cases: u64,
    /// Maximum shrink iterations on failure
    pub max_shrink_iters: u32,
    /// First seed handed to the runner's test closure
    pub seed: u64,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
            seed: 0,
        }
    }
}

impl FuzzConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cases(mut self, n: u64) -> Self {
        self.cases = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    /// Generate proptest config from this
    pub fn to_proptest_config(&self) -> proptest::test_runner::Config {
        proptest::test_runner::Config {
            cases: self.cases.min(u64::from(u32::MAX)) as u32,
            max_shrink_iters: self.max_shrink_iters,
            ..proptest::test_runner::Config::default()
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of a fuzz test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzResult {
    pub name: String,
    pub cases_run: u64,
    pub cases_passed: u64,
    pub cases_failed: u64,
    pub duration_ms: u64,
    /// Cases per second
    pub throughput: f64,
    pub failures: Vec<FuzzFailure>,
    pub passed: bool,
}

impl FuzzResult {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases_run: 0,
            cases_passed: 0,
            cases_failed: 0,
            duration_ms: 0,
            throughput: 0.0,
            failures: Vec::new(),
            passed: true,
        }
    }

    pub fn record_pass(&mut self) {
        self.cases_run += 1;
        self.cases_passed += 1;
    }

    pub fn record_fail(&mut self, failure: FuzzFailure) {
        self.cases_run += 1;
        self.cases_failed += 1;
        self.passed = false;
        self.failures.push(failure);
    }

    pub fn finalize(&mut self, duration: Duration) {
        self.duration_ms = duration.as_millis() as u64;
        let secs = duration.as_secs_f64();
        if secs > 0.0 {
            self.throughput = self.cases_run as f64 / secs;
        }
    }

    /// Print summary to stdout
    pub fn print_summary(&self) {
        println!("Fuzz Test: {}", self.name);
        println!(
            "  Cases: {} | Passed: {} | Failed: {} | {} ms ({:.0} cases/sec)",
            self.cases_run, self.cases_passed, self.cases_failed, self.duration_ms, self.throughput
        );
        for (i, f) in self.failures.iter().enumerate().take(5) {
            println!("  [{}] seed {}: {}", i + 1, f.seed, f.message);
        }
        if self.failures.len() > 5 {
            println!("  ... and {} more", self.failures.len() - 5);
        }
    }
}

/// Details of a test failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzFailure {
    pub message: String,
    pub seed: u64,
}

// ============================================================================
// Runner
// ============================================================================

pub struct FuzzRunner {
    config: FuzzConfig,
    results: Vec<FuzzResult>,
}

impl FuzzRunner {
    pub fn new(config: FuzzConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(FuzzConfig::default())
    }

    /// Run `test_fn` once per seed in `seed..seed + cases`
    pub fn run<F>(&mut self, name: &str, test_fn: F) -> &FuzzResult
    where
        F: Fn(u64) -> Result<(), String>,
    {
        let mut result = FuzzResult::new(name);
        let start = Instant::now();

        for seed in self.config.seed..self.config.seed + self.config.cases {
            match test_fn(seed) {
                Ok(()) => result.record_pass(),
                Err(message) => {
                    debug!("{} failed for seed {}: {}", name, seed, message);
                    result.record_fail(FuzzFailure { message, seed });
                }
            }
        }

        result.finalize(start.elapsed());
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }

    pub fn results(&self) -> &[FuzzResult] {
        &self.results
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Export results to JSON
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.results).unwrap_or_default()
    }
}
