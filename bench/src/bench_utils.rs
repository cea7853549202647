use std::env;
use std::time::Duration;

/// Latency summary over the measured runs plus the last run's tally
/// (batches for ingest, a result checksum for search).
pub(crate) struct RunStats {
    pub(crate) p50_ms: f64,
    pub(crate) p95_ms: f64,
    pub(crate) avg_ms: f64,
    pub(crate) total: Duration,
    pub(crate) tally: usize,
}

/// Runs `once` for warmup then measurement; any failed run aborts.
pub(crate) fn measure_runs(
    warmup_runs: usize,
    measured_runs: usize,
    mut once: impl FnMut() -> Option<(Duration, usize)>,
) -> Option<RunStats> {
    for _ in 0..warmup_runs {
        once()?;
    }

    let mut samples_ms = Vec::with_capacity(measured_runs);
    let mut total = Duration::ZERO;
    let mut tally = 0usize;
    for _ in 0..measured_runs {
        let (elapsed, run_tally) = once()?;
        samples_ms.push(elapsed.as_secs_f64() * 1_000.0);
        total += elapsed;
        tally = run_tally;
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&samples_ms);
    Some(RunStats {
        p50_ms,
        p95_ms,
        avg_ms,
        total,
        tally,
    })
}

fn summarize_ms(samples_ms: &[f64]) -> (f64, f64, f64) {
    let p50_ms = percentile_ms(samples_ms, 0.50);
    let p95_ms = percentile_ms(samples_ms, 0.95);
    let avg_ms = if samples_ms.is_empty() {
        0.0
    } else {
        samples_ms.iter().sum::<f64>() / samples_ms.len() as f64
    };
    (p50_ms, p95_ms, avg_ms)
}

fn percentile_ms(samples_ms: &[f64], quantile: f64) -> f64 {
    if samples_ms.is_empty() {
        return 0.0;
    }

    let mut sorted = samples_ms.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last_index = sorted.len().saturating_sub(1);
    let position = (quantile.clamp(0.0, 1.0) * last_index as f64).round() as usize;
    sorted[position]
}

/// Cheap, reproducible embedding stand-in; never all zeros.
pub(crate) fn deterministic_vector(seed: u64, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|index| {
            let mixed = (seed as usize)
                .wrapping_mul(31)
                .wrapping_add(index.wrapping_mul(17))
                % 10_000;
            (mixed as f32 + 1.0) / 10_000.0
        })
        .collect()
}

pub(crate) fn read_usize_env_with_min(key: &str, default: usize, min: usize) -> usize {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value >= min => value,
        Ok(value) => {
            eprintln!(
                "warn=invalid_env value={value} env={key} reason=\"must be >= {min}\" using_default={default}"
            );
            default
        }
        Err(_) => {
            eprintln!(
                "warn=invalid_env value=\"{raw}\" env={key} reason=\"parse_usize_failed\" using_default={default}"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_pick_sorted_positions() {
        let samples = [5.0, 1.0, 3.0, 2.0, 4.0];
        let (p50, p95, avg) = summarize_ms(&samples);
        assert_eq!(p50, 3.0);
        assert_eq!(p95, 5.0);
        assert_eq!(avg, 3.0);
        assert_eq!(summarize_ms(&[]), (0.0, 0.0, 0.0));
    }

    #[test]
    fn measure_runs_stops_on_first_failure() {
        let mut calls = 0;
        let stats = measure_runs(1, 3, || {
            calls += 1;
            (calls < 3).then_some((Duration::from_millis(1), calls))
        });
        assert!(stats.is_none());
        assert_eq!(calls, 3);

        let stats = measure_runs(0, 2, || Some((Duration::from_millis(2), 7)))
            .expect("successful runs must produce stats");
        assert_eq!(stats.total, Duration::from_millis(4));
        assert_eq!(stats.tally, 7);
    }

    #[test]
    fn deterministic_vectors_repeat_and_are_non_zero() {
        let left = deterministic_vector(7, 16);
        assert_eq!(left, deterministic_vector(7, 16));
        assert!(left.iter().all(|value| *value > 0.0));
    }
}
