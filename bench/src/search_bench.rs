use std::time::{Duration, Instant};

use vecstore_core::{Document, FilterValue, MemoryEngine, QueryFilter, StoreConfig, VectorStore};

use crate::bench_utils::{deterministic_vector, measure_runs, read_usize_env_with_min, RunStats};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_DOCUMENTS: usize = 5_000;
const DEFAULT_QUERIES: usize = 50;
const DEFAULT_LIMIT: usize = 10;
const DEFAULT_WARMUP_RUNS: usize = 2;
const DEFAULT_MEASURED_RUNS: usize = 10;
const SHARDS: usize = 8;

#[derive(Clone, Copy)]
struct SearchBenchConfig {
    dimension: usize,
    documents: usize,
    queries: usize,
    limit: usize,
    warmup_runs: usize,
    measured_runs: usize,
}

fn load_config() -> SearchBenchConfig {
    SearchBenchConfig {
        dimension: read_usize_env_with_min("VECSTORE_BENCH_DIMENSION", DEFAULT_DIMENSION, 1),
        documents: read_usize_env_with_min("VECSTORE_BENCH_DOCUMENTS", DEFAULT_DOCUMENTS, 1),
        queries: read_usize_env_with_min("VECSTORE_BENCH_QUERIES", DEFAULT_QUERIES, 1),
        limit: read_usize_env_with_min("VECSTORE_BENCH_LIMIT", DEFAULT_LIMIT, 1),
        warmup_runs: read_usize_env_with_min("VECSTORE_BENCH_WARMUP_RUNS", DEFAULT_WARMUP_RUNS, 0),
        measured_runs: read_usize_env_with_min(
            "VECSTORE_BENCH_MEASURED_RUNS",
            DEFAULT_MEASURED_RUNS,
            1,
        ),
    }
}

pub(crate) fn run_search_bench(mode: &str) -> bool {
    let config = load_config();
    let Some(store) = populated_store(config) else {
        return false;
    };
    let queries: Vec<Vec<f32>> = (0..config.queries)
        .map(|id| deterministic_vector(1_000_003 + id as u64, config.dimension))
        .collect();

    let stats = measure_runs(config.warmup_runs, config.measured_runs, || {
        run_search_once(&store, config, &queries)
    });
    store.shutdown();
    let Some(stats) = stats else {
        return false;
    };

    let total_queries = (config.measured_runs * config.queries) as f64;
    let qps = total_queries / stats.total.as_secs_f64();
    let RunStats {
        p50_ms,
        p95_ms,
        avg_ms,
        tally: checksum,
        ..
    } = stats;

    println!(
        "bench=store_search mode={mode} documents={} dimension={} queries={} limit={} warmup_runs={} measured_runs={} p50_ms={p50_ms:.6} p95_ms={p95_ms:.6} avg_ms={avg_ms:.6} qps={qps:.2} checksum={checksum}",
        config.documents,
        config.dimension,
        config.queries,
        config.limit,
        config.warmup_runs,
        config.measured_runs,
    );

    true
}

fn populated_store(config: SearchBenchConfig) -> Option<VectorStore<MemoryEngine>> {
    let store = VectorStore::open(
        MemoryEngine::new(),
        StoreConfig::default().with_dimensions(config.dimension),
    );
    if let Err(error) = store.create_collection("bench", "search benchmark") {
        eprintln!("error=collection_create_failed detail=\"{error}\"");
        return None;
    }

    let documents: Vec<Document> = (0..config.documents)
        .map(|id| {
            Document::new(format!("document {id}")).with_metadata("shard", (id % SHARDS) as u64)
        })
        .collect();
    let vectors: Vec<Vec<f32>> = (0..config.documents)
        .map(|id| deterministic_vector(id as u64, config.dimension))
        .collect();

    match store.add_documents("bench", &documents, vectors) {
        Ok(report) if report.is_success() => Some(store),
        Ok(report) => {
            eprintln!(
                "error=populate_incomplete failed={}",
                report.failures().count()
            );
            None
        }
        Err(error) => {
            eprintln!("error=populate_failed detail=\"{error}\"");
            None
        }
    }
}

/// Alternates unfiltered and single-shard filtered queries.
fn run_search_once(
    store: &VectorStore<MemoryEngine>,
    config: SearchBenchConfig,
    queries: &[Vec<f32>],
) -> Option<(Duration, usize)> {
    let started_at = Instant::now();
    let mut checksum = 0usize;

    for (id, query) in queries.iter().enumerate() {
        let filter = (id % 2 == 1).then(|| {
            let mut filter = QueryFilter::new();
            filter.insert("shard".to_string(), FilterValue::Integer((id % SHARDS) as i64));
            filter
        });
        let results = match store.try_search("bench", query, Some(config.limit), filter.as_ref()) {
            Ok(results) => results,
            Err(error) => {
                eprintln!("error=search_failed query={id} detail=\"{error}\"");
                return None;
            }
        };
        checksum = checksum.wrapping_add(results.len());
    }

    Some((started_at.elapsed(), checksum))
}
