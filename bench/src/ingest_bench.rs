use std::time::{Duration, Instant};

use vecstore_core::{Document, MemoryEngine, StoreConfig, VectorStore};

use crate::bench_utils::{deterministic_vector, measure_runs, read_usize_env_with_min, RunStats};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_DOCUMENTS: usize = 5_000;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_WARMUP_RUNS: usize = 2;
const DEFAULT_MEASURED_RUNS: usize = 10;

#[derive(Clone, Copy)]
struct IngestBenchConfig {
    dimension: usize,
    documents: usize,
    batch_size: usize,
    warmup_runs: usize,
    measured_runs: usize,
}

fn load_config() -> IngestBenchConfig {
    IngestBenchConfig {
        dimension: read_usize_env_with_min("VECSTORE_BENCH_DIMENSION", DEFAULT_DIMENSION, 1),
        documents: read_usize_env_with_min("VECSTORE_BENCH_DOCUMENTS", DEFAULT_DOCUMENTS, 1),
        batch_size: read_usize_env_with_min("VECSTORE_BENCH_BATCH_SIZE", DEFAULT_BATCH_SIZE, 1),
        warmup_runs: read_usize_env_with_min("VECSTORE_BENCH_WARMUP_RUNS", DEFAULT_WARMUP_RUNS, 0),
        measured_runs: read_usize_env_with_min(
            "VECSTORE_BENCH_MEASURED_RUNS",
            DEFAULT_MEASURED_RUNS,
            1,
        ),
    }
}

pub(crate) fn run_ingest_bench(mode: &str) -> bool {
    let config = load_config();
    let documents: Vec<Document> = (0..config.documents)
        .map(|id| Document::new(format!("document {id}")).with_metadata("shard", (id % 8) as u64))
        .collect();

    let Some(stats) = measure_runs(config.warmup_runs, config.measured_runs, || {
        run_ingest_once(config, &documents)
    }) else {
        return false;
    };

    let total_docs = (config.measured_runs * config.documents) as f64;
    let docs_per_sec = total_docs / stats.total.as_secs_f64();
    let RunStats {
        p50_ms,
        p95_ms,
        avg_ms,
        tally: batches,
        ..
    } = stats;

    println!(
        "bench=store_ingest mode={mode} documents={} dimension={} batch_size={} warmup_runs={} measured_runs={} p50_ms={p50_ms:.6} p95_ms={p95_ms:.6} avg_ms={avg_ms:.6} docs_per_sec={docs_per_sec:.2} batches={batches}",
        config.documents,
        config.dimension,
        config.batch_size,
        config.warmup_runs,
        config.measured_runs,
    );

    true
}

fn run_ingest_once(config: IngestBenchConfig, documents: &[Document]) -> Option<(Duration, usize)> {
    let store_config = StoreConfig::default()
        .with_dimensions(config.dimension)
        .with_batch_policy(config.batch_size, Duration::from_secs(60));
    let store = VectorStore::open(MemoryEngine::new(), store_config);
    if let Err(error) = store.create_collection("bench", "ingest benchmark") {
        eprintln!("error=collection_create_failed detail=\"{error}\"");
        return None;
    }

    let vectors: Vec<Vec<f32>> = (0..documents.len())
        .map(|id| deterministic_vector(id as u64, config.dimension))
        .collect();

    let started_at = Instant::now();
    let report = match store.add_documents("bench", documents, vectors) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("error=ingest_failed detail=\"{error}\"");
            return None;
        }
    };
    let elapsed = started_at.elapsed();
    store.shutdown();

    if let Some(outcome) = report.failures().next() {
        eprintln!(
            "error=document_rejected index={} failed={}",
            outcome.index,
            report.failures().count()
        );
        return None;
    }

    Some((elapsed, report.batches))
}
