#![forbid(unsafe_code)]
//! Store-level benchmarks against the in-memory engine.
//!
//! Scenarios:
//! - `ingest`: batched `add_documents` throughput
//! - `search`: top-k search latency, half of the queries filtered

use std::env;
use std::process;

mod bench_utils;
mod ingest_bench;
mod search_bench;

fn main() {
    if cfg!(debug_assertions) && env::var("VECSTORE_ALLOW_DEBUG_BENCH").as_deref() != Ok("1") {
        eprintln!(
            "error=debug_build_not_allowed message=\"run `cargo run --release -p vecstore-bench`\""
        );
        process::exit(2);
    }

    let mode = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };

    let raw = env::var("VECSTORE_BENCH_SCENARIO").unwrap_or_else(|_| "all".to_string());
    let Some(scenario) = Scenario::parse(&raw) else {
        eprintln!("error=invalid_scenario scenario=\"{raw}\" allowed=\"all,ingest,search\"");
        process::exit(1);
    };

    let ingest_ok = !scenario.runs_ingest() || ingest_bench::run_ingest_bench(mode);
    let search_ok = !scenario.runs_search() || search_bench::run_search_bench(mode);
    if !(ingest_ok && search_ok) {
        process::exit(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    All,
    Ingest,
    Search,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "all" => Some(Self::All),
            "ingest" => Some(Self::Ingest),
            "search" => Some(Self::Search),
            _ => None,
        }
    }

    fn runs_ingest(self) -> bool {
        matches!(self, Self::All | Self::Ingest)
    }

    fn runs_search(self) -> bool {
        matches!(self, Self::All | Self::Search)
    }
}
