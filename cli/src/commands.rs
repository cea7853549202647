use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use vecstore_core::{Document, Engine, Metadata, QueryFilter, VectorStore};

/// Operator command line for vecstore collections.
///
/// The engine and store are configured through `VECSTORE_*` environment
/// variables; results are printed to stdout as JSON.
#[derive(Debug, Parser)]
#[command(name = "vecstore", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub(crate) enum Command {
    /// Create a document collection
    Create {
        name: String,
        /// Free-form description; remaining words are joined with spaces
        description: Vec<String>,
    },
    /// Delete a collection and everything in it
    Delete { name: String },
    /// List collection names
    List,
    /// Describe a collection
    Info { name: String },
    /// Add documents from a file of `{text, metadata, vector}` lines
    Ingest { collection: String, path: PathBuf },
    /// Run a `{vector, filters?, limit?}` query from a JSON file
    Search { collection: String, path: PathBuf },
}

/// One line of an ingest file.
#[derive(Debug, Deserialize)]
pub(crate) struct IngestRecord {
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) metadata: Metadata,
    pub(crate) vector: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    pub(crate) vector: Vec<f32>,
    #[serde(default)]
    pub(crate) filters: Option<QueryFilter>,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) fn parse_ingest_records(input: &str) -> Result<Vec<IngestRecord>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid ingest record on line {}", number + 1))
        })
        .collect()
}

pub(crate) fn parse_search_query(input: &str) -> Result<SearchQuery> {
    serde_json::from_str(input).context("invalid search query")
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Runs one command and returns its JSON report.
pub(crate) fn run<E: Engine>(store: &VectorStore<E>, command: &Command) -> Result<Value> {
    match command {
        Command::Create { name, description } => {
            let created = store
                .create_collection(name, &description.join(" "))
                .with_context(|| format!("failed to create collection '{name}'"))?;
            Ok(json!({ "collection": name, "created": created }))
        }
        Command::Delete { name } => {
            let deleted = store.delete_collection(name);
            Ok(json!({ "collection": name, "deleted": deleted }))
        }
        Command::List => {
            let collections = store
                .try_list_collections()
                .context("failed to list collections")?;
            Ok(json!({ "collections": collections }))
        }
        Command::Info { name } => {
            let info = store
                .try_collection_info(name)
                .with_context(|| format!("failed to describe collection '{name}'"))?;
            Ok(serde_json::to_value(info)?)
        }
        Command::Ingest { collection, path } => {
            let records = parse_ingest_records(&read_input(path)?)?;
            ingest(store, collection, records)
        }
        Command::Search { collection, path } => {
            let query = parse_search_query(&read_input(path)?)?;
            search(store, collection, query)
        }
    }
}

pub(crate) fn ingest<E: Engine>(
    store: &VectorStore<E>,
    collection: &str,
    records: Vec<IngestRecord>,
) -> Result<Value> {
    let (documents, vectors): (Vec<Document>, Vec<Vec<f32>>) = records
        .into_iter()
        .map(|record| {
            let document = Document {
                text: record.text,
                metadata: record.metadata,
            };
            (document, record.vector)
        })
        .unzip();

    let report = store
        .add_documents(collection, &documents, vectors)
        .with_context(|| format!("failed to ingest into '{collection}'"))?;
    let failures: Vec<Value> = report
        .failures()
        .filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|error| json!({ "index": outcome.index, "error": error.to_string() }))
        })
        .collect();

    Ok(json!({
        "collection": collection,
        "inserted": report.inserted(),
        "failed": failures.len(),
        "batches": report.batches,
        "failures": failures,
    }))
}

pub(crate) fn search<E: Engine>(
    store: &VectorStore<E>,
    collection: &str,
    query: SearchQuery,
) -> Result<Value> {
    let results = store
        .try_search(collection, &query.vector, query.limit, query.filters.as_ref())
        .with_context(|| format!("search on '{collection}' failed"))?;
    Ok(json!({ "collection": collection, "results": results }))
}
