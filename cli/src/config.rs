use std::env;
use std::time::Duration;

use anyhow::Result;
use vecstore_client::ClientOptions;
use vecstore_core::{MismatchPolicy, StoreConfig, DEFAULT_BULK_PORT};

use crate::env_utils::{optional_string_env, parse_bool_env, parse_env};

const URL_DEFAULT: &str = "http://127.0.0.1:8080";
const TIMEOUT_MS_DEFAULT: u64 = 5000;
const DIMENSIONS_DEFAULT: usize = 1536;
const BATCH_MAX_SIZE_DEFAULT: usize = 100;
const BATCH_MAX_DELAY_MS_DEFAULT: u64 = 50;
const SEARCH_LIMIT_DEFAULT: usize = 5;

const COUNT: &str = "a positive integer";
const PORT: &str = "a valid port";

#[derive(Debug, Clone)]
pub(crate) struct CliConfig {
    pub(crate) url: String,
    pub(crate) bulk_port: u16,
    pub(crate) timeout_ms: u64,
    pub(crate) api_key: Option<String>,
    pub(crate) bearer_token: Option<String>,
    pub(crate) dimensions: usize,
    pub(crate) batch_max_size: usize,
    pub(crate) batch_max_delay_ms: u64,
    pub(crate) truncate_mismatched: bool,
    pub(crate) search_limit: usize,
}

impl CliConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let url = env::var("VECSTORE_URL").unwrap_or_else(|_| URL_DEFAULT.to_string());
        let bulk_port = parse_env("VECSTORE_BULK_PORT", DEFAULT_BULK_PORT, PORT)?;
        let timeout_ms = parse_env("VECSTORE_TIMEOUT_MS", TIMEOUT_MS_DEFAULT, COUNT)?;
        let api_key = optional_string_env("VECSTORE_API_KEY");
        let bearer_token = optional_string_env("VECSTORE_BEARER_TOKEN");
        let dimensions = parse_env("VECSTORE_DIMENSIONS", DIMENSIONS_DEFAULT, COUNT)?;
        let batch_max_size = parse_env("VECSTORE_BATCH_MAX_SIZE", BATCH_MAX_SIZE_DEFAULT, COUNT)?;
        let batch_max_delay_ms =
            parse_env("VECSTORE_BATCH_MAX_DELAY_MS", BATCH_MAX_DELAY_MS_DEFAULT, COUNT)?;
        let truncate_mismatched = parse_bool_env("VECSTORE_TRUNCATE_MISMATCHED", false)?;
        let search_limit = parse_env("VECSTORE_SEARCH_LIMIT", SEARCH_LIMIT_DEFAULT, COUNT)?;

        if !url.trim().starts_with("http://") {
            anyhow::bail!("VECSTORE_URL must start with http://, got '{url}'");
        }
        if bulk_port == 0 {
            anyhow::bail!("VECSTORE_BULK_PORT must be > 0");
        }
        if timeout_ms == 0 {
            anyhow::bail!("VECSTORE_TIMEOUT_MS must be > 0");
        }
        if dimensions == 0 {
            anyhow::bail!("VECSTORE_DIMENSIONS must be > 0");
        }
        if batch_max_size == 0 {
            anyhow::bail!("VECSTORE_BATCH_MAX_SIZE must be > 0");
        }
        if search_limit == 0 {
            anyhow::bail!("VECSTORE_SEARCH_LIMIT must be > 0");
        }

        Ok(Self {
            url,
            bulk_port,
            timeout_ms,
            api_key,
            bearer_token,
            dimensions,
            batch_max_size,
            batch_max_delay_ms,
            truncate_mismatched,
            search_limit,
        })
    }

    pub(crate) fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            api_key: self.api_key.clone(),
            bearer_token: self.bearer_token.clone(),
            ..ClientOptions::default()
        }
    }

    pub(crate) fn store_config(&self) -> StoreConfig {
        let mismatch = if self.truncate_mismatched {
            MismatchPolicy::TruncateToShorter
        } else {
            MismatchPolicy::Reject
        };
        StoreConfig {
            dimensions: self.dimensions,
            default_limit: self.search_limit,
            ..StoreConfig::default()
        }
        .with_batch_policy(
            self.batch_max_size,
            Duration::from_millis(self.batch_max_delay_ms),
        )
        .with_mismatch_policy(mismatch)
    }
}
