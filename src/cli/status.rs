use crate::cache::{CacheEntry, CachePhase, CacheStore};
use crate::cli::{format_age, Backend};
use crate::core::models::ResourceKey;
use crate::core::settings::Settings;
use crate::sources::DataSource;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct StatusOutput {
    resource: String,
    phase: CachePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

pub async fn run(json: bool, resource: ResourceKey) -> Result<()> {
    let backend = Backend::connect(Settings::load()?).await?;
    let config = backend.resolver.current().await;
    let ttl = config.ttl_for(resource.kind());

    let store = CacheStore::<serde_json::Value>::new();
    let cache = store.get(&resource).await;
    let source: Arc<dyn DataSource<serde_json::Value>> = backend.client.clone();
    let entry = cache.ensure_fresh(source, ttl).await;

    if json {
        let output = StatusOutput {
            resource: resource.to_string(),
            phase: entry.phase,
            fetched_at: entry.staleness,
            error: entry.error.clone(),
            data: entry.data.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&resource, &entry);
    }

    if entry.phase == CachePhase::Error {
        anyhow::bail!("Failed to fetch {resource}");
    }

    Ok(())
}

fn print_text_output(resource: &ResourceKey, entry: &CacheEntry<serde_json::Value>) {
    println!("{}", resource);

    if let Some(fetched_at) = entry.staleness {
        println!("  Fetched: {}", format_age(fetched_at));
    }

    if let Some(error) = &entry.error {
        println!("  Error:   {}", error);
    }

    if let Some(data) = &entry.data {
        println!("  Summary: {}", summarize(data));
    }
}

fn summarize(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::Array(items) => format!("{} items", items.len()),
        serde_json::Value::Object(fields) => {
            let mut keys: Vec<&str> = fields.keys().map(String::as_str).collect();
            keys.sort_unstable();
            format!("{} fields ({})", fields.len(), keys.join(", "))
        }
        other => other.to_string(),
    }
}
