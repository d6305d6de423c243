//! `collections` subcommands

use super::Runtime;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use colored::Colorize;
use rag_core::memory::Recall;
use rag_core::types::CollectionStats;
use serde::Serialize;

#[derive(Serialize)]
struct CollectionListing {
    collections: Vec<String>,
}

#[derive(Serialize)]
struct CollectionReport {
    collection: String,
    #[serde(flatten)]
    stats: CollectionStats,
}

pub async fn list(runtime: &Runtime, format: OutputFormat) -> Result<()> {
    let collections = runtime.memory.list_collections().await?;
    output::emit(format, &CollectionListing { collections }, |listing| {
        if listing.collections.is_empty() {
            println!("{}", "no collections".dimmed());
            return;
        }
        for name in &listing.collections {
            println!("{name}");
        }
    })
}

pub async fn stats(runtime: &Runtime, collection: &str, format: OutputFormat) -> Result<()> {
    let stats = runtime.memory.stats(collection).await?;
    let report = CollectionReport {
        collection: collection.to_string(),
        stats,
    };
    output::emit(format, &report, |report| {
        println!("{}", report.collection.bold());
        println!("  fragments: {}", report.stats.fragment_count);
        println!("  embedded:  {}", report.stats.embedded_count);
        println!("  content:   {} bytes", report.stats.total_content_bytes);
    })
}

pub async fn delete(runtime: &Runtime, collection: &str) -> Result<()> {
    runtime.memory.delete_collection(collection).await?;
    output::success(&format!("deleted collection {collection}"));
    Ok(())
}
