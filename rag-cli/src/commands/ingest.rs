//! `ingest` command
//!
//! Reads a JSON array of drafts (`[{"category": …, "content": …}]`); the
//! upstream document parsers that produce such files are outside this tool.

use super::Runtime;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rag_core::memory::Recall;
use rag_core::types::FragmentDraft;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize)]
struct IngestReport {
    collection: String,
    drafts: usize,
    fragments_written: usize,
}

pub async fn run(
    runtime: &Runtime,
    file: &Path,
    collection: Option<&str>,
    replace: bool,
    format: OutputFormat,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut drafts: Vec<FragmentDraft> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of fragments", file.display()))?;

    let source_name = file.display().to_string();
    for draft in &mut drafts {
        if draft.source_file.is_none() {
            draft.source_file = Some(source_name.clone());
        }
    }

    let collection = collection
        .unwrap_or(&runtime.settings.store.active_collection)
        .to_string();

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("embedding {} drafts", drafts.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let draft_count = drafts.len();
    let written = runtime.memory.ingest(drafts, &collection, replace).await?;
    spinner.finish_and_clear();

    let report = IngestReport {
        collection,
        drafts: draft_count,
        fragments_written: written,
    };
    output::emit(format, &report, |report| {
        output::success(&format!(
            "ingested {} fragments into {} (from {} drafts)",
            report.fragments_written, report.collection, report.drafts
        ));
    })
}
