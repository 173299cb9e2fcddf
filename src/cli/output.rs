// Terminal rendering: tables, status lines and flow results
// Author: kelexine (https://github.com/kelexine)

use crate::flows::{CreationOutcome, CreationReport, QueryBatch};
use crate::models::gemini::{CachedContent, FileState, GeminiFile};
use crate::session::{TokenUsage, UsageLedger};
use crate::utils::format::{fmt_bytes, fmt_ts, truncate, MISSING};
use console::style;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Display name")]
    display_name: String,
    #[tabled(rename = "MIME type")]
    mime_type: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Expires")]
    expires: String,
}

#[derive(Tabled)]
struct CacheRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Display name")]
    display_name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Tokens")]
    tokens: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Expires")]
    expires: String,
}

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Prompt")]
    prompt: String,
    #[tabled(rename = "Input")]
    input: u64,
    #[tabled(rename = "Cached")]
    cached: u64,
    #[tabled(rename = "Output")]
    output: u64,
    #[tabled(rename = "Total")]
    total: u64,
}

fn or_missing(value: Option<&str>) -> String {
    value.unwrap_or(MISSING).to_string()
}

fn state_label(state: Option<FileState>) -> String {
    match state {
        Some(FileState::Active) => "ACTIVE",
        Some(FileState::Processing) => "PROCESSING",
        Some(FileState::Failed) => "FAILED",
        Some(FileState::StateUnspecified) | None => MISSING,
    }
    .to_string()
}

pub fn files_table(files: &[&GeminiFile]) -> String {
    let rows = files.iter().map(|f| FileRow {
        name: f.name.clone(),
        display_name: or_missing(f.display_name.as_deref()),
        mime_type: or_missing(f.mime_type.as_deref()),
        size: fmt_bytes(f.size()),
        state: state_label(f.state),
        created: fmt_ts(f.create_time.as_ref()),
        expires: fmt_ts(f.expiration_time.as_ref()),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn caches_table(caches: &[&CachedContent]) -> String {
    let rows = caches.iter().map(|c| CacheRow {
        name: c.name.clone(),
        display_name: or_missing(c.display_name.as_deref()),
        model: or_missing(c.model.as_deref()),
        tokens: c
            .cached_tokens()
            .map(|t| t.to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        created: fmt_ts(c.create_time.as_ref()),
        expires: fmt_ts(c.expire_time.as_ref()),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Per-query usage for a batch.
pub fn usage_table(batch: &QueryBatch) -> String {
    let rows = batch.records.iter().map(|r| {
        let usage = r.usage.unwrap_or_default();
        UsageRow {
            mode: r.mode.to_string(),
            prompt: truncate(&r.prompt, 40),
            input: usage.input_tokens,
            cached: usage.cached_tokens,
            output: usage.output_tokens,
            total: usage.total_tokens,
        }
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn file_details(file: &GeminiFile) -> String {
    [
        ("Name", file.name.clone()),
        ("Display name", or_missing(file.display_name.as_deref())),
        ("URI", or_missing(file.uri.as_deref())),
        ("MIME type", or_missing(file.mime_type.as_deref())),
        ("Size", fmt_bytes(file.size())),
        ("State", state_label(file.state)),
        ("Created", fmt_ts(file.create_time.as_ref())),
        ("Expires", fmt_ts(file.expiration_time.as_ref())),
    ]
    .iter()
    .map(|(k, v)| format!("{:>13}: {}", k, v))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn cache_details(cache: &CachedContent) -> String {
    [
        ("Name", cache.name.clone()),
        ("Display name", or_missing(cache.display_name.as_deref())),
        ("Model", or_missing(cache.model.as_deref())),
        (
            "Tokens",
            cache
                .cached_tokens()
                .map(|t| t.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
        ),
        ("Created", fmt_ts(cache.create_time.as_ref())),
        ("Updated", fmt_ts(cache.update_time.as_ref())),
        ("Expires", fmt_ts(cache.expire_time.as_ref())),
    ]
    .iter()
    .map(|(k, v)| format!("{:>13}: {}", k, v))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", style("⚠").yellow(), style(message).yellow());
}

pub fn failure(message: &str) {
    eprintln!("{} {}", style("✗").red(), style(message).red());
}

pub fn note(message: &str) {
    println!("{} {}", style("ℹ").blue(), message);
}

pub fn heading(title: &str) {
    println!("\n{}", style(title).bold().cyan());
}

pub fn print_creation(report: &CreationReport) {
    for w in &report.warnings {
        warning(w);
    }
    match &report.outcome {
        CreationOutcome::Created { cache, tokens } => {
            success(&format!("Cache created: {} ({} tokens)", cache.name, tokens));
            println!("{}", cache_details(cache));
        }
        CreationOutcome::Fallback {
            tokens, required, ..
        } => {
            if *tokens == 0 {
                note("Video sources are not cached explicitly; using implicit caching");
            } else {
                note(&format!(
                    "{} tokens is below the {} needed for an explicit cache; using implicit caching",
                    tokens, required
                ));
            }
        }
    }
}

pub fn print_batch(batch: &QueryBatch) {
    for record in &batch.records {
        println!(
            "\n{} {}",
            style(format!("[{}]", record.mode)).dim(),
            style(&record.prompt).bold()
        );
        println!("{}", record.answer_text());
        if record.usage.is_none() {
            println!("{}", style("No usage metadata available.").dim());
        }
    }

    if !batch.records.is_empty() {
        println!("\n{}", usage_table(batch));
    }

    for f in &batch.failures {
        failure(&format!("{}: {}", truncate(&f.prompt, 60), f.error));
    }
}

pub fn print_totals(ledger: &UsageLedger, discount: f64) {
    let TokenUsage {
        input_tokens,
        cached_tokens,
        output_tokens,
        total_tokens,
    } = ledger.totals();
    let savings = ledger.estimated_savings(discount);

    heading("Session usage");
    println!(
        "Queries: {}   Input: {}   Cached: {} ({:.1}%)   Output: {}   Total: {}",
        ledger.queries(),
        input_tokens,
        cached_tokens,
        savings.cached_share_pct,
        output_tokens,
        total_tokens
    );
    if cached_tokens > 0 {
        println!(
            "{}",
            style(format!(
                "~{:.0} input-token equivalents saved by caching",
                savings.saved_token_equivalents
            ))
            .green()
        );
    }
}
