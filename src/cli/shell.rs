//! Interactive session built on dialoguer.
//!
//! A menu loop walks the operator through configuration, adding a content
//! source, creating a cache, running prompts, managing remote caches and
//! files, and exporting the usage report. An error in one step is printed
//! and the menu comes back.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::commands::{confirm_delete, export_report, report_deletions};
use super::output;
use crate::cache::{normalize_model, CachePolicy, ModelProfile, CATALOG_ORDER, MODEL_CATALOG};
use crate::config::{ApiKey, AppConfig};
use crate::error::{GemCacheError, Result};
use crate::flows::manage::{delete_caches, delete_files, Resource};
use crate::flows::{
    create_cache, filter_by_display_name, list_caches_or_empty, list_files_or_empty,
    model_for_cache, run_queries, split_prompts, CreateCacheOptions, CreationOutcome,
    ImplicitContext, QueryMode,
};
use crate::session::{report, Session};
use crate::sources::{self, ContentSource};
use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Editor, Input, MultiSelect, Password, Select};
use std::path::{Path, PathBuf};
use tracing::info;

const MENU: [&str; 8] = [
    "Configure API key and model",
    "Add content source",
    "Create cache",
    "Run queries",
    "Manage caches",
    "Manage files",
    "Usage report",
    "← Exit",
];

struct Ui {
    term: Term,
    theme: ColorfulTheme,
}

impl Ui {
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<Option<usize>> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default.min(items.len().saturating_sub(1)))
            .interact_on_opt(&self.term)?)
    }

    fn input(&self, prompt: &str, default: Option<String>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default);
        }
        Ok(input.interact_text_on(&self.term)?.trim().to_string())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact_on(&self.term)?)
    }

    /// Pick one resource by label; `None` on Esc.
    fn pick<'a, T: Resource>(&self, prompt: &str, items: &[&'a T]) -> Result<Option<&'a T>> {
        if items.is_empty() {
            output::note("Nothing to choose from");
            return Ok(None);
        }
        let labels: Vec<String> = items.iter().map(|item| resource_label(*item)).collect();
        Ok(self.select(prompt, &labels, 0)?.map(|i| items[i]))
    }
}

fn resource_label<T: Resource>(item: &T) -> String {
    match item.display_name() {
        Some(display) => format!("{} ({})", display, item.name()),
        None => item.name().to_string(),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Run the menu loop until the operator exits.
pub async fn run(config: &AppConfig, session: &mut Session) -> Result<()> {
    let ui = Ui {
        term: Term::stdout(),
        theme: ColorfulTheme::default(),
    };

    output::heading("gemcache interactive session");
    println!(
        "{}",
        style("Use arrow keys to navigate, Enter to select, Esc to go back").dim()
    );
    info!("Interactive session {} started", session.id);

    loop {
        print_status(session);

        let result = match ui.select("What next?", &owned(&MENU), 0)? {
            Some(0) => configure(config, session, &ui),
            Some(1) => add_source(config, session, &ui).await,
            Some(2) => create_cache_step(config, session, &ui).await,
            Some(3) => run_queries_step(config, session, &ui).await,
            Some(4) => manage_caches(config, session, &ui).await,
            Some(5) => manage_files(session, &ui).await,
            Some(6) => report_step(config, session, &ui),
            _ => {
                println!("\n{}", style("Goodbye!").dim());
                return Ok(());
            }
        };

        if let Err(e) = result {
            output::failure(&e.to_string());
        }
    }
}

fn print_status(session: &Session) {
    let key = if session.is_connected() {
        style("set").green()
    } else {
        style("missing").red()
    };
    let source = session
        .source
        .as_ref()
        .map(|s| s.label())
        .unwrap_or_else(|| "none".to_string());

    println!(
        "\n{} key {} | model {} | source {} | cache {} | {} answer(s)",
        style("●").cyan(),
        key,
        style(&session.model).bold(),
        source,
        session.active_cache.as_deref().unwrap_or("none"),
        session.records().len()
    );
}

fn configure(config: &AppConfig, session: &mut Session, ui: &Ui) -> Result<()> {
    let items = owned(&["Set API key", "Choose model", "Clear API key", "← Back"]);
    match ui.select("Configuration", &items, 0)? {
        Some(0) => {
            let raw = Password::with_theme(&ui.theme)
                .with_prompt("Gemini API key")
                .interact_on(&ui.term)?;
            session.connect(&config.gemini, ApiKey::new(raw)?)?;
            output::success("API key set for this session");
        }
        Some(1) => choose_model(session, ui)?,
        Some(2) => {
            session.disconnect();
            output::success("API key cleared");
        }
        _ => {}
    }
    Ok(())
}

fn choose_model(session: &mut Session, ui: &Ui) -> Result<()> {
    let mut items: Vec<String> = CATALOG_ORDER
        .iter()
        .map(|id| match MODEL_CATALOG.get(*id) {
            Some(note) => format!("{}  ({})", id, note),
            None => id.to_string(),
        })
        .collect();
    items.push("Custom model id...".to_string());

    let current = CATALOG_ORDER
        .iter()
        .position(|id| *id == session.model)
        .unwrap_or(0);

    let model = match ui.select("Model", &items, current)? {
        Some(i) if i < CATALOG_ORDER.len() => CATALOG_ORDER[i].to_string(),
        Some(_) => {
            let raw = ui.input("Model id", Some(session.model.clone()))?;
            if raw.is_empty() {
                return Ok(());
            }
            normalize_model(&raw)
        }
        None => return Ok(()),
    };

    if let Some(w) = ModelProfile::for_model(&model).explicit_warning(&model) {
        output::warning(&w);
    }

    session.model = model;
    output::success(&format!("Model set to {}", session.model));
    Ok(())
}

async fn add_source(config: &AppConfig, session: &mut Session, ui: &Ui) -> Result<()> {
    let client = session.client()?.clone();
    let items = owned(&["Local file", "URL (download or YouTube)", "Paste text", "← Back"]);

    let source = match ui.select("Content source", &items, 0)? {
        Some(0) => {
            let path = ui.input("File path", None)?;
            if path.is_empty() {
                return Ok(());
            }
            ContentSource::File(PathBuf::from(path))
        }
        Some(1) => {
            let url = ui.input("URL", None)?;
            if url.is_empty() {
                return Ok(());
            }
            ContentSource::Url(url)
        }
        Some(2) => match Editor::new().extension(".txt").edit("")? {
            Some(text) if !text.trim().is_empty() => ContentSource::Text(text),
            _ => {
                output::note("No text entered");
                return Ok(());
            }
        },
        _ => return Ok(()),
    };

    let display_name = match &source {
        ContentSource::Text(_) => None,
        _ => Some(ui.input("Display name (optional)", None)?).filter(|s| !s.is_empty()),
    };

    let prepared =
        sources::prepare(&source, &client, &config.workspace, display_name.as_deref()).await?;
    output::success(&format!("Source ready: {}", prepared.label()));

    session.source = Some(prepared);
    session.implicit_context = None;
    session.files.invalidate();
    Ok(())
}

async fn create_cache_step(config: &AppConfig, session: &mut Session, ui: &Ui) -> Result<()> {
    let client = session.client()?.clone();
    let source = session
        .source
        .clone()
        .ok_or_else(|| GemCacheError::InvalidInput("Add a content source first".to_string()))?;
    let policy = CachePolicy::from_settings(&config.cache);

    let mut options = CreateCacheOptions::with_defaults(session.model.clone(), &config.cache);
    options.display_name = ui.input("Cache display name", Some(options.display_name.clone()))?;
    options.ttl_seconds = Input::<u64>::with_theme(&ui.theme)
        .with_prompt("TTL (seconds)")
        .default(options.ttl_seconds)
        .validate_with(|ttl: &u64| policy.validate_ttl(*ttl).map_err(|e| e.to_string()))
        .interact_text_on(&ui.term)?;

    if ui.confirm("Edit the system instruction?", false)? {
        let default = source.default_system_instruction();
        options.system_instruction = Editor::new()
            .extension(".txt")
            .edit(&default)?
            .filter(|s| !s.trim().is_empty());
    }

    let creation = create_cache(&client, &policy, &source, &options).await?;
    output::print_creation(&creation);

    match creation.outcome {
        CreationOutcome::Created { cache, .. } => {
            session.active_cache = Some(cache.name);
            session.caches.invalidate();
        }
        CreationOutcome::Fallback { context, .. } => {
            session.implicit_context = Some(context);
        }
    }
    Ok(())
}

fn read_prompts(ui: &Ui) -> Result<Vec<String>> {
    let edited = Editor::new()
        .extension(".txt")
        .edit("# One prompt per line. Lines starting with # are ignored.\n")?;

    let prompts: Vec<String> = match edited {
        Some(text) => split_prompts(&text)
            .into_iter()
            .filter(|p| !p.starts_with('#'))
            .collect(),
        None => {
            let single = ui.input("Prompt", None)?;
            split_prompts(&single)
        }
    };
    Ok(prompts)
}

async fn run_queries_step(config: &AppConfig, session: &mut Session, ui: &Ui) -> Result<()> {
    let client = session.client()?.clone();
    let model = session.model.clone();
    let profile = ModelProfile::for_model(&model);
    let mut query_model = model.clone();

    let items = owned(&["Explicit cache", "Implicit caching", "No cache"]);
    let default = if session.active_cache.is_some() {
        0
    } else if session.implicit_context.is_some() || session.source.is_some() {
        1
    } else {
        2
    };

    let mode = match ui.select("Caching mode", &items, default)? {
        Some(0) => {
            let caches = session
                .caches
                .get(|| list_caches_or_empty(&client))
                .await
                .to_vec();
            let all: Vec<_> = caches.iter().collect();
            let preferred = session
                .active_cache
                .as_ref()
                .and_then(|name| all.iter().position(|c| &c.name == name))
                .unwrap_or(0);
            if all.is_empty() {
                return Err(GemCacheError::InvalidInput(
                    "No caches available; create one first".to_string(),
                ));
            }
            let labels: Vec<String> = all.iter().map(|c| resource_label(*c)).collect();
            let Some(index) = ui.select("Cache", &labels, preferred)? else {
                return Ok(());
            };
            let name = all[index].name.clone();
            session.active_cache = Some(name.clone());
            let (cache_model, warning) = model_for_cache(all[index], &model);
            if let Some(w) = warning {
                output::warning(&w);
            }
            if let Some(w) = ModelProfile::for_model(&cache_model).explicit_warning(&cache_model) {
                output::warning(&w);
            }
            query_model = cache_model;
            QueryMode::Explicit { cache_name: name }
        }
        Some(1) => {
            if let Some(w) = profile.implicit_warning(&model) {
                output::warning(&w);
            }
            let context = match &session.implicit_context {
                Some(context) => context.clone(),
                None => ImplicitContext::from_source(session.source.as_ref())?,
            };
            QueryMode::Implicit { context }
        }
        Some(2) => QueryMode::NoCache,
        _ => return Ok(()),
    };

    let prompts = read_prompts(ui)?;
    if prompts.is_empty() {
        output::note("No prompts entered");
        return Ok(());
    }

    let batch = run_queries(&client, &query_model, &mode, &prompts).await;
    output::print_batch(&batch);
    session.record_batch(&batch);
    output::print_totals(session.ledger(), config.cache.cached_token_discount);
    Ok(())
}

async fn manage_caches(config: &AppConfig, session: &mut Session, ui: &Ui) -> Result<()> {
    let client = session.client()?.clone();
    let policy = CachePolicy::from_settings(&config.cache);
    let mut filter = String::new();

    loop {
        let caches = session
            .caches
            .get(|| list_caches_or_empty(&client))
            .await
            .to_vec();
        let shown = filter_by_display_name(&caches, &filter);

        output::heading("Caches");
        if shown.is_empty() {
            output::note("No caches found");
        } else {
            println!("{}", output::caches_table(&shown));
        }

        let items = owned(&[
            "Refresh",
            "Filter by display name",
            "Update TTL",
            "Set expiry time",
            "Use for queries",
            "Delete",
            "← Back",
        ]);
        match ui.select("Cache action", &items, 0)? {
            Some(0) => {
                session.caches.refresh(|| list_caches_or_empty(&client)).await;
            }
            Some(1) => filter = ui.input("Display name contains", Some(filter.clone()))?,
            Some(2) => {
                let Some(cache) = ui.pick("Cache", &shown)? else {
                    continue;
                };
                let seconds = Input::<u64>::with_theme(&ui.theme)
                    .with_prompt("New TTL (seconds)")
                    .default(config.cache.default_ttl_seconds)
                    .validate_with(|ttl: &u64| policy.validate_ttl(*ttl).map_err(|e| e.to_string()))
                    .interact_text_on(&ui.term)?;
                let updated = client.update_cache_ttl(&cache.name, seconds).await?;
                output::success(&format!("TTL of {} set to {}s", updated.name, seconds));
                session.caches.invalidate();
            }
            Some(3) => {
                let Some(cache) = ui.pick("Cache", &shown)? else {
                    continue;
                };
                let raw = Input::<String>::with_theme(&ui.theme)
                    .with_prompt("Expiry (RFC 3339, e.g. 2025-01-31T12:00:00Z)")
                    .validate_with(|s: &String| {
                        chrono::DateTime::parse_from_rfc3339(s.trim())
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    })
                    .interact_text_on(&ui.term)?;
                let updated = client
                    .update_cache_expire_time(&cache.name, raw.trim())
                    .await?;
                output::success(&format!("Expiry of {} updated", updated.name));
                session.caches.invalidate();
            }
            Some(4) => {
                if let Some(cache) = ui.pick("Cache", &shown)? {
                    session.active_cache = Some(cache.name.clone());
                    output::success(&format!("{} will be used for explicit queries", cache.name));
                }
            }
            Some(5) => {
                let names = pick_many(ui, "Caches to delete", &shown)?;
                if names.is_empty() || !confirm_delete(names.len(), "cache")? {
                    continue;
                }
                let failed = delete_caches(&client, &names).await;
                if let Err(e) = report_deletions(&names, failed) {
                    output::failure(&e.to_string());
                }
                if session
                    .active_cache
                    .as_ref()
                    .is_some_and(|active| names.contains(active))
                {
                    session.active_cache = None;
                }
                session.caches.invalidate();
            }
            _ => return Ok(()),
        }
    }
}

async fn manage_files(session: &mut Session, ui: &Ui) -> Result<()> {
    let client = session.client()?.clone();
    let mut filter = String::new();

    loop {
        let files = session
            .files
            .get(|| list_files_or_empty(&client))
            .await
            .to_vec();
        let shown = filter_by_display_name(&files, &filter);

        output::heading("Files");
        if shown.is_empty() {
            output::note("No files found");
        } else {
            println!("{}", output::files_table(&shown));
        }

        let items = owned(&["Refresh", "Filter by display name", "Details", "Delete", "← Back"]);
        match ui.select("File action", &items, 0)? {
            Some(0) => {
                session.files.refresh(|| list_files_or_empty(&client)).await;
            }
            Some(1) => filter = ui.input("Display name contains", Some(filter.clone()))?,
            Some(2) => {
                if let Some(file) = ui.pick("File", &shown)? {
                    println!("{}", output::file_details(file));
                }
            }
            Some(3) => {
                let names = pick_many(ui, "Files to delete", &shown)?;
                if names.is_empty() || !confirm_delete(names.len(), "file")? {
                    continue;
                }
                let failed = delete_files(&client, &names).await;
                if let Err(e) = report_deletions(&names, failed) {
                    output::failure(&e.to_string());
                }
                session.files.invalidate();
            }
            _ => return Ok(()),
        }
    }
}

fn pick_many<T: Resource>(ui: &Ui, prompt: &str, items: &[&T]) -> Result<Vec<String>> {
    if items.is_empty() {
        output::note("Nothing to choose from");
        return Ok(Vec::new());
    }
    let labels: Vec<String> = items.iter().map(|item| resource_label(*item)).collect();
    let chosen = MultiSelect::with_theme(&ui.theme)
        .with_prompt(format!("{} (space to toggle)", prompt))
        .items(&labels)
        .interact_on_opt(&ui.term)?
        .unwrap_or_default();
    Ok(chosen
        .into_iter()
        .map(|i| items[i].name().to_string())
        .collect())
}

fn report_step(config: &AppConfig, session: &mut Session, ui: &Ui) -> Result<()> {
    let discount = config.cache.cached_token_discount;
    if session.records().is_empty() {
        output::note("No answers yet");
        return Ok(());
    }

    println!("\n{}", session.render_report(discount));

    let items = owned(&[
        "Export combined report",
        "Export one file per response",
        "Clear history",
        "← Back",
    ]);
    let export_dir = Path::new(&config.workspace.export_dir);

    match ui.select("Report", &items, 0)? {
        Some(0) => {
            let file_name = ui.input("File name", Some(report::COMBINED_FILE_NAME.to_string()))?;
            export_report(export_dir, &file_name, &session.render_report(discount))?;
        }
        Some(1) => {
            let dir = ui.input("Directory", Some(config.workspace.export_dir.clone()))?;
            let written = report::export_each(Path::new(&dir), session.records())?;
            output::success(&format!("{} response file(s) written to {}", written.len(), dir));
        }
        Some(2) => {
            if ui.confirm("Clear all answers and usage totals?", false)? {
                session.reset_history();
                output::success("History cleared");
            }
        }
        _ => {}
    }
    Ok(())
}
