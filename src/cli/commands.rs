// Non-interactive subcommand execution
// Author: kelexine (https://github.com/kelexine)

use super::args::{Args, CacheAction, Command, FileAction, SourceArgs};
use super::{output, shell};
use crate::cache::{normalize_model, CachePolicy, ModelProfile};
use crate::config::{ApiKey, AppConfig};
use crate::error::{GemCacheError, Result};
use crate::flows::create::count_source_tokens;
use crate::flows::manage::{delete_caches, delete_files};
use crate::flows::{
    create_cache, filter_by_display_name, list_caches_or_empty, list_files_or_empty,
    model_for_cache, run_queries, split_prompts, CreateCacheOptions, CreationOutcome,
    ImplicitContext, QueryMode,
};
use crate::gemini::GeminiClient;
use crate::session::{report, Session, UsageLedger};
use crate::sources::{self, PreparedSource};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::path::Path;
use tracing::{debug, info};

/// Dispatch the parsed command line. No subcommand starts the shell.
pub async fn run(args: Args, config: AppConfig) -> Result<()> {
    let model = args
        .model
        .as_deref()
        .map(normalize_model)
        .unwrap_or_else(|| config.gemini.default_model.clone());

    match args.command.clone().unwrap_or(Command::Shell) {
        Command::Shell => {
            let mut session = Session::new(&config);
            session.model = model;
            match ApiKey::resolve(args.api_key.as_deref()) {
                Ok(key) => session.connect(&config.gemini, key)?,
                Err(_) => debug!("No API key yet; the shell will ask for one"),
            }
            shell::run(&config, &mut session).await
        }
        command => {
            let key = ApiKey::resolve(args.api_key.as_deref())?;
            let client = GeminiClient::new(&config.gemini, key)?;
            execute(command, &client, &config, &model).await
        }
    }
}

/// Prefix a bare id with its collection, e.g. `abc` -> `cachedContents/abc`.
pub fn qualify(name: &str, collection: &str) -> String {
    let name = name.trim();
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{}/{}", collection, name)
    }
}

async fn prepare_source(
    source: &SourceArgs,
    client: &GeminiClient,
    config: &AppConfig,
    display_name: Option<&str>,
) -> Result<PreparedSource> {
    let source = source.require_source()?;
    let prepared = sources::prepare(&source, client, &config.workspace, display_name).await?;
    output::note(&format!("Source: {}", prepared.label()));
    Ok(prepared)
}

async fn execute(command: Command, client: &GeminiClient, config: &AppConfig, model: &str) -> Result<()> {
    let policy = CachePolicy::from_settings(&config.cache);

    match command {
        Command::Upload { path, display_name } => {
            let file = client.upload_file(&path, display_name.as_deref()).await?;
            output::success(&format!("Uploaded {}", file.name));
            println!("{}", output::file_details(&file));
        }

        Command::Count { source } => {
            let prepared = prepare_source(&source, client, config, None).await?;
            if prepared.video_url().is_some() {
                output::note("Video URLs are not counted; they always use implicit caching");
                return Ok(());
            }
            let tokens = count_source_tokens(client, model, &prepared).await?;
            let plan = policy.plan(model, tokens);
            println!("{} tokens", tokens);
            if plan.is_explicit() {
                output::success("Large enough for an explicit cache");
            } else {
                output::note(&format!(
                    "Below the {} token minimum; queries would use implicit caching",
                    policy.required_tokens(model)
                ));
            }
        }

        Command::CreateCache {
            source,
            display_name,
            ttl,
            system_instruction,
            require_explicit,
        } => {
            let mut options = CreateCacheOptions::with_defaults(model, &config.cache);
            if let Some(name) = display_name {
                options.display_name = name;
            }
            if let Some(ttl) = ttl {
                options.ttl_seconds = ttl;
            }
            options.system_instruction = system_instruction;
            policy.validate_ttl(options.ttl_seconds)?;

            let prepared =
                prepare_source(&source, client, config, Some(&options.display_name)).await?;
            let creation = create_cache(client, &policy, &prepared, &options).await?;
            output::print_creation(&creation);

            if let CreationOutcome::Fallback { tokens, required, .. } = creation.outcome {
                if require_explicit {
                    return Err(GemCacheError::BelowCacheThreshold { tokens, required });
                }
            }
        }

        Command::Query {
            cache,
            implicit,
            source,
            prompts,
            prompts_file,
            export,
            export_each,
        } => {
            let mut all_prompts: Vec<String> = prompts
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if let Some(path) = prompts_file {
                all_prompts.extend(split_prompts(&std::fs::read_to_string(path)?));
            }
            if all_prompts.is_empty() {
                return Err(GemCacheError::InvalidInput(
                    "No prompts given. Use --prompt or --prompts-file".to_string(),
                ));
            }

            let mut query_model = model.to_string();
            let mode = if let Some(cache) = cache {
                let cache = client.get_cache(&qualify(&cache, "cachedContents")).await?;
                let (cache_model, warning) = model_for_cache(&cache, model);
                if let Some(w) = warning {
                    output::warning(&w);
                }
                query_model = cache_model;
                QueryMode::Explicit {
                    cache_name: cache.name,
                }
            } else if implicit {
                if let Some(w) = ModelProfile::for_model(model).implicit_warning(model) {
                    output::warning(&w);
                }
                let prepared = match source.to_source()? {
                    Some(src) => Some(sources::prepare(&src, client, &config.workspace, None).await?),
                    None => None,
                };
                QueryMode::Implicit {
                    context: ImplicitContext::from_source(prepared.as_ref())?,
                }
            } else {
                if source.to_source()?.is_some() {
                    output::warning("A source is only used with --implicit; sending prompts alone");
                }
                QueryMode::NoCache
            };

            let batch = run_queries(client, &query_model, &mode, &all_prompts).await;
            output::print_batch(&batch);

            let mut ledger = UsageLedger::new();
            for record in &batch.records {
                ledger.record_optional(record.usage.as_ref());
            }
            output::print_totals(&ledger, config.cache.cached_token_discount);

            if let Some(path) = export {
                let content = report::render(&batch.records, &ledger, config.cache.cached_token_discount);
                let written = report::export(&path, &content)?;
                output::success(&format!("Report written to {}", written.display()));
            }
            if let Some(dir) = export_each {
                let written = report::export_each(&dir, &batch.records)?;
                output::success(&format!("{} response file(s) written to {}", written.len(), dir.display()));
            }

            if batch.records.is_empty() && !batch.failures.is_empty() {
                return Err(GemCacheError::GeminiApi(format!(
                    "All {} prompt(s) failed",
                    batch.failures.len()
                )));
            }
        }

        Command::Caches { action } => cache_action(action, client, &policy).await?,
        Command::Files { action } => file_action(action, client).await?,

        Command::Shell => {
            return Err(GemCacheError::Internal(
                "the shell is started before a client is built".to_string(),
            ))
        }
    }

    Ok(())
}

async fn cache_action(action: CacheAction, client: &GeminiClient, policy: &CachePolicy) -> Result<()> {
    match action {
        CacheAction::List { filter } => {
            let caches = list_caches_or_empty(client).await;
            let shown = filter_by_display_name(&caches, filter.as_deref().unwrap_or(""));
            if shown.is_empty() {
                output::note("No caches found");
            } else {
                println!("{}", output::caches_table(&shown));
            }
        }
        CacheAction::Get { name } => {
            let cache = client.get_cache(&qualify(&name, "cachedContents")).await?;
            println!("{}", output::cache_details(&cache));
        }
        CacheAction::Ttl { name, seconds } => {
            policy.validate_ttl(seconds)?;
            let cache = client
                .update_cache_ttl(&qualify(&name, "cachedContents"), seconds)
                .await?;
            output::success(&format!("TTL of {} set to {}s", cache.name, seconds));
            println!("{}", output::cache_details(&cache));
        }
        CacheAction::Expire { name, time } => {
            let expire = chrono::DateTime::parse_from_rfc3339(time.trim()).map_err(|e| {
                GemCacheError::InvalidInput(format!("'{}' is not an RFC 3339 time: {}", time, e))
            })?;
            let cache = client
                .update_cache_expire_time(&qualify(&name, "cachedContents"), &expire.to_rfc3339())
                .await?;
            output::success(&format!("Expiry of {} updated", cache.name));
            println!("{}", output::cache_details(&cache));
        }
        CacheAction::Delete { names, yes } => {
            let names: Vec<String> = names.iter().map(|n| qualify(n, "cachedContents")).collect();
            if !yes && !confirm_delete(names.len(), "cache")? {
                output::note("Nothing deleted");
                return Ok(());
            }
            report_deletions(&names, delete_caches(client, &names).await)?;
        }
    }
    Ok(())
}

async fn file_action(action: FileAction, client: &GeminiClient) -> Result<()> {
    match action {
        FileAction::List { filter } => {
            let files = list_files_or_empty(client).await;
            let shown = filter_by_display_name(&files, filter.as_deref().unwrap_or(""));
            if shown.is_empty() {
                output::note("No files found");
            } else {
                println!("{}", output::files_table(&shown));
            }
        }
        FileAction::Get { name } => {
            let file = client.get_file(&qualify(&name, "files")).await?;
            println!("{}", output::file_details(&file));
        }
        FileAction::Delete { names, yes } => {
            let names: Vec<String> = names.iter().map(|n| qualify(n, "files")).collect();
            if !yes && !confirm_delete(names.len(), "file")? {
                output::note("Nothing deleted");
                return Ok(());
            }
            report_deletions(&names, delete_files(client, &names).await)?;
        }
    }
    Ok(())
}

pub(super) fn confirm_delete(count: usize, noun: &str) -> Result<bool> {
    let plural = if count == 1 { "" } else { "s" };
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Delete {} {}{}? This cannot be undone", count, noun, plural))
        .default(false)
        .interact()?)
}

pub(super) fn report_deletions(names: &[String], failed: Vec<(String, String)>) -> Result<()> {
    let deleted = names.len() - failed.len();
    if deleted > 0 {
        output::success(&format!("Deleted {} of {}", deleted, names.len()));
    }
    for (name, error) in &failed {
        output::failure(&format!("{}: {}", name, error));
    }
    info!("Deleted {} resource(s), {} failed", deleted, failed.len());

    if failed.is_empty() {
        Ok(())
    } else {
        Err(GemCacheError::GeminiApi(format!(
            "{} deletion(s) failed",
            failed.len()
        )))
    }
}

/// Write the session report under `dir`.
pub(super) fn export_report(dir: &Path, file_name: &str, content: &str) -> Result<()> {
    let written = report::export(&dir.join(file_name), content)?;
    output::success(&format!("Report written to {}", written.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("abc", "cachedContents"), "cachedContents/abc");
        assert_eq!(qualify("cachedContents/abc", "cachedContents"), "cachedContents/abc");
        assert_eq!(qualify(" xyz ", "files"), "files/xyz");
    }

    #[test]
    fn test_report_deletions() {
        let names = vec!["files/a".to_string(), "files/b".to_string()];
        assert!(report_deletions(&names, Vec::new()).is_ok());

        let failed = vec![("files/b".to_string(), "boom".to_string())];
        assert!(report_deletions(&names, failed).is_err());
    }
}
