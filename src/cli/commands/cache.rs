//! Cache command - inspect or clear the module cache

use crate::cache::{format_bytes, scan, CacheEntry, EntryState};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::cache_dir;
use crate::config::Config;
use crate::error::HubResult;
use crate::storage::{dir_size, LocalStorage, Storage};
use crate::ui::{self, UiContext};
use console::Style;
use std::path::Path;
use tracing::debug;

/// Width of the module name column; names are 64-char hashes
const NAME_WIDTH: usize = 16;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> HubResult<()> {
    let dir = cache_dir(config, args.cache_dir)?;
    let storage = LocalStorage::new();

    match args.action {
        CacheAction::List { format } => list_entries(&storage, &dir, format).await,
        CacheAction::Clear { yes } => clear_cache(&storage, &dir, yes).await,
    }
}

/// List cached modules
async fn list_entries(storage: &dyn Storage, dir: &Path, format: OutputFormat) -> HubResult<()> {
    let entries = scan(storage, dir).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
        OutputFormat::Table if entries.is_empty() => {
            println!("No cached modules in {}", dir.display());
        }
        OutputFormat::Table => print_entry_table(&entries),
    }

    Ok(())
}

fn short_name(name: &str) -> &str {
    name.get(..NAME_WIDTH).unwrap_or(name)
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!(
        "{:<16} {:<12} {:>10}  {}",
        "MODULE", "STATE", "SIZE", "HANDLE"
    );
    println!("{}", "-".repeat(80));

    let mut total = 0;
    for entry in entries {
        let state_style = match entry.state {
            EntryState::Complete => Style::new().green(),
            EntryState::Downloading => Style::new().yellow(),
            EntryState::Partial => Style::new().dim(),
        };
        let size = entry
            .size_bytes
            .map(format_bytes)
            .unwrap_or_else(|| "-".to_string());
        total += entry.size_bytes.unwrap_or(0);

        // Pad before styling so escape codes don't break alignment
        println!(
            "{:<16} {} {:>10}  {}",
            short_name(&entry.name),
            state_style.apply_to(format!("{:<12}", entry.state)),
            size,
            entry.handle.as_deref().unwrap_or("-")
        );
    }

    println!();
    println!(
        "Total: {} module(s), {}",
        entries.len(),
        format_bytes(total)
    );
}

/// Remove every file and directory under the cache root
async fn clear_cache(storage: &dyn Storage, dir: &Path, yes: bool) -> HubResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);

    if !storage.exists(dir).await? {
        println!("Cache directory {} does not exist.", dir.display());
        return Ok(());
    }

    let names = storage.list_dir(dir).await?;
    if names.is_empty() {
        println!("Cache is already empty.");
        return Ok(());
    }

    let entries = scan(storage, dir).await?;
    let active = entries
        .iter()
        .filter(|e| e.state == EntryState::Downloading)
        .count();
    let size = dir_size(storage, dir).await?;

    println!(
        "This will remove {} item(s) ({}) from {}",
        names.len(),
        format_bytes(size),
        dir.display()
    );
    if active > 0 {
        ui::step_warn_hint(
            &ctx,
            &format!("{} module(s) are being downloaded", active),
            "running downloads will fail or start over",
        );
    }

    if !ui::confirm(&ctx, "Clear the cache?", false).await? {
        ui::remark(&ctx, "Aborted. Pass --yes to clear without prompting.");
        return Ok(());
    }

    let mut removed = 0;
    for name in names {
        let path = dir.join(&name);
        let result = if storage.stat(&path).await?.is_dir {
            storage.delete_recursive(&path).await
        } else {
            storage.remove(&path).await
        };

        match result {
            Ok(()) => {
                debug!("Removed {}", path.display());
                removed += 1;
            }
            // Another process cleaned it up first
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    ui::step_ok_detail(
        &ctx,
        &format!("Cleared {} item(s)", removed),
        &dir.display().to_string(),
    );
    Ok(())
}
