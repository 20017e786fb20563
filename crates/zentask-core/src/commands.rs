use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{build_calendar_url, embed_url};
use crate::cli::Command;
use crate::config::Config;
use crate::datetime::{parse_date_expr, today};
use crate::grouping::{group_by_due_date, upcoming};
use crate::motivation::{GeminiQuoteProvider, MotivationController, Quote, QuoteProvider, QuoteSettings};
use crate::progress::{compute_progress, weekly_completions};
use crate::render::Renderer;
use crate::store::TaskStore;
use crate::task::Priority;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "done", "toggle", "delete", "sync", "stats", "agenda", "calendar", "motivate",
        "export",
    ]
}

/// Maps `default.command` to a command that takes no arguments.
pub fn default_command(cfg: &Config) -> anyhow::Result<Command> {
    let name = cfg.get("default.command").unwrap_or_else(|| "list".to_string());
    match name.trim() {
        "list" => Ok(Command::List),
        "stats" => Ok(Command::Stats),
        "agenda" => Ok(Command::Agenda { limit: 5 }),
        "calendar" => Ok(Command::Calendar),
        "motivate" => Ok(Command::Motivate),
        "export" => Ok(Command::Export),
        other => Err(anyhow!(
            "default.command must be a command without arguments, got: {other} (known: {})",
            known_command_names().join(", ")
        )),
    }
}

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Add {
            text,
            due,
            priority,
            sync,
        } => cmd_add(store, cfg, renderer, &text.join(" "), due.as_deref(), priority.as_deref(), sync),
        Command::List => cmd_list(store, renderer),
        Command::Done { id } => cmd_toggle(store, &id),
        Command::Delete { id } => cmd_delete(store, &id),
        Command::Sync { id } => cmd_sync(store, renderer, &id),
        Command::Stats => cmd_stats(store, renderer),
        Command::Agenda { limit } => cmd_agenda(store, renderer, limit),
        Command::Calendar => cmd_calendar(cfg),
        Command::Motivate => cmd_motivate(store, cfg, renderer),
        Command::Export => cmd_export(store),
    }
}

#[instrument(skip(store, cfg, renderer, text))]
fn cmd_add(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    text: &str,
    due: Option<&str>,
    priority: Option<&str>,
    sync: bool,
) -> anyhow::Result<()> {
    info!("command add");

    if text.trim().is_empty() {
        return Err(anyhow!("task text cannot be empty"));
    }

    let today = today();
    let due_date = match due {
        Some(raw) => parse_date_expr(raw, today)?,
        None => today,
    };
    let priority: Priority = match priority {
        Some(raw) => raw.parse()?,
        None => cfg.default_priority()?,
    };

    let Some(task) = store.create(text, due_date, priority) else {
        return Err(anyhow!("task text cannot be empty"));
    };
    println!("Created task {}.", task.short_id());

    if sync || cfg.get_bool("sync.auto").unwrap_or(false) {
        renderer.print_sync_link(&task, &build_calendar_url(&task))?;
        store.mark_synced(&task.id);
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_list(store: &TaskStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command list");

    let groups = group_by_due_date(store.tasks());
    renderer.print_groups(&groups, today())?;
    if !store.tasks().is_empty() {
        println!();
        renderer.print_progress(&compute_progress(store.tasks()))?;
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_toggle(store: &mut TaskStore, prefix: &str) -> anyhow::Result<()> {
    info!("command done");

    let Some(id) = resolve_id(store, prefix)? else {
        return Ok(());
    };
    store.toggle_completed(&id);
    if let Some(task) = store.get(&id) {
        let state = if task.completed { "completed" } else { "reopened" };
        println!("Task {} {state}.", task.short_id());
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete(store: &mut TaskStore, prefix: &str) -> anyhow::Result<()> {
    info!("command delete");

    let Some(id) = resolve_id(store, prefix)? else {
        return Ok(());
    };
    if store.delete(&id) {
        println!("Deleted task {prefix}.");
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_sync(store: &mut TaskStore, renderer: &mut Renderer, prefix: &str) -> anyhow::Result<()> {
    info!("command sync");

    let Some(id) = resolve_id(store, prefix)? else {
        return Ok(());
    };
    let Some(task) = store.get(&id).cloned() else {
        return Ok(());
    };
    if task.completed {
        return Err(anyhow!("task {} is completed; only pending tasks can be synced", task.short_id()));
    }

    renderer.print_sync_link(&task, &build_calendar_url(&task))?;
    store.mark_synced(&id);
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_stats(store: &TaskStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command stats");

    let progress = compute_progress(store.tasks());
    renderer.print_progress(&progress)?;
    println!();
    println!("Completed in the last 7 days:");
    renderer.print_weekly(&weekly_completions(store.tasks(), today()))?;
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_agenda(store: &TaskStore, renderer: &mut Renderer, limit: usize) -> anyhow::Result<()> {
    info!("command agenda");

    let today = today();
    renderer.print_agenda(&upcoming(store.tasks(), today, limit), today)
}

fn cmd_calendar(cfg: &Config) -> anyhow::Result<()> {
    let configured = cfg.get("calendar.embed");
    println!("{}", embed_url(configured.as_deref()));
    Ok(())
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_motivate(store: &TaskStore, cfg: &Config, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command motivate");

    let settings = QuoteSettings::from_config(cfg)?;
    let mut controller = MotivationController::new(Some(settings.timeout));
    let pending = store.pending_count();

    let quote = match GeminiQuoteProvider::new(&settings) {
        Ok(provider) => refresh_quote(&mut controller, Ok(&provider), pending)?,
        Err(err) => refresh_quote(&mut controller, Err(err), pending)?,
    };
    renderer.print_quote(&quote)
}

/// One refresh on a current-thread runtime. A provider that could not be
/// built, or a runtime that could not start, still ends in the fallback.
fn refresh_quote(
    controller: &mut MotivationController,
    provider: anyhow::Result<&dyn QuoteProvider>,
    pending: usize,
) -> anyhow::Result<Quote> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime");

    let quote = match (provider, runtime) {
        (Ok(provider), Ok(runtime)) => runtime.block_on(controller.refresh(provider, pending)),
        (Err(err), _) | (_, Err(err)) => controller
            .begin(pending)
            .map(|ticket| controller.finish(ticket, Err(err))),
    };
    quote.ok_or_else(|| anyhow!("a quote refresh is already in progress"))
}

fn cmd_export(store: &TaskStore) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(store.tasks())?;
    println!("{json}");
    Ok(())
}

/// Unknown ids are reported and otherwise ignored.
fn resolve_id(store: &TaskStore, prefix: &str) -> anyhow::Result<Option<String>> {
    let resolved = store.resolve_prefix(prefix)?.map(|task| task.id.clone());
    if resolved.is_none() {
        warn!(id = %prefix, "no task matches id");
        eprintln!("No task matches {prefix}.");
    }
    Ok(resolved)
}
