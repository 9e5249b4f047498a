// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod subagent_bridge;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, CronCommands, MemoryCommands};
use subagent_bridge::{EngineExecutor, EngineNotifier};
use vigil_channels::{cli::CliChannel, webhook::WebhookChannel, ChannelRegistry, UnknownChannelPolicy};
use vigil_config::Config;
use vigil_core::AgentRuntimeContext;
use vigil_engine::Engine;
use vigil_gateway::state::AppState;
use vigil_memory::MemoryStore;
use vigil_scheduler::{CronService, HeartbeatService};
use vigil_store::Store;
use vigil_subagent::SubagentManager;
use vigil_telemetry::Telemetry;
use vigil_tools::{FsTool, ReadImageTool, ShellTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        None | Some(Commands::Serve) => serve(cli.config.as_deref()).await,
        Some(Commands::ShowConfig) => show_config(cli.config.as_deref()),
        Some(Commands::ListModels) => list_models(),
        Some(Commands::ListProviders) => list_providers(),
        Some(Commands::Completions { shell }) => {
            cli::print_completions(shell);
            Ok(())
        }
        Some(Commands::Cron { command }) => run_cron_command(cli.config.as_deref(), command).await,
        Some(Commands::Memory { command }) => run_memory_command(cli.config.as_deref(), command).await,
    }
}

fn init_logging(verbose: u8) {
    let default_directive = match verbose {
        0 => "vigil=info,warn",
        1 => "vigil=debug,info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

fn show_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = vigil_config::load(config_path)?;
    println!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn list_models() -> anyhow::Result<()> {
    for entry in vigil_model::catalog::static_catalog() {
        println!("{:<16} {:<20} context={} max_output={}", entry.provider, entry.id, entry.context_window, entry.max_output_tokens);
    }
    Ok(())
}

fn list_providers() -> anyhow::Result<()> {
    for driver in vigil_model::list_drivers() {
        println!("{:<10} {}", driver.id, driver.description);
    }
    Ok(())
}

/// Resolve a config-supplied path relative to `workspace_root` unless it is
/// already absolute.
fn resolve_path(workspace_root: &Path, raw: &str) -> PathBuf {
    let p = Path::new(raw);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        workspace_root.join(p)
    }
}

/// Shared setup for every command that needs an opened Store: load config,
/// find the workspace root, and open the store at its configured path.
fn open_store_for_cli(config_path: Option<&Path>) -> anyhow::Result<(Config, Store, PathBuf)> {
    let config = vigil_config::load(config_path)?;
    let workspace_root = vigil_runtime::find_project_root().unwrap_or_else(|_| PathBuf::from("."));
    let store_path = resolve_path(&workspace_root, &config.store.path);
    let store = Store::open(&store_path).with_context(|| format!("opening store at {}", store_path.display()))?;
    Ok((config, store, workspace_root))
}

async fn run_cron_command(config_path: Option<&Path>, command: CronCommands) -> anyhow::Result<()> {
    let (_config, store, _root) = open_store_for_cli(config_path)?;
    match command {
        CronCommands::List { all } => {
            for job in store.list_jobs().await? {
                if !all && !job.enabled {
                    continue;
                }
                println!(
                    "{:<26} {:<20} enabled={:<5} next_run_at={:<26} last_status={:<7} last_error={}",
                    job.id,
                    job.name,
                    job.enabled,
                    job.next_run_at.as_deref().unwrap_or("-"),
                    job.last_status.as_deref().unwrap_or("-"),
                    job.last_error.as_deref().unwrap_or("-")
                );
            }
        }
        CronCommands::Put { name, schedule, message, session_id } => {
            vigil_scheduler::Schedule::parse(&schedule).context("invalid --schedule JSON")?;
            let job = vigil_store::Job {
                id: store.next_id(),
                name,
                schedule,
                session_id,
                payload: message.map(|m| serde_json::json!({ "message": m })).unwrap_or(serde_json::Value::Null),
                enabled: true,
                created_at: Store::now(),
                next_run_at: None,
                last_run_at: None,
                last_status: None,
                last_error: None,
            };
            store.put_job(job.clone()).await?;
            println!("created job {}", job.id);
        }
        CronCommands::Remove { id } => {
            store.delete_job(&id).await?;
            println!("removed job {id}");
        }
        CronCommands::Enable { id, enabled } => {
            let mut job = store.get_job(&id).await?.context("job not found")?;
            job.enabled = enabled;
            store.put_job(job).await?;
            println!("job {id} enabled={enabled}");
        }
        CronCommands::RunNow { id, force } => {
            let job = store.get_job(&id).await?.context("job not found")?;
            if !force && !job.enabled {
                anyhow::bail!("job {id} is disabled; pass --force to run it anyway");
            }
            println!("job {id} is due for a manual run; start the daemon to execute it (`vigil serve`)");
        }
    }
    Ok(())
}

async fn run_memory_command(config_path: Option<&Path>, command: MemoryCommands) -> anyhow::Result<()> {
    let (_config, _store, root) = open_store_for_cli(config_path)?;
    let memory_path = root.join(".vigil").join("memory.sqlite3");
    let memory = MemoryStore::open(&memory_path).with_context(|| format!("opening memory store at {}", memory_path.display()))?;
    match command {
        MemoryCommands::Search { query, limit } => {
            for hit in memory.search(&query, limit).await? {
                println!("[{:.3}] {}", hit.rank, hit.note.content);
            }
        }
        MemoryCommands::Recent { limit } => {
            for note in memory.list_recent(limit).await? {
                println!("{} {}", note.created_at, note.content);
            }
        }
        MemoryCommands::Add { content, session_id, tags } => {
            let note = vigil_memory::MemoryNote {
                id: ulid::Ulid::new().to_string(),
                session_id,
                content,
                tags,
                created_at: Store::now(),
            };
            memory.add(note.clone()).await?;
            println!("added note {}", note.id);
        }
    }
    Ok(())
}

/// Build the runtime context injected into every `Agent`: workspace root,
/// git/CI notes, project context file, and the discovered
/// skills/subagents/knowledge collections.
fn build_runtime_context(workspace_root: &Path) -> AgentRuntimeContext {
    let git = vigil_runtime::collect_git_context(workspace_root);
    let ci = vigil_runtime::detect_ci_context();
    let project_context_file = vigil_runtime::load_project_context_file(workspace_root);

    let skills: Vec<_> = vigil_runtime::discover_skills(Some(workspace_root))
        .into_iter()
        .chain(vigil_runtime::discover_commands(Some(workspace_root)))
        .collect();
    let agents = vigil_runtime::discover_agents(Some(workspace_root));
    let knowledge = vigil_runtime::discover_knowledge(Some(workspace_root));
    let drift = vigil_runtime::check_knowledge_drift(workspace_root, &knowledge);

    AgentRuntimeContext {
        project_root: Some(workspace_root.to_path_buf()),
        git_context_note: git.to_prompt_section(),
        ci_context_note: ci.to_prompt_section(),
        project_context_file,
        append_system_prompt: None,
        system_prompt_override: None,
        skills: vigil_runtime::SharedSkills::new(skills),
        agents: vigil_runtime::SharedAgents::new(agents),
        knowledge: vigil_runtime::SharedKnowledge::new(knowledge),
        knowledge_drift_note: vigil_runtime::format_drift_warnings(&drift),
    }
}

/// Pick the context window size for the configured model from the static
/// catalog, falling back to a conservative default for unknown models.
fn max_context_tokens_for(config: &Config) -> usize {
    vigil_model::catalog::static_catalog()
        .into_iter()
        .find(|entry| entry.provider == config.model.provider && entry.id == config.model.name)
        .map(|entry| entry.context_window as usize)
        .unwrap_or(32_000)
}

fn build_tool_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(FsTool);
    registry.register(ShellTool::default());
    registry.register(ReadImageTool);
    Arc::new(registry)
}

fn build_channel_registry(config: &Config) -> anyhow::Result<Arc<ChannelRegistry>> {
    let unknown = match config.channels.webhooks.first() {
        Some(hook) => UnknownChannelPolicy::Webhook(Arc::new(WebhookChannel::new(hook.id.clone(), hook.url.clone()))),
        None => UnknownChannelPolicy::Drop,
    };
    let mut registry = ChannelRegistry::new(unknown);
    registry.register(Arc::new(CliChannel::new()));

    for hook in &config.channels.webhooks {
        registry.register(Arc::new(WebhookChannel::new(hook.id.clone(), hook.url.clone())));
    }

    if let Some(telegram) = &config.channels.telegram {
        match vigil_channels::telegram::TelegramChannel::from_env(&telegram.bot_token_env, telegram.allowed_chat_ids.clone()) {
            Ok(channel) => registry.register(Arc::new(channel)),
            Err(e) => tracing::warn!(error = %e, "telegram channel not started"),
        }
    }

    Ok(Arc::new(registry))
}

async fn serve(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = vigil_config::load(config_path)?;
    let workspace_root = vigil_runtime::find_project_root().unwrap_or_else(|_| PathBuf::from("."));

    let store_path = resolve_path(&workspace_root, &config.store.path);
    let store = Store::open(&store_path).with_context(|| format!("opening store at {}", store_path.display()))?;
    let telemetry = Arc::new(Telemetry::new());

    let memory_path = workspace_root.join(".vigil").join("memory.sqlite3");
    let memory = Arc::new(
        MemoryStore::open(&memory_path).with_context(|| format!("opening memory store at {}", memory_path.display()))?,
    );

    let model = Arc::from(vigil_model::from_config(&config.model)?);
    let tools = build_tool_registry();
    let runtime_context = build_runtime_context(&workspace_root);
    let max_context_tokens = max_context_tokens_for(&config);

    let engine = Arc::new(Engine::new(
        model,
        tools,
        Arc::new(config.agent.clone()),
        runtime_context,
        max_context_tokens,
        &config,
        store.clone(),
        telemetry.clone(),
    ));

    let executor = Arc::new(EngineExecutor::new(engine.clone()));
    let notifier: Option<Arc<dyn vigil_subagent::SubagentNotifier>> =
        if config.subagent.notify_on_complete { Some(Arc::new(EngineNotifier::new(engine.clone()))) } else { None };
    let subagents = SubagentManager::new(store.clone(), telemetry.clone(), config.subagent.clone(), executor, notifier);

    let cron = CronService::new(store.clone(), engine.clone(), telemetry.clone());
    let heartbeat = HeartbeatService::new(
        store.clone(),
        engine.clone(),
        telemetry.clone(),
        workspace_root.clone(),
        config.scheduler.heartbeat_interval_secs,
        config.scheduler.heartbeat_file.clone(),
        None,
    );

    let channels = build_channel_registry(&config)?;

    subagents.start().await.context("starting subagent manager")?;
    let _cron_handle = cron.start();
    let _heartbeat_handle = heartbeat.start();
    let _channel_handles = channels.start_all(engine.clone());
    let _dispatch_handle = channels.clone().run_outbound_dispatch(engine.clone(), telemetry.clone());

    let gateway_config = config.gateway.clone();
    let app_state = AppState::new(
        store,
        engine,
        subagents,
        cron,
        heartbeat,
        memory,
        telemetry,
        channels,
        gateway_config,
        workspace_root,
    );

    tracing::info!("vigil runtime started");
    vigil_gateway::serve(app_state).await
}
