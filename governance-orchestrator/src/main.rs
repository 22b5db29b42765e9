use anyhow::{Context, Result};
use clap::Parser;
use governance_sdk::{
    log_agent_done, log_agent_error, log_agent_retry, log_info, log_level_complete,
    log_level_start, log_warning, WorkflowEvent, WorkflowType,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use governance_orchestrator::audit::AuditAction;
use governance_orchestrator::cli::{load_context, Cli, Command, RunArgs};
use governance_orchestrator::database::Database;
use governance_orchestrator::{OrchestratorConfig, OrchestratorFactory, PipelineType, SqliteAuditSink};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = OrchestratorConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }

    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::Health { pipeline } => health(config, pipeline).await,
        Command::Types => {
            for workflow_type in WorkflowType::ALL {
                println!("{}", workflow_type);
            }
            Ok(())
        }
        Command::Audit { limit, action } => audit(&config, limit, action.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .init();
}

async fn run(config: OrchestratorConfig, args: RunArgs) -> Result<()> {
    let context = load_context(&args.context)?;

    let mut factory = OrchestratorFactory::new(config.clone());
    if !args.no_db {
        let path = config
            .resolved_database_path()
            .context("Could not determine the audit database location; pass --db or --no-db")?;
        debug!(path = %path.display(), "Opening audit database");
        factory = factory.with_audit(Arc::new(SqliteAuditSink::open(path)?));
    }

    let orchestrator = factory.build(args.pipeline)?;
    let available = orchestrator.available_agents();
    log_info!("Pipeline '{}' registered {} agents", args.pipeline, available.len());

    let custom_agents = args.custom_agents();
    if let Some(agents) = &custom_agents {
        for agent in agents.iter().filter(|a| !available.contains(a)) {
            log_warning!("Agent {} is not part of the '{}' pipeline", agent, args.pipeline);
        }
    }

    let printer = (args.progress || args.events).then(|| {
        tokio::spawn(print_progress(
            orchestrator.subscribe(),
            args.progress,
            args.events,
        ))
    });

    let workflow_id =
        orchestrator.create_workflow(args.workflow_type, context, custom_agents.as_deref())?;
    let outcome = orchestrator.execute_workflow(&workflow_id).await;

    // Closes the event channel so the printer drains and exits
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = outcome?;
    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write result to {}", path.display()))?;
            log_info!("Result written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

async fn print_progress(mut rx: broadcast::Receiver<WorkflowEvent>, progress: bool, events: bool) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                if progress {
                    log_warning!("Skipped {} progress events", skipped);
                }
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if events {
            event.emit();
        }
        if !progress {
            continue;
        }

        match event {
            WorkflowEvent::WorkflowStarted {
                workflow_id,
                workflow_type,
                total_tasks,
            } => {
                log_info!("Workflow {} started ({}, {} tasks)", workflow_id, workflow_type, total_tasks);
            }
            WorkflowEvent::LevelStarted {
                level,
                total_levels,
                agents,
                ..
            } => {
                log_level_start!(level, total_levels, agents.len());
            }
            WorkflowEvent::LevelCompleted {
                level,
                completed,
                failed,
                ..
            } => {
                log_level_complete!(level, completed, failed);
            }
            WorkflowEvent::AgentStarted { agent_name, .. } => {
                debug!(agent = %agent_name, "Agent started");
            }
            WorkflowEvent::AgentRetrying {
                agent_name,
                attempt,
                error,
                ..
            } => {
                log_agent_retry!(agent_name, attempt, error);
            }
            WorkflowEvent::AgentCompleted {
                agent_name,
                attempts,
                ..
            } => {
                log_agent_done!(agent_name, attempts);
            }
            WorkflowEvent::AgentFailed {
                agent_name, error, ..
            } => {
                log_agent_error!(agent_name, error);
            }
            WorkflowEvent::WorkflowCompleted {
                workflow_id,
                execution_time,
            } => {
                log_info!("Workflow {} completed in {:.2}s", workflow_id, execution_time);
            }
            WorkflowEvent::WorkflowFailed { workflow_id, error } => {
                log_warning!("Workflow {} failed: {}", workflow_id, error);
            }
            WorkflowEvent::WorkflowCancelled { workflow_id } => {
                log_warning!("Workflow {} was cancelled", workflow_id);
            }
        }
    }
}

async fn health(config: OrchestratorConfig, pipeline: PipelineType) -> Result<()> {
    let orchestrator = OrchestratorFactory::new(config).build(pipeline)?;
    let report = orchestrator.health_check().await?;

    if report.healthy_agents < report.total_agents {
        log_warning!(
            "{} of {} agents are unhealthy",
            report.total_agents - report.healthy_agents,
            report.total_agents
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn audit(config: &OrchestratorConfig, limit: usize, action: Option<&str>) -> Result<()> {
    let path = config
        .resolved_database_path()
        .context("Could not determine the audit database location; pass --db")?;
    let db = Database::new(path)?;
    db.initialize_schema()?;

    let action = action.map(str::parse::<AuditAction>).transpose()?;
    let records = db.list_audit_events(limit, 0, action)?;
    if records.is_empty() {
        log_info!("No audit events recorded");
        return Ok(());
    }

    for record in records {
        let details = &record.event.details;
        println!(
            "{}  {:<18}  {}  {}  risk={}  compliance={}",
            record.event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.event.action.as_str(),
            details.workflow_id,
            details.workflow_type,
            details
                .overall_risk
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            details
                .overall_compliance
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}
