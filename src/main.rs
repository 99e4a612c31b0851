use anyhow::{Context, Result};
use nightwatch::cli::commands::{build_registry, PrintCommand, RunCommand, TasksCommand, ValidateCommand};
use nightwatch::cli::output::*;
use nightwatch::cli::{Cli, Command};
use nightwatch::core::config::JobConfig;
use nightwatch::core::state::RunStatus;
use nightwatch::core::variables;
use nightwatch::execution::Engine;
use nightwatch::logging::init_logging;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();
    init_logging(cli.verbose)?;

    match &cli.command {
        Command::Run(cmd) => run_job(cmd, cli.verbose).await?,
        Command::Validate(cmd) => validate_job(cmd)?,
        Command::Print(cmd) => print_job(cmd)?,
        Command::Tasks(cmd) => list_tasks(cmd)?,
    }

    Ok(())
}

async fn run_job(cmd: &RunCommand, verbose: bool) -> Result<()> {
    let job = cmd.job.load()?;
    println!(
        "{} Loaded job: {}",
        INFO,
        style(job.name.as_deref().unwrap_or(&cmd.job.file)).bold()
    );
    for (key, value) in &cmd.job.var {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    for warning in job.lint() {
        warn!("{}", warning);
    }

    let registry = build_registry(cmd.tasks_dir.as_deref())?;
    let job_vars = cmd.job.job_variables(&job);
    let mut engine = Engine::from_job(&job, &job_vars, registry, cmd.engine_config());
    if let Some(sentinel) = cmd.initial_sentinel()? {
        engine = engine.with_sentinel(sentinel);
    }

    engine.add_event_handler(move |event| {
        if let Some(line) = format_event(&event, verbose) {
            println!("{}", line);
        }
    });

    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping run");
            shutdown.shutdown();
        }
    });

    println!();
    let result = engine.run().await;
    let report = engine.report().clone();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
    }

    match result {
        Ok(report) if report.status == RunStatus::Completed => Ok(()),
        Ok(_) => std::process::exit(130),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn validate_job(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating job...", INFO);

    let job = match JobConfig::from_file(&cmd.file) {
        Ok(job) => job,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let registry = build_registry(cmd.tasks_dir.as_deref())?;
    let missing = registry.unresolved(&job.blueprint);

    println!("{} Job configuration is valid!", CHECK);
    println!("  Name: {}", style(job.name.as_deref().unwrap_or("-")).bold());
    println!("  Phases: {}", style(job.blueprint.phase_count()).cyan());
    println!("  Steps: {}", style(job.blueprint.steps().count()).cyan());
    println!("  Variables: {}", style(job.variables().len()).cyan());

    for warning in job.lint() {
        println!("{} {}", WARN, warning);
    }
    for id in &missing {
        println!("{} Task '{}' is not registered", WARN, style(id).yellow());
    }

    if cmd.json {
        let json = serde_json::to_string_pretty(&job)?;
        println!("\n{}", json);
    }
    Ok(())
}

fn print_job(cmd: &PrintCommand) -> Result<()> {
    let job = cmd.job.load()?;
    let job_vars = cmd.job.job_variables(&job);
    let user_vars = job.variables();
    let blueprint = variables::resolve_with(job.blueprint.clone(), &user_vars, &job_vars);

    if cmd.json {
        let data = serde_json::json!({
            "name": job.name,
            "variables": variables::expand_user_variables(&user_vars, &job_vars),
            "phases": blueprint.phases,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&data).context("Failed to render blueprint")?
        );
        return Ok(());
    }

    println!("{} {}", INFO, style(job.name.as_deref().unwrap_or(&cmd.job.file)).bold());
    println!("{}", style("Variables").bold());
    println!("{}", format_variables(&user_vars));
    println!("{}", format_blueprint(&blueprint));
    Ok(())
}

fn list_tasks(cmd: &TasksCommand) -> Result<()> {
    let registry = build_registry(cmd.tasks_dir.as_deref())?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&registry.ids())?);
        return Ok(());
    }

    println!("{} {} task unit(s):", INFO, registry.len());
    for id in registry.ids() {
        println!("  {}", style(id).cyan());
    }
    Ok(())
}
