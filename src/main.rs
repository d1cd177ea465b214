use actionpipe::cli::commands::{ListCommand, RunCommand, ValidateCommand};
use actionpipe::cli::output::*;
use actionpipe::cli::{Cli, Command};
use actionpipe::core::config::{count_steps, DomainConfig, STEP_KINDS};
use actionpipe::core::markup::MarkupLibrary;
use actionpipe::core::record::ObjectKind;
use actionpipe::core::template::{Template, TemplateRegistry};
use actionpipe::persistence::{load_records, InMemoryService};
use actionpipe::{ActionEngine, ChannelQueue, Factory};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_request(cmd, cli.verbose).await?,
        Command::Validate(cmd) => validate_domain(cmd)?,
        Command::List(cmd) => list_actions(cmd)?,
        Command::Kinds(_) => list_kinds(),
    }

    Ok(())
}

async fn run_request(cmd: &RunCommand, verbose: bool) -> Result<()> {
    let config = DomainConfig::from_file(&cmd.domain).context("Failed to load domain config")?;

    println!(
        "{} Loaded domain: {}",
        INFO,
        style(config.name.as_deref().unwrap_or(&cmd.domain)).bold()
    );

    let (queue, mut tasks) = ChannelQueue::new();
    let mut factory = Factory::from_config(&config, Arc::new(queue))?;

    // Seed in-memory services
    if let Some(path) = &cmd.records {
        let records = load_records(path)?;
        let mut by_kind: BTreeMap<ObjectKind, Vec<_>> = BTreeMap::new();
        for record in records {
            by_kind.entry(record.kind).or_default().push(record);
        }
        for (kind, records) in by_kind {
            println!(
                "{} Seeded {} {} record(s)",
                INFO,
                style(records.len()).cyan(),
                style(kind).bold()
            );
            let service = InMemoryService::new(kind);
            service.seed(records).await;
            factory = factory.with_service(Arc::new(service));
        }
    }

    let engine = ActionEngine::new(Arc::new(factory));
    engine
        .add_event_handler(|event| println!("{}", format_engine_event(&event)))
        .await;

    println!();
    let response = engine.handle(cmd.request(), cmd.authorization()).await;

    let max_lines = if verbose { usize::MAX } else { 60 };
    println!("\n{}", format_output(&format_response(&response), max_lines));

    let mut queued = Vec::new();
    while let Ok(task) = tasks.try_recv() {
        queued.push(task);
    }
    if !queued.is_empty() {
        println!("\n{} Queued tasks:", INFO);
        for task in &queued {
            println!("  {}", format_task(task));
        }
    }

    if !response.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_domain(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating domain...", INFO);

    match DomainConfig::from_file(&cmd.domain) {
        Ok(config) => {
            println!("{} Domain configuration is valid!", CHECK);
            if let Some(name) = &config.name {
                println!("  Name: {}", style(name).bold());
            }
            println!("  Templates: {}", style(config.templates.len()).cyan());
            println!("  Models: {}", style(config.models.len()).cyan());
            println!("  Markup: {}", style(config.markup.len()).cyan());

            let actions = config.actions();
            let steps: usize = actions.iter().map(|(_, _, a)| count_steps(&a.steps)).sum();
            println!("  Actions: {}", style(actions.len()).cyan());
            println!("  Steps: {}", style(steps).cyan());

            let unknown = config.unknown_steps();
            for (location, kind) in &unknown {
                println!(
                    "{} {}: unrecognized step '{}' will halt when run",
                    WARN,
                    location,
                    style(kind).yellow()
                );
            }

            if cmd.json {
                let summary = serde_json::json!({
                    "name": config.name,
                    "templates": config.templates.iter().map(|t| &t.id).collect::<Vec<_>>(),
                    "models": config.models.keys().collect::<Vec<_>>(),
                    "actions": actions.len(),
                    "steps": steps,
                    "unknown_steps": unknown
                        .iter()
                        .map(|(location, kind)| serde_json::json!({"location": location, "kind": kind}))
                        .collect::<Vec<_>>(),
                });
                println!("\n{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn list_actions(cmd: &ListCommand) -> Result<()> {
    let config = DomainConfig::from_file(&cmd.domain).context("Failed to load domain config")?;
    let registry = TemplateRegistry::from_config(&config);
    let markup = MarkupLibrary::from_sources(&config.markup)?;

    let templates: Vec<_> = registry.templates().collect();
    let models: Vec<_> = registry.models().collect();
    if templates.is_empty() && models.is_empty() {
        println!("{} No templates or models defined", INFO);
        return Ok(());
    }

    if !templates.is_empty() {
        println!("{} Templates:", INFO);
        for template in templates {
            println!(
                "  {} {}",
                style(&template.id).bold(),
                style(&template.label).dim()
            );
            print_actions(template);
        }
    }

    if !models.is_empty() {
        println!("{} Models:", INFO);
        for model in models {
            println!("  {}", style(&model.id).bold());
            print_actions(model);
        }
    }

    let names = markup.names();
    if !names.is_empty() {
        println!("{} Markup: {}", INFO, style(names.join(", ")).dim());
    }

    Ok(())
}

fn print_actions(template: &Template) {
    for (id, action) in &template.actions {
        let roles: Vec<String> = action
            .roles
            .iter()
            .map(|r| format!("{:?}", r).to_lowercase())
            .collect();
        println!(
            "    {}{} [{}] ({})",
            style(id).cyan(),
            if *id == template.default_action { " *" } else { "" },
            style(roles.join(", ")).dim(),
            action.pipeline.kinds().join(" > ")
        );
    }
}

fn list_kinds() {
    println!("{} Step kinds:", INFO);
    for kind in STEP_KINDS {
        println!("  {}", style(kind).cyan());
    }
}
