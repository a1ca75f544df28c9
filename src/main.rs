//! Armar CLI
//!
//! # Usage
//!
//! ```bash
//! # Run an experiment
//! armar train experiment.ini
//!
//! # Run with overrides, overwriting a previous output directory
//! armar train experiment.ini -f --set main.epochs=20
//!
//! # Initialize the output directory without building the model
//! armar train experiment.ini --init-only
//!
//! # Check a configuration without building it
//! armar validate experiment.ini
//!
//! # Show the sections of a configuration
//! armar info experiment.ini --format json
//! ```

use armar::builtin::builtin_registry;
use armar::config::{
    self, apply_overrides, Cli, Command, DependencyGraph, InfoArgs, InfoFormat, TrainArgs,
    ValidateArgs,
};
use armar::run::Orchestrator;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log = ConsoleLog {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Command::Train(args) => run_train(args, log),
        Command::Validate(args) => run_validate(args, log),
        Command::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy)]
struct ConsoleLog {
    quiet: bool,
    verbose: bool,
}

impl ConsoleLog {
    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    fn detail(&self, msg: &str) {
        if self.verbose && !self.quiet {
            println!("{msg}");
        }
    }
}

fn run_train(args: TrainArgs, log: ConsoleLog) -> Result<(), String> {
    let text = std::fs::read_to_string(&args.config)
        .map_err(|e| format!("cannot read {}: {e}", args.config.display()))?;

    let mut registry = config::load_str(&text).map_err(|e| format!("config error: {e}"))?;
    apply_overrides(&mut registry, &args.overrides).map_err(|e| format!("config error: {e}"))?;
    if args.overwrite {
        // -f has the same effect as overwrite_output_dir in the config.
        registry
            .set_field("main", "overwrite_output_dir", config::Value::Bool(true))
            .map_err(|e| format!("config error: {e}"))?;
    }

    let objects = config::assemble(&registry, &builtin_registry())
        .map_err(|e| format!("assembly error: {e}"))?;
    log.detail(&format!(
        "Assembled {} of {} sections",
        objects.len(),
        registry.len()
    ));

    let orchestrator = Orchestrator::from_objects(&objects)
        .map_err(|e| format!("assembly error: {e}"))?
        .with_config_text(text);

    if args.init_only {
        orchestrator
            .initialize_output()
            .map_err(|e| e.to_string())?;
        log.info("Experiment directory initialized.");
        return Ok(());
    }

    let summary = orchestrator.run().map_err(|e| e.to_string())?;
    log.info(&format!(
        "Done: {} steps, {} validation passes",
        summary.total_steps, summary.validations
    ));
    Ok(())
}

fn run_validate(args: ValidateArgs, log: ConsoleLog) -> Result<(), String> {
    let registry = config::load_file(&args.config).map_err(|e| format!("config error: {e}"))?;
    let graph = DependencyGraph::build(&registry).map_err(|e| format!("config error: {e}"))?;
    let order = config::resolution_order(&registry, &graph)
        .map_err(|e| format!("config error: {e}"))?;

    log.info("Configuration is valid");
    log.info(&format!(
        "  {} sections, {} reachable from [main]",
        registry.len(),
        order.len()
    ));
    log.detail(&format!("  construction order: {}", order.join(" -> ")));
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<(), String> {
    let registry = config::load_file(&args.config).map_err(|e| format!("config error: {e}"))?;

    match args.format {
        InfoFormat::Text => {
            for decl in registry.iter() {
                match &decl.class_path {
                    Some(class_path) => println!("[{}]  {}", decl.name, class_path),
                    None => println!("[{}]", decl.name),
                }
                for (key, value) in &decl.fields {
                    println!("  {key} = {value}");
                }
            }
        }
        InfoFormat::Json => {
            let sections: Vec<_> = registry.iter().collect();
            let rendered = serde_json::to_string_pretty(&sections)
                .map_err(|e| format!("serialization error: {e}"))?;
            println!("{rendered}");
        }
    }

    Ok(())
}
