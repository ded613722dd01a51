// src/bin/arara.rs

use anyhow::{Context, Result};
use arara::{
    cli::Cli,
    constants::LOG_FILENAME,
    core::{cache::ChangeCache, config_loader, display, files, linear_executor, session::Session},
    eval::TemplateEvaluator,
    models::{ExecutionStatus, ProjectFile},
};
use clap::Parser;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// Exit code of a run aborted by an error, as opposed to a failed command.
const ERROR_EXIT_CODE: i32 = 2;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        display::print_error(&format!("{:#}", e));
    }

    let started = Instant::now();
    let code = match run(&cli) {
        Ok(status) => status.exit_code(),
        Err(e) => {
            display::print_error(&format!("{:#}", e));
            ERROR_EXIT_CODE
        }
    };
    display::print_total_time(started.elapsed());
    std::process::exit(code);
}

/// Logs go to stderr, filtered by `RUST_LOG` (`warn` by default). With
/// `--log` everything from `debug` up is written to the log file instead.
fn init_logging(cli: &Cli) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("warn");
    if !cli.log {
        env_logger::Builder::from_env(env).init();
        return Ok(());
    }

    let path = cli.working_directory.join(LOG_FILENAME);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run(cli: &Cli) -> Result<ExecutionStatus> {
    log::debug!("CLI args parsed: {:?}", cli);
    let options = config_loader::resolve_options(&cli.working_directory, &cli.overrides())?;

    let targets = cli
        .files
        .iter()
        .map(|name| files::resolve_file(name, &options.working_directory, &options.file_types))
        .collect::<Result<Vec<ProjectFile>, _>>()?;

    let cache = match &options.reference {
        Some(store) => ChangeCache::with_store(store.as_path()),
        None => ChangeCache::in_memory(),
    };
    let mut session = Session::new(cache).with_parameters(cli.properties());
    log_rule_paths(&options.rule_paths);

    let status = linear_executor::execute_files(&targets, &options, &mut session, &TemplateEvaluator)?;
    log::info!("Run finished with status {:?}", status);
    Ok(status)
}

fn log_rule_paths(paths: &[impl AsRef<Path>]) {
    for path in paths {
        log::debug!("Rule path: '{}'", path.as_ref().display());
    }
}
