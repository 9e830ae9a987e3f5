//! Sextant CLI - facet consistency and insight scheduling for project dashboards.

use std::process;
use std::sync::Arc;

use clap::Parser;
use sextant::cli::{Cli, Commands, ConfigCommands, SelectionArgs};
use sextant::commands::{self, Output};
use sextant::config::{
    ConfigOverrides, ConfigPaths, OutputFormat, ResolvedConfig, resolve_config,
};
use sextant::insight::SchedulerConfig;
use sextant::logging;

fn main() {
    let cli = Cli::parse();
    logging::init();

    let explicit_human = cli.human_readable;
    let result = resolve(&cli).and_then(|(paths, config)| {
        let human = config.output_format() == OutputFormat::Human;
        run_command(cli.command, &paths, &config, human)
    });

    if let Err(e) = result {
        if explicit_human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Layer config files, environment and CLI flags.
fn resolve(cli: &Cli) -> Result<(ConfigPaths, ResolvedConfig), sextant::Error> {
    let paths = ConfigPaths::discover(cli.config.as_deref())?;

    let mut overrides = ConfigOverrides::new();
    if let Some(data) = &cli.data {
        overrides = overrides.with_data_file(data.clone());
    }
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    match &cli.command {
        Commands::Insights {
            endpoint: Some(endpoint),
            ..
        } => overrides = overrides.with_insight_endpoint(endpoint.clone()),
        Commands::Watch {
            endpoint,
            debounce_ms,
            ..
        } => {
            if let Some(endpoint) = endpoint {
                overrides = overrides.with_insight_endpoint(endpoint.clone());
            }
            if let Some(ms) = debounce_ms {
                overrides = overrides.with_debounce_ms(*ms);
            }
        }
        _ => {}
    }

    let config = resolve_config(&paths, &overrides)?;
    Ok((paths, config))
}

fn run_command(
    command: Commands,
    paths: &ConfigPaths,
    config: &ResolvedConfig,
    human: bool,
) -> Result<(), sextant::Error> {
    match command {
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            let result = commands::config_show(config, paths)?;
            output(&result, human);
            Ok(())
        }
        command => block_on(run_async(command, config, human)),
    }
}

async fn run_async(command: Commands, config: &ResolvedConfig, human: bool) -> Result<(), sextant::Error> {
    match command {
        Commands::Reconcile { selection } => {
            let result = commands::reconcile(config, selection.draft()).await?;
            output(&result, human);
        }

        Commands::Options { selection } => {
            let result = commands::options(config, selection.draft()).await?;
            output(&result, human);
        }

        Commands::View { selection, at } => {
            let result = commands::view(config, selection.draft(), at.as_deref()).await?;
            output(&result, human);
        }

        Commands::Insights { selection, .. } => {
            let generator = commands::generator_for(config)?;
            let result = commands::insights(config, selection.draft(), &generator).await?;
            output(&result, human);
        }

        Commands::Watch { selection, .. } => run_watch(selection, config, human).await?,

        Commands::Config { .. } => {}
    }
    Ok(())
}

async fn run_watch(selection: SelectionArgs, config: &ResolvedConfig, human: bool) -> Result<(), sextant::Error> {
    let generator = Arc::new(commands::generator_for(config)?);
    let mut controller = commands::load_controller(config, selection.draft()).await?;
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    commands::watch(
        &mut controller,
        generator,
        SchedulerConfig {
            debounce: config.debounce(),
        },
        input,
        &mut stdout,
        human,
    )
    .await
}

fn block_on<F>(future: F) -> Result<(), sextant::Error>
where
    F: std::future::Future<Output = Result<(), sextant::Error>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| sextant::Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(future)
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
