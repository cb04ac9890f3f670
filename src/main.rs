use clap::Parser;
use screen_verifier::cli::commands::{RunOptions, cmd_check, cmd_compile, cmd_identify, cmd_run};
use screen_verifier::cli::config::{Cli, Commands, default_log_filter, load_config};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Run {
            catalog,
            script,
            format,
            output,
            trace,
            driver,
        } => {
            let options = RunOptions {
                catalog: &catalog,
                script: &script,
                format: format.as_deref().unwrap_or(&config.run.format),
                output: output.as_deref().or(config.run.output.as_deref()),
                trace: trace.as_deref().or(config.trace.path.as_deref()),
                driver: driver.as_deref(),
            };
            let all_passed = cmd_run(&options, &config, cli.verbose)?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::Compile { script, output } => {
            cmd_compile(&script, output.as_deref())?;
        }
        Commands::Check { catalog } => {
            cmd_check(&catalog)?;
        }
        Commands::Identify {
            catalog,
            observation,
        } => {
            if cmd_identify(&catalog, &observation, &config)?.is_none() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
