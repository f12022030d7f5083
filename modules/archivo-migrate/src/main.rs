use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use archivo_migrate::{config, EnvLayer, Invocation, RunOutcome};

const DEFAULT_DIRECTIVES: [&str; 2] = ["archivo_migrate=info", "firebase_client=info"];

#[tokio::main]
async fn main() -> ExitCode {
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = match config::parse_invocation(std::env::args_os(), EnvLayer::from_process())? {
        Invocation::Help(usage) => {
            print!("{usage}");
            return Ok(());
        }
        Invocation::Run(config) => config,
    };
    config.log_redacted();

    match archivo_migrate::run(&config).await? {
        RunOutcome::DryRun(summary) => println!("{summary}"),
        RunOutcome::Migrated(stats) => println!("{stats}"),
    }
    Ok(())
}
