//! Takelog CLI entry point

use std::process::ExitCode;

use clap::Parser;

use takelog::cli::{
    app::{
        load_merged_config, run_add, run_export, run_record, run_rename, run_retranscribe,
        run_sessions, run_show, EXIT_ERROR,
    },
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use takelog::domain::config::AppConfig;
use takelog::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cli_config = AppConfig {
        data_dir: cli.data_dir.map(|p| p.display().to_string()),
        capture_command: None,
        transcribe_command: None,
    };
    let config = load_merged_config(cli_config).await;

    match cli.command {
        Commands::Record {
            capture_command,
            transcribe_command,
        } => run_record(config, capture_command, transcribe_command).await,
        Commands::Add { session, text } => run_add(config, session, text).await,
        Commands::Sessions { filter } => run_sessions(config, filter).await,
        Commands::Show { session } => run_show(config, session).await,
        Commands::Rename { session, name } => run_rename(config, session, name).await,
        Commands::Retranscribe {
            last,
            transcribe_command,
        } => run_retranscribe(config, last, transcribe_command).await,
        Commands::Export { session, output } => run_export(config, session, output).await,
        Commands::Config { action } => {
            let presenter = Presenter::new();
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
    }
}
