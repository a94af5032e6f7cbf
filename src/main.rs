// Main entry point for allurectl

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use allurectl::cli::{Cli, Commands};
use allurectl::commands::{
    handle_clean, handle_completion, handle_export, handle_list, handle_summary,
};
use allurectl::config::{self, Config};
use allurectl::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    if cli.verbose {
        info!("Starting allurectl v{}", env!("CARGO_PKG_VERSION"));
    }

    let config = Config::load().context("Failed to load configuration")?;
    debug!("Results directory: {}", config.results_directory().display());

    // Handle config flag
    if cli.config {
        print_config(&config);
        return Ok(());
    }

    // Handle init_config flag
    if let Some(config_file) = &cli.init_config {
        std::fs::write(config_file, Config::default().to_toml()).with_context(|| {
            format!("Failed to write configuration: {}", config_file.display())
        })?;
        println!("Configuration file created: {}", config_file.display());
        println!("\nYou can now edit the file to customize your settings.");
        print_precedence();
        return Ok(());
    }

    // Handle completion flag
    if let Some(shell_type) = &cli.completion {
        return handle_completion(shell_type);
    }

    match &cli.command {
        Some(Commands::Summary(args)) => {
            let progress = cli.progress_mode();
            // Offload blocking file reads from the runtime
            let args = args.clone();
            let config = config.clone();
            let success =
                tokio::task::spawn_blocking(move || handle_summary(&args, progress, &config))
                    .await??;
            if args_fail_on_problems(&cli) && !success {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::List(args)) => handle_list(args, &config),
        Some(Commands::Export(args)) => handle_export(args, &config),
        Some(Commands::Clean(args)) => handle_clean(args, &config).map(|_| ()),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn args_fail_on_problems(cli: &Cli) -> bool {
    matches!(&cli.command, Some(Commands::Summary(args)) if args.fail_on_problems)
}

fn print_config(config: &Config) {
    println!("Current configuration:");
    match Config::find_file() {
        Some(path) => println!("\n  Configuration file loaded: {}", path.display()),
        None => {
            println!("\n  No configuration file loaded");
            println!("  Create one with: allurectl --init-config allure.toml");
        }
    }

    println!("\n  Results:");
    println!("    Directory: {}", config.results_directory().display());
    println!("    Indent output: {}", config.results.indent_output);
    println!("    Clean before first write: {}", config.results.clean);

    if !config.links.is_empty() {
        println!("\n  Link patterns:");
        for (link_type, pattern) in &config.links {
            println!("    {}: {}", link_type, pattern);
        }
    }

    println!("\n  Environment variables:");
    for name in [
        config::ENV_RESULTS_DIRECTORY,
        config::ENV_HOST_NAME,
        config::ENV_THREAD_NAME,
    ] {
        match std::env::var(name) {
            Ok(value) => println!("    {}: {}", name, value),
            Err(_) => println!("    {}: not set", name),
        }
    }

    print_precedence();
}

fn print_precedence() {
    println!("\nConfiguration precedence:");
    println!("  1. Command-line arguments (highest)");
    println!("  2. Environment variables");
    println!("  3. Configuration file");
    println!("  4. Built-in defaults (lowest)");
}
