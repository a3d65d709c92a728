// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod demo;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use demo::DemoRuntime;
use runtime::ApiRuntime;
use smartstock_api::Client;
use smartstock_app::AppState;
use smartstock_tui::UiOptions;
use std::env;
use std::path::PathBuf;

const DEMO_SEED: u64 = 42;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    match options.action {
        Action::Help => {
            print_help();
            return Ok(());
        }
        Action::PrintConfigPath => {
            println!("{}", options.config_path.display());
            return Ok(());
        }
        Action::PrintExample => {
            print!("{}", Config::example_config(&options.config_path));
            return Ok(());
        }
        Action::Check | Action::Launch => {}
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `smartstock --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let log_path = config.log_file()?;
    logging::init(config.log_level(), &log_path)
        .with_context(|| format!("set up logging at {}", log_path.display()))?;
    tracing::info!(
        config = %options.config_path.display(),
        demo = options.demo,
        action = ?options.action,
        "starting smartstock"
    );

    let mut state = AppState {
        active_tab: config.start_tab(),
        ..AppState::default()
    };
    let ui = UiOptions {
        page_size: config.page_size(),
        requested_by: config.requested_by(),
        chat_enabled: config.chat_enabled(),
    };

    if options.demo {
        if options.action == Action::Check {
            println!("config ok; demo mode needs no backend");
            return Ok(());
        }
        let mut runtime = DemoRuntime::new(DEMO_SEED);
        return smartstock_tui::run_app(&mut state, &mut runtime, ui);
    }

    let token = config.api_token();
    let client = Client::new(
        &config.api_base_url(),
        config.api_timeout()?,
        token.as_deref(),
    )
    .with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;

    if options.action == Action::Check {
        let health = client
            .agent_health()
            .with_context(|| format!("check backend at {}", client.base_url()))?;
        println!(
            "backend reachable at {} (agent {})",
            client.base_url(),
            health.status
        );
        return Ok(());
    }

    let mut runtime = ApiRuntime::new(client);
    smartstock_tui::run_app(&mut state, &mut runtime, ui)
}

/// What the binary does after parsing. When several flags are given the
/// highest-ranked action wins, so `--help` always short-circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Action {
    Launch,
    Check,
    PrintExample,
    PrintConfigPath,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    demo: bool,
    action: Action,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        demo: false,
        action: Action::Launch,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let requested = match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
                continue;
            }
            "--demo" => {
                options.demo = true;
                continue;
            }
            "--print-config-path" => Action::PrintConfigPath,
            "--print-example-config" => Action::PrintExample,
            "--check" => Action::Check,
            "--help" | "-h" => Action::Help,
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        };
        options.action = options.action.max(requested);
    }

    Ok(options)
}

fn print_help() {
    println!("smartstock: terminal dashboard for a SmartStock inventory backend");
    println!();
    println!("usage: smartstock [--config <path>] [--demo] [--check]");
    println!();
    println!("  --config <path>          Read config from <path> instead of the default");
    println!("  --print-config-path      Print the resolved config path and exit");
    println!("  --print-example-config   Print a commented config template and exit");
    println!("  --demo                   Use generated in-memory data, no backend needed");
    println!("  --check                  Validate config and ping /api/agent/health");
    println!("  -h, --help               Show this help");
}
