//! Avarig CLI - Command-line interface for avatar rigging
//!
//! This binary provides commands for inspecting reference skeletons, editing
//! and exporting avatar shapes, and encoding animation clips.

mod cli_args;

use clap::Parser;
use std::process::ExitCode;

use avarig_cli::commands::{self, anim::BvhSettings, shape::ShapeRequest};
use cli_args::{Cli, Commands};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let system = commands::rig_system(cli.config.as_deref())?;
    match cli.command {
        Commands::Inspect { rig, bones, json } => commands::inspect::run(&system, &rig.props(), bones, json),
        Commands::Sliders { group, json } => commands::sliders::run(&system, group.as_deref(), json),
        Commands::Shape {
            rig,
            file,
            sets,
            gender,
            json,
        } => {
            let request = ShapeRequest {
                rig: rig.props(),
                file: file.as_deref(),
                overrides: &sets,
                gender,
            };
            commands::shape::run(&system, &request, json)
        }
        Commands::ExportShape {
            output,
            name,
            sets,
            gender,
        } => commands::export_shape::run(&system, &output, &name, &sets, gender),
        Commands::Anim {
            input,
            output,
            format,
            fps,
            no_translations,
            rig,
        } => {
            let settings = BvhSettings {
                rig: rig.props(),
                fps,
                translations: !no_translations,
            };
            commands::anim::run(&system, &input, &output, format.map(Into::into), &settings)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
