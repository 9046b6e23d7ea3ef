pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and exercise slot extraction and tool servers.",
    after_help = "Examples:\n  wayfarer doctor --json\n  wayfarer extract \"Japan for 5 days, 2 people\"\n  wayfarer tool flights search_flights --args '{\"from\":\"TPE\"}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, reasoning credentials, tool servers, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run pattern extraction and routing on a message without calling a model")]
    Extract {
        #[arg(help = "Message text to extract slots from")]
        text: String,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Call one tool on a registered tool server")]
    Tool {
        #[arg(help = "Tool server key, e.g. japan, flights, utilities")]
        server: String,
        #[arg(help = "Tool name")]
        tool: String,
        #[arg(long, help = "Tool arguments as a JSON object")]
        args: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Extract { text, json } => {
            commands::CommandResult { exit_code: 0, output: commands::extract::run(&text, json) }
        }
        Command::Tool { server, tool, args } => {
            commands::tool::run(&server, &tool, args.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
