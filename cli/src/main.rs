mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    ExportFormat, cmd_export, cmd_food_add, cmd_food_list, cmd_reading_add, cmd_reading_list,
    cmd_seed, cmd_stats, cmd_user_set, cmd_user_show,
};
use crate::config::Config;
use diatrack_core::service::DiatrackService;

#[derive(Parser)]
#[command(
    name = "diatrack",
    version,
    about = "A personal blood sugar and food log",
    long_about = "A personal blood sugar and food log.\n\n\
        Record readings and meals, then export them as a spreadsheet, \
        a PDF summary report or a trend chart."
)]
struct Cli {
    /// Database file (default: <data dir>/diatrack.db)
    #[arg(long, global = true, env = "DIATRACK_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "5000")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Record and list blood sugar readings
    Reading {
        #[command(subcommand)]
        command: ReadingCommands,
    },
    /// Record and list meals
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Export data to a file
    Export {
        /// What to export
        #[arg(value_enum)]
        format: ExportFormat,
        /// Output path (default: standard file name in the current directory)
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show reading statistics and detected patterns
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or edit the profile
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Insert a sample week of readings and meals (September 2024)
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReadingCommands {
    /// Record a reading
    Add {
        /// Blood sugar in mg/dL
        value: f64,
        /// Reading kind: fasting or post-meal
        #[arg(short, long, default_value = "fasting")]
        kind: String,
        /// Optional note
        #[arg(short, long)]
        note: Option<String>,
        /// When it was measured (YYYY-MM-DD HH:MM, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the most recent readings
    List {
        /// Number of readings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log a meal
    Add {
        /// Food name
        name: String,
        /// Calories
        #[arg(long)]
        calories: Option<i64>,
        /// Glycemic index
        #[arg(long)]
        gi: Option<i64>,
        /// When it was eaten (YYYY-MM-DD HH:MM, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the most recent meals
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the display name or date of birth
    Set {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Date of birth (YYYY-MM-DD, or "none" to clear)
        #[arg(long)]
        dob: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let svc = DiatrackService::new(config.db_path_str()?)?;
    let user = svc.ensure_default_user()?;

    match cli.command {
        Commands::Serve { port, bind } => server::start_server(svc, user, port, &bind).await,
        Commands::Reading { command } => match command {
            ReadingCommands::Add {
                value,
                kind,
                note,
                at,
                json,
            } => cmd_reading_add(&svc, &user, value, &kind, note, at, json),
            ReadingCommands::List { limit, json } => cmd_reading_list(&svc, &user, limit, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                calories,
                gi,
                at,
                json,
            } => cmd_food_add(&svc, &user, &name, calories, gi, at, json),
            FoodCommands::List { limit, json } => cmd_food_list(&svc, &user, limit, json),
        },
        Commands::Export { format, out, json } => cmd_export(&svc, &user, format, out, json),
        Commands::Stats { json } => cmd_stats(&svc, &user, json),
        Commands::User { command } => match command {
            UserCommands::Show { json } => cmd_user_show(&user, json),
            UserCommands::Set { name, dob, json } => cmd_user_set(&svc, &user, name, dob, json),
        },
        Commands::Seed { json } => cmd_seed(&svc, &user, json),
    }
}
