//! Lumen - fuel log synced to Google Sheets
//!
//! Command-line front end for the fuel crate.

use clap::{Parser, Subcommand};
use fuel::AuthorizationRequired;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

mod app;
mod output;

use app::LumenApp;

#[derive(Parser)]
#[command(name = "lumen", about = "Log fuel purchases to a Google Sheet", version)]
struct Cli {
    /// Database path (default: <data dir>/lumen/lumen.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize Lumen with your Google account
    Login,
    /// Forget stored Google tokens
    Logout,
    /// Show account, spreadsheet and entry status
    Status,
    /// Record a fill-up
    Add {
        /// Gallons purchased
        #[arg(long)]
        gallons: f64,
        /// Odometer reading
        #[arg(long)]
        odometer: f64,
        /// Total cost
        #[arg(long)]
        cost: f64,
        /// Purchase date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Handle a lumen:// link (fill-up or picker result)
    Link {
        url: String,
    },
    /// List recorded entries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync an entry again
    Retry {
        id: String,
    },
    /// Delete an entry locally and from the spreadsheet
    Delete {
        id: String,
    },
    /// Choose the spreadsheet entries are written to
    Sheet {
        #[command(subcommand)]
        action: SheetAction,
    },
}

#[derive(Subcommand)]
enum SheetAction {
    /// List spreadsheets Lumen can access
    List,
    /// Select a spreadsheet by ID
    Select {
        id: String,
        /// Display name (default: looked up in Drive)
        #[arg(long)]
        name: Option<String>,
    },
    /// Set the worksheet (tab) entries are appended to
    Worksheet { name: String },
    /// Stop syncing to a spreadsheet
    Clear,
    /// Open the spreadsheet picker in the browser
    Pick,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(auth) = AuthorizationRequired::find(&e) {
                eprintln!("Google authorization required. Run `lumen login` first.");
                eprintln!("Consent page: {}", auth.pending().resolution);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let app = LumenApp::open(cli.db)?;

    match cli.command {
        Commands::Login => app.login(),
        Commands::Logout => app.logout(),
        Commands::Status => app.status(),
        Commands::Add {
            gallons,
            odometer,
            cost,
            date,
        } => app.add(gallons, odometer, cost, date.as_deref()),
        Commands::Link { url } => app.link(&url),
        Commands::List { json } => app.list(json),
        Commands::Retry { id } => app.retry(&id),
        Commands::Delete { id } => app.delete(&id),
        Commands::Sheet { action } => match action {
            SheetAction::List => app.list_sheets(),
            SheetAction::Select { id, name } => app.select_sheet(&id, name.as_deref()),
            SheetAction::Worksheet { name } => app.set_worksheet(&name),
            SheetAction::Clear => app.clear_sheet(),
            SheetAction::Pick => app.pick_sheet(),
        },
    }
}
