pub mod commands;
pub mod output;

use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::{
    ledger::{
        stats::{DEFAULT_STAT_WEEKS, MAX_STAT_WEEKS},
        QUICK_EXTEND,
    },
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "daytally", version, long_about = None)]
#[command(about = "Track how much time or how many times you do things each day", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

const DATE_HELP: &str = "Day of the entry. Examples are \"2024-03-15\", \"yesterday\", \"15/03/2024\". Defaults to today";

/// Value flags of `log`. Either a duration or a count.
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct ValueArgs {
    #[arg(long, help = "Hours spent")]
    pub hours: Option<u32>,
    #[arg(short, long, help = "Minutes spent")]
    pub minutes: Option<u32>,
    #[arg(short, long, conflicts_with_all = ["hours", "minutes"], help = "How many times it was done")]
    pub count: Option<u32>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Set the value of an activity for a day. Replaces a previously logged value")]
    Log {
        name: String,
        #[command(flatten)]
        value: ValueArgs,
        #[arg(short, long, help = DATE_HELP)]
        date: Option<String>,
    },
    #[command(about = "Add one to a counted activity")]
    Increment {
        name: String,
        #[arg(short, long, help = DATE_HELP)]
        date: Option<String>,
    },
    #[command(about = "Add time to a timed activity")]
    Extend {
        name: String,
        #[arg(short, long, default_value_t = QUICK_EXTEND.num_minutes() as u32, help = "Minutes to add")]
        minutes: u32,
        #[arg(short, long, help = DATE_HELP)]
        date: Option<String>,
    },
    #[command(about = "Start tracking time of an activity live")]
    Start { name: String },
    #[command(about = "Stop live tracking. The elapsed time becomes today's value")]
    Stop { name: String },
    #[command(about = "Delete an activity together with all of its history")]
    Delete { name: String },
    #[command(about = "Show today's value of every activity")]
    Today {},
    #[command(about = "Show past days with logged values")]
    History {},
    #[command(about = "Show weekly totals of an activity")]
    Stats {
        name: String,
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_STAT_WEEKS,
            value_parser = clap::value_parser!(u32).range(1..=MAX_STAT_WEEKS as i64),
            help = "Number of weeks"
        )]
        weeks: u32,
    },
    #[command(about = "Export all records as CSV")]
    Export {
        #[arg(short, long, help = "File to write into. Prints to stdout by default")]
        output: Option<PathBuf>,
    },
    #[command(about = "Show or change the daily reminder time")]
    Reminder {
        #[arg(long, help = "New reminder time, for example 20:00")]
        set: Option<String>,
    },
    #[command(about = "Keep running and add today's entries whenever the day changes")]
    Watch {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&app_dir, logging_level, args.log)?;

    let dialect: chrono_english::Dialect = args.date_style.into();

    match args.commands {
        Commands::Log { name, value, date } => {
            commands::log(&app_dir, &name, value, date.as_deref(), dialect)
        }
        Commands::Increment { name, date } => {
            commands::increment(&app_dir, &name, date.as_deref(), dialect)
        }
        Commands::Extend {
            name,
            minutes,
            date,
        } => commands::extend(&app_dir, &name, minutes, date.as_deref(), dialect),
        Commands::Start { name } => commands::start(&app_dir, &name),
        Commands::Stop { name } => commands::stop(&app_dir, &name),
        Commands::Delete { name } => commands::delete(&app_dir, &name),
        Commands::Today {} => commands::today(&app_dir),
        Commands::History {} => commands::history(&app_dir),
        Commands::Stats { name, weeks } => commands::stats(&app_dir, &name, weeks),
        Commands::Export { output } => commands::export(&app_dir, output),
        Commands::Reminder { set } => commands::reminder(&app_dir, set.as_deref()),
        Commands::Watch {} => commands::watch(&app_dir).await,
    }
}
