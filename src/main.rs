use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use time::Date;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use weatherdata::{parse_date, Store};

#[derive(Parser, Debug)]
#[command(name = "weatherdata", version, long_about = None)]
#[command(about = "Query the hourly measurements of a weather station", long_about = None)]
struct Cli {
    #[arg(help = "File with one `date;time;temperature;flag` measurement per line")]
    file: PathBuf,
    #[command(subcommand)]
    command: Command,
    #[arg(
        long,
        global = true,
        help = "Log level written to stderr. Defaults to $RUST_LOG, then warn"
    )]
    log: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Average temperature of every day with data in the range")]
    Average {
        #[command(flatten)]
        range: Range,
    },
    #[command(about = "Missing hourly readings of every day in the range, worst days first")]
    Missing {
        #[command(flatten)]
        range: Range,
    },
    #[command(about = "Percentage of approved readings in the range")]
    Approved {
        #[command(flatten)]
        range: Range,
    },
}

#[derive(Args, Debug)]
struct Range {
    #[arg(long, value_parser = parse_date, help = "First day, YYYY-MM-DD")]
    from: Date,
    #[arg(long, value_parser = parse_date, help = "Last day, YYYY-MM-DD, included")]
    to: Date,
}

fn enable_logging(log_level: Option<LevelFilter>) {
    let level = log_level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()));

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace('-', "_"),
        )))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    enable_logging(cli.log);

    let store = Store::load_path(&cli.file)?;
    let query = store.query();
    let lines = match cli.command {
        Command::Average { range } => query.average_temperatures(range.from, range.to),
        Command::Missing { range } => query.missing_values(range.from, range.to),
        Command::Approved { range } => query.approved_values(range.from, range.to),
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}
