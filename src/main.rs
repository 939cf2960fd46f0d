/// hazmon - snow-drift and slippery-road alarms from Frost observations.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use hazmon_service::cache::{TtlCache, fetch_report_cached};
use hazmon_service::config::{ServiceConfig, load_config};
use hazmon_service::dev_mode::{DevMode, RecordingSource};
use hazmon_service::export::{export_csv, export_workbook};
use hazmon_service::ingest::frost::{FrostClient, ObservationSource};
use hazmon_service::ingest::series::{LOCAL_TZ, Localized, localize};
use hazmon_service::logging::{self, DataSource, LogLevel, init_logger};
use hazmon_service::model::{AlarmEvent, Channel};
use hazmon_service::pipeline::HazardReport;
use hazmon_service::stations::all_station_ids;
use hazmon_service::verify::{print_summary, verify_stations};

const DEFAULT_DAYS: i64 = 7;
const MAX_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(
    name = "hazmon",
    version,
    about = "Snow-drift and slippery-road alarms from MET Norway Frost observations",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Check that a station returns every expected element
    Verify {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Station to check; defaults to every registered station
        #[arg(long)]
        station: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Frost source id, e.g. SN46220
    #[arg(long)]
    station: Option<String>,
    /// Look back this many days from now
    #[arg(
        long,
        conflicts_with_all = ["start", "end"],
        value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS)
    )]
    days: Option<i64>,
    /// Window start, "YYYY-MM-DD", "YYYY-MM-DD HH:MM" or RFC 3339
    #[arg(long, requires = "end")]
    start: Option<String>,
    #[arg(long, requires = "start")]
    end: Option<String>,
    /// Replay a saved Frost response instead of calling the API
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Shift replayed data this many days forward
    #[arg(
        long,
        default_value_t = 0,
        requires = "replay",
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i64).range(-MAX_DAYS..=MAX_DAYS)
    )]
    replay_offset_days: i64,
    /// Save the raw Frost response for later replay
    #[arg(long, conflicts_with = "replay")]
    record: Option<PathBuf>,
    /// Write the full report as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write an .xlsx workbook with one sheet per column group
    #[arg(long)]
    xlsx: Option<PathBuf>,
    #[arg(long)]
    log_file: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Verify { config, station }) => run_verify(config, station),
        None => run_report(cli.run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_config(path: Option<&PathBuf>) -> Result<ServiceConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(ServiceConfig::default()),
    }
}

/// Parse a command-line time as Oslo wall-clock unless it carries an offset.
fn parse_cli_time(text: &str) -> Result<DateTime<Tz>, String> {
    let candidates = [
        text.to_string(),
        format!("{}:00", text),
        format!("{}T00:00:00", text),
    ];
    candidates
        .iter()
        .find_map(|c| match localize(c) {
            Localized::At(t) => Some(t),
            _ => None,
        })
        .ok_or_else(|| format!("cannot parse time '{}'", text))
}

fn run_report(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    init_logger(level, args.log_file.as_deref(), args.verbose);

    let config = read_config(args.config.as_ref())?;
    let station = args
        .station
        .clone()
        .unwrap_or_else(|| config.frost.station_id.clone());
    let now = Utc::now();

    let replay = args
        .replay
        .as_ref()
        .map(|path| DevMode::new(args.replay_offset_days).load(path))
        .transpose()?;

    let (start, end) = match (&args.start, &args.end) {
        (Some(start), Some(end)) => (parse_cli_time(start)?, parse_cli_time(end)?),
        _ => match replay.as_ref().and_then(|r| r.data_range()) {
            // replay the whole recording unless told otherwise
            Some((first, last)) if args.days.is_none() => (first, last + Duration::hours(1)),
            _ => {
                let end = now.with_timezone(&LOCAL_TZ);
                (end - Duration::days(args.days.unwrap_or(DEFAULT_DAYS)), end)
            }
        },
    };

    let source: Box<dyn ObservationSource> = match (replay, &args.record) {
        (Some(replay), _) => Box::new(replay),
        (None, Some(path)) => Box::new(RecordingSource::new(
            FrostClient::from_env(&config.frost)?,
            path,
        )),
        (None, None) => Box::new(FrostClient::from_env(&config.frost)?),
    };

    let mut cache = TtlCache::from_config(&config.cache);
    let report = fetch_report_cached(
        &mut cache,
        source.as_ref(),
        &station,
        start,
        end,
        now,
        &config.pipeline,
    )?;

    print_report(&report);

    if let Some(path) = &args.csv {
        export_csv(&report, path, &config.export)?;
    }
    if let Some(path) = &args.xlsx {
        export_workbook(&report, path, &config.export)?;
    }
    Ok(())
}

fn run_verify(config: Option<PathBuf>, station: Option<String>) -> Result<(), Box<dyn Error>> {
    init_logger(LogLevel::Info, None, false);
    let config = read_config(config.as_ref())?;
    let client = FrostClient::from_env(&config.frost)?;

    let ids: Vec<&str> = match &station {
        Some(id) => vec![id.as_str()],
        None => all_station_ids(),
    };
    let reports = verify_stations(&client, &ids, Utc::now());

    print_summary(&reports);
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn describe_alarm(event: Option<&AlarmEvent>) -> String {
    let Some(event) = event else {
        return "none".to_string();
    };
    let reading = |v: Option<f64>, unit: &str| {
        v.map(|v| format!("{:.1} {}", v, unit))
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "{} (temp {}, wind {}, precip {}, depth change {})",
        event.timestamp.format("%d.%m.%Y %H:%M"),
        reading(event.readings.air_temperature, "°C"),
        reading(event.readings.wind_speed, "m/s"),
        reading(event.readings.precipitation, "mm"),
        reading(event.readings.snow_depth_change, "cm"),
    )
}

fn print_report(report: &HazardReport) {
    let (Some(first), Some(last)) = (report.timestamps().first(), report.timestamps().last()) else {
        logging::warn(DataSource::System, Some(&report.station_id), "empty report");
        return;
    };

    println!("\n═══════════════════════════════════════════");
    println!(
        "{}: {} - {}",
        report.station_id,
        first.format("%d.%m.%Y %H:%M"),
        last.format("%d.%m.%Y %H:%M")
    );
    println!("═══════════════════════════════════════════");

    let latest = report.latest_alarms();
    println!(
        "Snow drift alarms:    {:>4}   last: {}",
        report.snow_drift_alarm.iter().filter(|a| **a).count(),
        describe_alarm(latest.snow_drift.as_ref())
    );
    println!(
        "Slippery road alarms: {:>4}   last: {}",
        report.slippery_road_alarm.iter().filter(|a| **a).count(),
        describe_alarm(latest.slippery_road.as_ref())
    );
    println!(
        "Salting recommended:  {:>4} hours",
        report.salting_recommended.iter().filter(|s| **s).count()
    );
    println!(
        "Snow precipitation:   {:>6.1} mm",
        report.snow_precipitation_total()
    );

    println!("\nChannel                 mean   median      min      max");
    for (channel, summary) in &report.summaries {
        let cell = |v: Option<f64>| {
            v.map(|v| format!("{:>8.1}", v))
                .unwrap_or_else(|| format!("{:>8}", "-"))
        };
        let mut line = format!(
            "{:<22}{}{}{}{}",
            channel.column_name(),
            cell(summary.mean),
            cell(summary.median),
            cell(summary.min),
            cell(summary.max)
        );
        if *channel == Channel::Precipitation {
            line.push_str(&format!("   total {}", cell(summary.sum).trim()));
        }
        println!("{}", line);
    }

    if report.missing_periods.is_empty() {
        println!("\nNo missing snow depth data");
    } else {
        println!("\nMissing snow depth data:");
        for period in &report.missing_periods {
            println!(
                "  {} - {}",
                period.start.format("%d.%m.%Y %H:%M"),
                period.end.format("%d.%m.%Y %H:%M")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cli_time_formats() {
        let expected = LOCAL_TZ.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
        assert_eq!(parse_cli_time("2024-01-10 06:00").unwrap(), expected);
        assert_eq!(parse_cli_time("2024-01-10T06:00:00").unwrap(), expected);
        assert_eq!(parse_cli_time("2024-01-10T05:00:00Z").unwrap(), expected);
        assert_eq!(
            parse_cli_time("2024-01-10").unwrap(),
            LOCAL_TZ.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
        );
        assert!(parse_cli_time("yesterday").is_err());
    }

    #[test]
    fn test_days_conflicts_with_explicit_window() {
        let result = Cli::try_parse_from([
            "hazmon", "--days", "3", "--start", "2024-01-01", "--end", "2024-01-02",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_day_counts_are_bounded() {
        assert!(Cli::try_parse_from(["hazmon", "--days", "9999999999999"]).is_err());
        assert!(Cli::try_parse_from(["hazmon", "--days", "0"]).is_err());
        assert!(
            Cli::try_parse_from([
                "hazmon",
                "--replay",
                "saved.json",
                "--replay-offset-days",
                "-99999999"
            ])
            .is_err()
        );

        let cli = Cli::try_parse_from(["hazmon", "--days", "30"]).unwrap();
        assert_eq!(cli.run.days, Some(30));
    }

    #[test]
    fn test_verify_subcommand() {
        let cli = Cli::try_parse_from(["hazmon", "verify", "--station", "SN46220"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Verify { station: Some(ref s), .. }) if s == "SN46220"
        ));
    }
}
