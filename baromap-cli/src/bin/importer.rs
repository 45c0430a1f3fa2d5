use anyhow::Context;
use baromap_cli::timeseries;
use chrono::TimeDelta;
use chrono_tz::Tz;
use clap::Parser;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Turn a recorded "time;pressure" CSV into SQL for the timeseries database.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Recorded data file
    data_file: PathBuf,

    /// Unique identifier for this timeseries
    #[arg(short = 'i', long)]
    run_id: String,

    /// Shift the start of the timeseries by this much time (e.g. "30m")
    #[arg(short = 's', long, value_parser = humantime::parse_duration)]
    time_shift: Option<Duration>,

    /// Collapse all data points between arrival and departure events into
    /// this much time (e.g. "30s") (requires --protocol)
    #[arg(short = 'c', long, value_parser = humantime::parse_duration, requires = "protocol")]
    collapse_stops: Option<Duration>,

    /// Protocol CSV file with "timestamp;event" rows
    #[arg(short = 'p', long)]
    protocol: Option<PathBuf>,

    /// Timezone to interpret the timestamps with
    #[arg(short = 't', long, default_value = "Europe/Berlin")]
    timezone: Tz,

    /// Instead of taking the first data point as the base pressure, use
    /// this value
    #[arg(short = 'b', long)]
    base_pressure: Option<f64>,

    /// Trim any data points before the first and after the last event
    #[arg(short = 'r', long)]
    event_range: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_file = File::open(&cli.data_file)
        .with_context(|| format!("Failed to open {}", cli.data_file.display()))?;
    let mut data =
        timeseries::load_data(data_file, cli.timezone).context("Failed to load data file")?;

    if let Some(protocol_path) = &cli.protocol {
        let protocol_file = File::open(protocol_path)
            .with_context(|| format!("Failed to open {}", protocol_path.display()))?;
        let protocol = timeseries::load_protocol(protocol_file, cli.timezone)
            .context("Failed to load protocol file")?;

        data = timeseries::combine(&data, &protocol);
    }

    if cli.event_range {
        data = timeseries::trim_to_event_range(data);
    }

    if let Some(stop_duration) = cli.collapse_stops {
        let stop_duration =
            TimeDelta::from_std(stop_duration).context("--collapse-stops is out of range")?;
        data = timeseries::collapse_stops(&data, stop_duration)
            .context("Failed to collapse stops in timeseries")?;
    }

    let time_shift = cli
        .time_shift
        .map(TimeDelta::from_std)
        .transpose()
        .context("--time-shift is out of range")?;
    data = timeseries::normalize(&data, time_shift, cli.base_pressure)
        .context("Failed to normalize timeseries")?;

    timeseries::render_sql(
        &mut io::stdout().lock(),
        &data,
        &cli.data_file.to_string_lossy(),
        &cli.run_id,
    )?;

    Ok(())
}
