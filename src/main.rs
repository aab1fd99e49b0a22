use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use rvi_forecast::aoi::{self, Area};
use rvi_forecast::config::{self, Config};
use rvi_forecast::ingest::earth_engine::EarthEngineClient;
use rvi_forecast::logging::{self, DataSource, LogLevel};
use rvi_forecast::model::AoiError;
use rvi_forecast::pipeline::{self, AppError};
use rvi_forecast::{replay, verify};

#[derive(Debug, Parser)]
#[command(name = "rvi_forecast", version, about = "Forecast Sentinel-1 RVI over an area of interest")]
struct Cli {
    /// Config file (defaults to ./rvi_forecast.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct AreaArgs {
    /// GeoJSON file with the area polygon
    #[arg(long, conflicts_with = "area")]
    aoi: Option<PathBuf>,

    /// Name of an [[area]] entry in the config file
    #[arg(long)]
    area: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch RVI from Earth Engine, forecast, and write the HTML report
    Run {
        #[command(flatten)]
        area: AreaArgs,
        #[arg(long, value_parser = config::parse_date)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = config::parse_date)]
        end: Option<NaiveDate>,
        /// Days to forecast past the last observation
        #[arg(long)]
        periods: Option<u32>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Save the fetched series for `replay`
        #[arg(long)]
        save_series: Option<PathBuf>,
    },
    /// Forecast a previously saved series without contacting Earth Engine
    Replay {
        #[arg(long)]
        series: PathBuf,
        #[arg(long)]
        periods: Option<u32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check credentials and scene availability for the configured areas
    Verify {
        #[command(flatten)]
        area: AreaArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.log_level, cli.log_file.as_deref(), true);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(DataSource::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            area,
            start,
            end,
            periods,
            output,
            save_series,
        } => {
            if let Some(start) = start {
                config.query.start_date = start;
            }
            if let Some(end) = end {
                config.query.end_date = end;
            }
            if let Some(periods) = periods {
                config.forecast.periods = periods;
            }
            config.validate()?;

            let area = select_area(&area, &config)?;
            let client = EarthEngineClient::new(&config.earth_engine)?;
            let series = pipeline::fetch_series(&client, &area, &config)?;

            if let Some(path) = save_series {
                replay::save_series(&path, &series)?;
                logging::info(
                    DataSource::System,
                    Some(&area.name),
                    &format!("Series saved to {}", path.display()),
                );
            }

            let output = output.unwrap_or_else(|| config.chart.output.clone());
            pipeline::forecast_and_render(&series, &config, &output)?;
        }
        Command::Replay {
            series,
            periods,
            output,
        } => {
            if let Some(periods) = periods {
                config.forecast.periods = periods;
            }
            let series = replay::load_series(&series)?;
            logging::info(
                DataSource::System,
                Some(&series.area),
                &format!("Replaying {} saved observations", series.len()),
            );
            let output = output.unwrap_or_else(|| config.chart.output.clone());
            pipeline::forecast_and_render(&series, &config, &output)?;
        }
        Command::Verify { area } => {
            let areas = if area.aoi.is_some() || area.area.is_some() {
                vec![select_area(&area, &config)?]
            } else {
                config
                    .areas
                    .iter()
                    .map(|entry| aoi::resolve_area(entry, &config.base_dir))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let client = EarthEngineClient::new(&config.earth_engine)?;
            let report = verify::run_verification(&client, &areas, &config.query);
            verify::print_summary(&report);
            pipeline::require_verified(&report)?;
        }
    }

    Ok(())
}

fn select_area(args: &AreaArgs, config: &Config) -> Result<Area, AoiError> {
    aoi::select_area(
        args.aoi.as_deref(),
        args.area.as_deref(),
        &config.areas,
        &config.base_dir,
    )
}
