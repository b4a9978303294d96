#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `field_radius`: how far do field specialists travel to the units they
//! serve?
//!
//! Reads a KML document of units and a roster spreadsheet, then prints
//! radius tables, writes GeoJSON map layers or answers nearest-city
//! questions. Run without a subcommand for an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`field_radius_cli_utils::init_logger`])
//! so log lines and the route lookup progress bar share the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::Inputs;
use field_radius_config::Config;
use field_radius_report::{OutputFormat, Selection};

#[derive(Parser)]
#[command(name = "field_radius", about = "Field specialist radius-of-action analysis")]
struct Cli {
    /// TOML configuration file (overrides `FIELD_RADIUS_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Minimum fuzzy match score, 0-100
    #[arg(long, global = true)]
    threshold: Option<u8>,
    /// Only accept exact unit name matches
    #[arg(long, global = true)]
    no_fuzzy: bool,
    /// Compute centroids in raw longitude/latitude instead of UTM
    #[arg(long, global = true)]
    no_reproject: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct InputArgs {
    /// KML document with the unit geometries
    #[arg(long)]
    kml: PathBuf,
    /// Roster spreadsheet (CSV, XLSX, XLS or ODS)
    #[arg(long)]
    roster: PathBuf,
}

impl From<InputArgs> for Inputs {
    fn from(args: InputArgs) -> Self {
        Self {
            kml: args.kml,
            roster: args.roster,
        }
    }
}

#[derive(Args)]
struct FilterArgs {
    /// Only specialists of this manager
    #[arg(long)]
    manager: Option<String>,
    /// Only this specialist
    #[arg(long)]
    specialist: Option<String>,
    /// Only specialists serving this unit
    #[arg(long)]
    unit: Option<String>,
}

impl FilterArgs {
    fn selection(&self) -> Selection {
        Selection::from_labels(
            self.manager.as_deref(),
            self.specialist.as_deref(),
            self.unit.as_deref(),
        )
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Csv,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Table => Self::Table,
            Format::Csv => Self::Csv,
            Format::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Radius of action per specialist
    Summary {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Distance from home to every served unit
    Details {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Write GeoJSON map layers
    Map {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output `.geojson` file
        #[arg(long)]
        output: PathBuf,
        /// Look up road routes (first `routing.max_routes` assignments)
        #[arg(long)]
        routes: bool,
    },
    /// Which specialists live near a unit, and do they serve it?
    NearestCity {
        #[command(flatten)]
        inputs: InputArgs,
        /// GeoJSON feature collection of cities
        #[arg(long)]
        cities: PathBuf,
        /// Unit name as written in the KML
        #[arg(long)]
        unit: String,
        /// Number of nearest cities to report
        #[arg(long)]
        count: Option<usize>,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// List units extracted from a KML document
    Units {
        #[arg(long)]
        kml: PathBuf,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// List served units that matched no geometry
    Unresolved {
        #[command(flatten)]
        inputs: InputArgs,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
}

impl Cli {
    /// Loads configuration and applies the global flags on top.
    fn config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(threshold) = self.threshold {
            config.matching.fuzzy_threshold = threshold;
        }
        if self.no_fuzzy {
            config.matching.fuzzy_enabled = false;
        }
        if self.no_reproject {
            config.geometry.reproject_centroids = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = field_radius_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = cli.config()?;

    let Some(command) = cli.command else {
        return interactive::run(&config, &multi).await;
    };

    match command {
        Commands::Summary {
            inputs,
            filter,
            format,
        } => commands::summary(&config, &inputs.into(), &filter.selection(), format.into())?,
        Commands::Details {
            inputs,
            filter,
            format,
        } => commands::details(&config, &inputs.into(), &filter.selection(), format.into())?,
        Commands::Map {
            inputs,
            filter,
            output,
            routes,
        } => {
            commands::map(
                &config,
                &inputs.into(),
                &filter.selection(),
                &output,
                routes || config.routing.enabled,
                &multi,
            )
            .await?;
        }
        Commands::NearestCity {
            inputs,
            cities,
            unit,
            count,
            format,
        } => commands::nearest_city(&config, &inputs.into(), &cities, &unit, count, format.into())?,
        Commands::Units { kml, format } => commands::units(&config, &kml, format.into())?,
        Commands::Unresolved { inputs, format } => {
            commands::unresolved(&config, &inputs.into(), format.into())?;
        }
    }

    Ok(())
}
