//! UKCP18 STAC producer.
//!
//! Builds STAC Collections and Items (with Cloud-Optimized GeoTIFF assets)
//! from UKCP18 NetCDF granules on local disk, S3 or Azure Blob Storage.
//!
//! Exit codes: 0 success, 2 data access, 3 schema, 4 ambiguous source,
//! 5 missing attribute, 6 raster write, 1 anything else.

mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use stac_builder::StacError;
use ukcp18_common::{parse_datetime, CrsDescriptor};

use commands::{CollectionArgs, ItemArgs};
use config::Ukcp18Config;

#[derive(Parser, Debug)]
#[command(name = "ukcp18", version)]
#[command(about = "Create STAC metadata and COG assets for UKCP18 climate projections")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "UKCP18_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise one or more granules as a STAC Collection
    CreateCollection {
        /// File path, URL or glob of NetCDF granules
        source: String,

        /// Output directory, or a .json file path
        destination: PathBuf,

        /// Output file name inside DESTINATION (default collection.json)
        #[arg(short, long)]
        output: Option<String>,

        /// CRS of the grid when the files do not declare one (EPSG:n or WKT)
        #[arg(long, value_parser = CrsDescriptor::parse)]
        crs: Option<CrsDescriptor>,

        /// Fail when this global attribute is missing (repeatable)
        #[arg(long = "require-attribute", value_name = "ATTRIBUTE")]
        require_attributes: Vec<String>,

        /// Collection id
        #[arg(long)]
        collection_id: Option<String>,
    },

    /// Create a STAC Item and COG asset for one granule and time slice
    CreateItem {
        /// File path or URL of a single NetCDF granule
        source: String,

        /// Output directory for the item and its asset
        destination: PathBuf,

        /// Item file name inside DESTINATION (default <item id>.json)
        #[arg(short, long)]
        output: Option<String>,

        /// Data variable to rasterise (default: the first one)
        #[arg(long)]
        variable: Option<String>,

        /// CRS of the grid when the file does not declare one (EPSG:n or WKT)
        #[arg(long, value_parser = CrsDescriptor::parse)]
        crs: Option<CrsDescriptor>,

        /// Time slice by index
        #[arg(long, conflicts_with = "datetime")]
        time_index: Option<usize>,

        /// Time slice by RFC 3339 timestamp
        #[arg(long, value_parser = parse_datetime)]
        datetime: Option<DateTime<Utc>>,

        /// COG file name (default <item id>.tif)
        #[arg(long)]
        asset_filename: Option<String>,

        /// Parent collection id
        #[arg(long)]
        collection_id: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // usage errors exit with 1 so that 2 stays reserved for data access
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(&args.log_level, args.log_format);

    match run(args).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(args: Args) -> Result<PathBuf> {
    let config = Ukcp18Config::load(args.config.as_deref())?;
    debug!(
        collection = %config.collection.id,
        compression = config.cog.compression.as_gdal(),
        "Loaded configuration"
    );

    match args.command {
        Command::CreateCollection {
            source,
            destination,
            output,
            crs,
            require_attributes,
            collection_id,
        } => {
            info!(source = %source, "Creating collection");
            commands::create_collection(
                config,
                CollectionArgs {
                    source,
                    destination,
                    output,
                    crs,
                    require_attributes,
                    id: collection_id,
                },
            )
            .await
        }
        Command::CreateItem {
            source,
            destination,
            output,
            variable,
            crs,
            time_index,
            datetime,
            asset_filename,
            collection_id,
        } => {
            info!(source = %source, "Creating item");
            commands::create_item_record(
                config,
                ItemArgs {
                    source,
                    destination,
                    output,
                    variable,
                    crs,
                    time_index,
                    datetime,
                    asset_filename,
                    collection_id,
                },
            )
            .await
        }
    }
}

/// Builder failures map to their kind's code; configuration problems to 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<StacError>()
        .map(|e| e.exit_code())
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}
