use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use maroc_stats_core::{
    ranked, write_export_csv, Dataset, Locale, Pipeline, RankOrder, StatsConfig, StatsContext,
    DEFAULT_CONFIG, SEGMENT_TOTAL,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "maroc-stats", version = VERSION, about = "Moroccan regional statistics")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Dataset to query: unemployment or retirees.
    #[arg(long, global = true, default_value_t = Pipeline::Unemployment)]
    dataset: Pipeline,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regions with data, then reference regions.
    Regions {
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
    },
    /// Map a free-text region name onto its canonical key.
    Resolve {
        name: String,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
    },
    Value {
        region: String,
        #[arg(long)]
        year: u16,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
        #[arg(long, default_value_t = Locale::National)]
        locale: Locale,
    },
    Split {
        region: String,
        #[arg(long)]
        year: u16,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
    },
    Series {
        region: String,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
        #[arg(long, default_value_t = Locale::National)]
        locale: Locale,
    },
    /// Min, max and mean over the available regions for one year.
    Stats {
        #[arg(long)]
        year: u16,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
    },
    Compare {
        first: String,
        second: String,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
    },
    Export {
        #[arg(long)]
        year: u16,
        #[arg(long, default_value = SEGMENT_TOTAL)]
        segment: String,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Map features joined with retiree counts.
    Merged {
        #[arg(long, default_value = "source")]
        order: RankOrder,
        #[arg(long)]
        geometry: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = StatsConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let context = StatsContext::load(&config).context("failed to load statistics")?;
    let data = context.dataset(cli.dataset);

    match cli.command {
        Commands::Regions { segment } => {
            print_json(&data.available_regions(&segment))?;
        }
        Commands::Resolve { name, segment } => {
            let region = context.resolve(cli.dataset, &name, &segment);
            if region.is_none() {
                warn!(name = %name, "no matching region");
            }
            print_json(&json!({ "name": name, "region": region }))?;
        }
        Commands::Value {
            region,
            year,
            segment,
            locale,
        } => {
            let region = resolve_or_keep(&context, cli.dataset, &region, &segment);
            let value = data.value_at(&region, year, &segment, locale);
            print_json(&json!({
                "region": region,
                "year": year,
                "segment": segment,
                "locale": locale,
                "value": value,
            }))?;
        }
        Commands::Split {
            region,
            year,
            segment,
        } => {
            let region = resolve_or_keep(&context, cli.dataset, &region, &segment);
            let split = data.urban_rural_split(&region, year, &segment);
            print_json(&json!({ "region": region, "year": year, "split": split }))?;
        }
        Commands::Series {
            region,
            segment,
            locale,
        } => {
            let region = resolve_or_keep(&context, cli.dataset, &region, &segment);
            print_json(&json!({
                "region": region,
                "series": data.temporal_series(&region, &segment, locale),
            }))?;
        }
        Commands::Stats { year, segment } => {
            print_json(&data.color_scale_stats(year, &segment))?;
        }
        Commands::Compare {
            first,
            second,
            segment,
        } => {
            let first = resolve_or_keep(&context, cli.dataset, &first, &segment);
            let second = resolve_or_keep(&context, cli.dataset, &second, &segment);
            match data.comparison_series(&first, &second, &segment) {
                Some(comparison) => print_json(&comparison)?,
                None => {
                    warn!(first = %first, second = %second, "one of the series is empty");
                    print_json(&serde_json::Value::Null)?;
                }
            }
        }
        Commands::Export {
            year,
            segment,
            format,
            out,
        } => {
            export(data, year, &segment, format, out)?;
        }
        Commands::Merged { order, geometry } => {
            let merged = context.merged();
            let features = ranked(&merged, order)
                .into_iter()
                .map(|feature| {
                    if geometry {
                        feature.clone()
                    } else {
                        feature.without_geometry()
                    }
                })
                .collect::<Vec<_>>();
            let unmatched = merged.iter().filter(|feature| feature.region.is_none()).count();
            info!(features = features.len(), unmatched, "merged geography with retirees");
            print_json(&features)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Region arguments go through the matcher; unresolved names are queried as
/// typed and come back absent.
fn resolve_or_keep(context: &StatsContext, dataset: Pipeline, name: &str, segment: &str) -> String {
    context
        .resolve(dataset, name, segment)
        .unwrap_or_else(|| name.to_string())
}

fn export(
    data: &Dataset,
    year: u16,
    segment: &str,
    format: ExportFormat,
    out: Option<PathBuf>,
) -> Result<()> {
    let writer: Box<dyn Write> = match &out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    match format {
        ExportFormat::Csv => {
            let rows = data.export_rows(year, segment);
            write_export_csv(&rows, writer).context("failed to write csv export")?;
        }
        ExportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, &data.export_json(year, segment))?;
            writeln!(writer)?;
            writer.flush()?;
        }
    }
    if let Some(path) = out {
        info!(path = %path.display(), year, segment, "export written");
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
