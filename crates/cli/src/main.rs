//! terralink CLI - geospatial data linkage pipeline
//!
//! Sequences the pipeline stages from the command line: ingest,
//! reproject, filter/join, buffer + aggregate, interpolate, fetch.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use terralink_algorithms::aggregate::{
    area_weighted_aggregate, buffer, count_aggregate, BufferParams,
};
use terralink_algorithms::interpolation::{
    estimate, samples_from, Estimator, IdwParams, KrigingParams, VariogramModel, VariogramParams,
};
use terralink_algorithms::relate::{
    filter, join, join_required, nearest, JoinCardinality, SpatialPredicate,
};
use terralink_algorithms::reproject::reproject;
use terralink_core::io::{
    read_features, read_snapshot, write_geojson, write_snapshot, ReadOptions,
};
use terralink_core::{Crs, FeatureCollection, Grid};
use terralink_remote::{
    attach_table, download, CensusBlocking, FeatureQuery, HttpOptions, OverpassBlocking,
    TableQuery,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "terralink")]
#[command(author, version, about = "Geospatial data linkage pipeline", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a vector source
    Info {
        /// Input file (.geojson, .json, .shp, .csv)
        input: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Read a source and write it out (GeoJSON or snapshot)
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Reproject a collection into another CRS
    Reproject {
        input: PathBuf,
        output: PathBuf,
        /// Target EPSG code (e.g. 4326, 3857, 32630)
        #[arg(short, long)]
        to: u32,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Keep features of INPUT satisfying a predicate against OTHER
    Filter {
        input: PathBuf,
        other: PathBuf,
        output: PathBuf,
        /// within | contains | intersects | disjoint
        #[arg(short, long, default_value = "intersects")]
        predicate: String,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Attach OTHER's attributes onto INPUT by spatial match
    Join {
        input: PathBuf,
        other: PathBuf,
        output: PathBuf,
        /// within | contains | intersects | disjoint
        #[arg(short, long, default_value = "intersects")]
        predicate: String,
        /// first | all
        #[arg(short, long, default_value = "first")]
        cardinality: String,
        /// Error when nothing matches instead of passing rows through
        #[arg(long)]
        required: bool,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// For each INPUT feature, report the k nearest OTHER features
    Nearest {
        input: PathBuf,
        other: PathBuf,
        /// Number of neighbors
        #[arg(short, default_value = "1")]
        k: usize,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Buffer every geometry by a distance in CRS units
    Buffer {
        input: PathBuf,
        output: PathBuf,
        /// Buffer distance (CRS units)
        #[arg(short, long)]
        distance: f64,
        /// Arc approximation segments
        #[arg(long, default_value = "32")]
        segments: usize,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Area-weighted aggregation of a coverage attribute onto buffers
    Aggregate {
        /// Buffer polygons
        buffers: PathBuf,
        /// Coverage polygons carrying the value field
        coverage: PathBuf,
        /// Numeric attribute to aggregate
        #[arg(short, long)]
        field: String,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Count points per polygon
    Count {
        polygons: PathBuf,
        points: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Interpolate a value surface from point observations
    Interpolate {
        input: PathBuf,
        /// Output (.geojson of cell-center points)
        output: PathBuf,
        /// Numeric attribute to interpolate
        #[arg(short, long)]
        field: String,
        /// idw | kriging
        #[arg(short, long, default_value = "idw")]
        method: String,
        /// Grid cell size in CRS units
        #[arg(short, long)]
        cell_size: f64,
        /// IDW power parameter
        #[arg(long, default_value = "2.0")]
        power: f64,
        /// Variogram family: spherical | exponential | gaussian
        /// (kriging only; omit to pick the best fit)
        #[arg(long)]
        model: Option<String>,
        /// Fall back to IDW when the variogram fit fails
        #[arg(long)]
        fallback_idw: bool,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Remote ingestion
    Fetch {
        #[command(subcommand)]
        source: FetchCommands,
    },
}

#[derive(Subcommand)]
enum FetchCommands {
    /// Fetch a statistical table and attach it to zone features
    Census {
        /// API root URL
        #[arg(long)]
        base_url: String,
        /// Dataset identifier
        #[arg(long)]
        dataset: String,
        /// Value column to fetch
        #[arg(long)]
        value_field: String,
        /// Zone polygons carrying geography codes
        zones: PathBuf,
        output: PathBuf,
        /// Attribute holding the geography code on each zone
        #[arg(long, default_value = "code")]
        key_field: String,
        /// Attribute name for the fetched value
        #[arg(long, default_value = "value")]
        attr: String,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Query map features by bbox and tag (Overpass)
    Overpass {
        /// south,west,north,east in WGS84 degrees
        #[arg(long)]
        bbox: String,
        /// Tag key, e.g. amenity
        #[arg(long)]
        key: String,
        /// Tag value; omit to match any
        #[arg(long)]
        value: Option<String>,
        output: PathBuf,
    },
    /// Download a file with an opportunistic cache
    Download {
        url: String,
        output: PathBuf,
        /// Cache directory for downloaded bytes
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

/// Ingestion flags shared by every command reading local files.
#[derive(clap::Args)]
struct ReadArgs {
    /// Declared CRS as an EPSG code (mandatory for shapefiles)
    #[arg(long)]
    crs: Option<u32>,
    /// X / longitude column for CSV inputs
    #[arg(long, default_value = "x")]
    x_col: String,
    /// Y / latitude column for CSV inputs
    #[arg(long, default_value = "y")]
    y_col: String,
}

impl ReadArgs {
    fn options(&self) -> ReadOptions {
        ReadOptions {
            crs: self.crs.map(Crs::from_epsg),
            x_column: self.x_col.clone(),
            y_column: self.y_col.clone(),
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Read a collection; `.snap.json` files are snapshots, the rest goes
/// through extension dispatch.
fn read_input(path: &Path, read: &ReadArgs) -> Result<FeatureCollection> {
    let name = path.to_string_lossy();
    let collection = if name.ends_with(".snap.json") {
        read_snapshot(path)
    } else {
        read_features(path, &read.options())
    };
    collection.with_context(|| format!("reading {}", path.display()))
}

/// Write by extension: `.snap.json` snapshot, `.geojson`/`.json` GeoJSON.
fn write_output(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let name = path.to_string_lossy();
    let result = if name.ends_with(".snap.json") {
        write_snapshot(path, collection)
    } else {
        write_geojson(path, collection)
    };
    result.with_context(|| format!("writing {}", path.display()))
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed_precise}]")
            .expect("static template"),
    );
    bar.set_message(message);
    bar
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    let start = Instant::now();
    run(cli.command)?;
    info!("done in {:.2?}", start.elapsed());
    Ok(())
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Info { input, read } => {
            let fc = read_input(&input, &read)?;
            println!("source:   {}", input.display());
            println!("crs:      {}", fc.crs());
            println!("features: {}", fc.len());
            if let Some((min_x, min_y, max_x, max_y)) = fc.bounds() {
                println!("bounds:   ({min_x}, {min_y}) .. ({max_x}, {max_y})");
            }
        }

        Commands::Convert {
            input,
            output,
            read,
        } => {
            let fc = read_input(&input, &read)?;
            write_output(&output, &fc)?;
            info!("{} features -> {}", fc.len(), output.display());
        }

        Commands::Reproject {
            input,
            output,
            to,
            read,
        } => {
            let fc = read_input(&input, &read)?;
            let out = reproject(&fc, &Crs::from_epsg(to))
                .with_context(|| format!("reprojecting to EPSG:{to}"))?;
            write_output(&output, &out)?;
            info!("reprojected {} features to EPSG:{to}", out.len());
        }

        Commands::Filter {
            input,
            other,
            output,
            predicate,
            read,
        } => {
            let left = read_input(&input, &read)?;
            let right = read_input(&other, &read)?;
            let predicate: SpatialPredicate = predicate.parse()?;
            let out = filter(&left, &right, predicate)?;
            write_output(&output, &out)?;
            info!("kept {} of {} features", out.len(), left.len());
        }

        Commands::Join {
            input,
            other,
            output,
            predicate,
            cardinality,
            required,
            read,
        } => {
            let left = read_input(&input, &read)?;
            let right = read_input(&other, &read)?;
            let predicate: SpatialPredicate = predicate.parse()?;
            let cardinality: JoinCardinality = cardinality.parse()?;
            let out = if required {
                join_required(&left, &right, predicate, cardinality)?
            } else {
                join(&left, &right, predicate, cardinality)?
            };
            write_output(&output, &out)?;
            info!("joined: {} rows out", out.len());
        }

        Commands::Nearest {
            input,
            other,
            k,
            read,
        } => {
            let left = read_input(&input, &read)?;
            let right = read_input(&other, &read)?;
            let hits = nearest(&left, &right, k)?;
            for (i, neighbors) in hits.iter().enumerate() {
                let id = left.features()[i].id.as_deref().unwrap_or("-");
                for hit in neighbors {
                    println!(
                        "{}\t{}\t{:.3}",
                        id,
                        hit.id.as_deref().unwrap_or("-"),
                        hit.distance
                    );
                }
            }
        }

        Commands::Buffer {
            input,
            output,
            distance,
            segments,
            read,
        } => {
            let fc = read_input(&input, &read)?;
            let out = buffer(&fc, &BufferParams { distance, segments })?;
            write_output(&output, &out)?;
            info!("buffered {} features by {distance}", out.len());
        }

        Commands::Aggregate {
            buffers,
            coverage,
            field,
            read,
        } => {
            let buffer_fc = read_input(&buffers, &read)?;
            let coverage_fc = read_input(&coverage, &read)?;
            let rows = area_weighted_aggregate(&buffer_fc, &coverage_fc, &field)?;
            println!("index\tid\t{field}");
            for row in rows {
                let value = row
                    .value
                    .map(|v| format!("{v:.6}"))
                    .unwrap_or_else(|| "null".to_string());
                println!("{}\t{}\t{}", row.index, row.id.as_deref().unwrap_or("-"), value);
            }
        }

        Commands::Count {
            polygons,
            points,
            read,
        } => {
            let polygon_fc = read_input(&polygons, &read)?;
            let point_fc = read_input(&points, &read)?;
            let rows = count_aggregate(&polygon_fc, &point_fc)?;
            println!("index\tid\tcount");
            for row in rows {
                println!(
                    "{}\t{}\t{}",
                    row.index,
                    row.id.as_deref().unwrap_or("-"),
                    row.value.unwrap_or(0.0) as u64
                );
            }
        }

        Commands::Interpolate {
            input,
            output,
            field,
            method,
            cell_size,
            power,
            model,
            fallback_idw,
            read,
        } => {
            let fc = read_input(&input, &read)?;
            let samples = samples_from(&fc, &field)?;
            let grid = Grid::covering(&fc, cell_size)?;
            info!(
                "interpolating {} samples onto a {}x{} grid",
                samples.len(),
                grid.rows(),
                grid.cols()
            );

            let idw_params = IdwParams {
                power,
                ..Default::default()
            };
            let estimator = match method.as_str() {
                "idw" => Estimator::Idw(idw_params.clone()),
                "kriging" => {
                    let model = model
                        .as_deref()
                        .map(str::parse::<VariogramModel>)
                        .transpose()?;
                    Estimator::Kriging {
                        model,
                        variogram: VariogramParams::default(),
                        kriging: KrigingParams::default(),
                    }
                }
                other => bail!("unknown method '{other}' (expected idw|kriging)"),
            };

            let bar = spinner("solving");
            let surface = match estimate(&samples, &grid, &estimator) {
                Err(terralink_core::Error::Fit(reason)) if fallback_idw => {
                    bar.set_message("variogram fit failed, falling back to IDW");
                    tracing::warn!(%reason, "falling back to IDW");
                    estimate(&samples, &grid, &Estimator::Idw(idw_params))?
                }
                other => other?,
            };
            bar.finish_and_clear();

            let points = surface.to_point_features();
            write_output(&output, &points)?;
            info!(
                "wrote {} predicted cells to {}",
                points.len(),
                output.display()
            );
        }

        Commands::Fetch { source } => run_fetch(source)?,
    }

    Ok(())
}

fn run_fetch(source: FetchCommands) -> Result<()> {
    match source {
        FetchCommands::Census {
            base_url,
            dataset,
            value_field,
            zones,
            output,
            key_field,
            attr,
            read,
        } => {
            let zones_fc = read_input(&zones, &read)?;
            let codes: Vec<String> = zones_fc
                .iter()
                .filter_map(|f| {
                    f.get_property(&key_field)
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .collect();
            if codes.is_empty() {
                bail!("no zone carries a '{key_field}' code");
            }

            let client = CensusBlocking::new(base_url, HttpOptions::default())?;
            let table = client.fetch_table(&TableQuery {
                dataset,
                value_field,
                geographies: codes,
            })?;
            let out = attach_table(&zones_fc, &table, &key_field, &attr);
            write_output(&output, &out)?;
            info!("attached '{attr}' onto {} zones", out.len());
        }

        FetchCommands::Overpass {
            bbox,
            key,
            value,
            output,
        } => {
            let parts: Vec<f64> = bbox
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .context("parsing bbox (expected south,west,north,east)")?;
            if parts.len() != 4 {
                bail!("bbox needs 4 numbers, got {}", parts.len());
            }

            let client = OverpassBlocking::new(HttpOptions::default())?;
            let fc = client.fetch_features(&FeatureQuery {
                bbox: (parts[0], parts[1], parts[2], parts[3]),
                key,
                value,
            })?;
            write_output(&output, &fc)?;
            info!("fetched {} map features", fc.len());
        }

        FetchCommands::Download {
            url,
            output,
            cache_dir,
        } => {
            let bytes = download(&url, cache_dir.as_deref())?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("downloaded {} bytes to {}", bytes.len(), output.display());
        }
    }

    Ok(())
}
