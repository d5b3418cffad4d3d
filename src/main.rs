//! Route Planner - Command Line Interface
//!
//! Plans driving routes for one or more drivers from a start address and a
//! list of stops.

use clap::{Parser, Subcommand, ValueEnum};
use route_planner::config::{OverflowPolicy, PlannerConfig};
use route_planner::directions::map_link;
use route_planner::maps::google::GoogleMaps;
use route_planner::maps::memory::MemoryMaps;
use route_planner::maps::{MapsService, MAX_LINK_PLACES, MAX_MATRIX_PLACES};
use route_planner::optimizer::{self, MAX_EXACT_STOPS};
use route_planner::place::{load_stops, read_text, Place};
use route_planner::planner::{PlanRequest, Planner};
use route_planner::report::PlanReport;
use route_planner::visualization::Visualizer;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "route-planner")]
#[command(version = "1.0")]
#[command(about = "Plan multi-stop driving routes for one or more drivers")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan routes from a start address through a list of stops
    Plan {
        /// Starting address
        #[arg(short, long)]
        start: String,

        /// A stop address (repeatable)
        #[arg(long = "stop")]
        stops: Vec<String>,

        /// Text (one address per line) or CSV file of stops; "-" reads stdin
        #[arg(short = 'f', long)]
        stops_file: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Serve travel times and directions from a JSON fixture instead of Google Maps
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Ordering strategy
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Number of drivers
        #[arg(short, long)]
        drivers: Option<usize>,

        /// Derive the driver count from a stop cap per driver
        #[arg(long)]
        max_stops_per_group: Option<usize>,

        /// Minutes spent at each stop
        #[arg(long)]
        stop_minutes: Option<u32>,

        /// Clustering seed
        #[arg(long)]
        seed: Option<u64>,

        /// Allow groups over the per-request limit (no map link)
        #[arg(long)]
        directions_only: bool,

        /// Plan driver groups in parallel
        #[arg(long)]
        parallel: bool,

        /// Show progress bars
        #[arg(long)]
        progress: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Write visiting order to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write an SVG plot of the routes
        #[arg(long)]
        svg: Option<PathBuf>,
    },

    /// Check a stop list before planning
    Inspect {
        /// Text or CSV file of stops; "-" reads stdin
        file: PathBuf,
    },

    /// Print the map link through places in the given order
    Link {
        /// Places in visiting order
        #[arg(required = true)]
        places: Vec<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Strategy {
    /// Shortest drive over every visiting order
    Exact,
    /// Farthest stop from the start first
    FarthestFirst,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Plan {
            start,
            stops,
            stops_file,
            config,
            fixture,
            strategy,
            drivers,
            max_stops_per_group,
            stop_minutes,
            seed,
            directions_only,
            parallel,
            progress,
            json,
            csv,
            svg,
        } => {
            let mut config = match config {
                Some(path) => match PlannerConfig::from_file(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error loading config {:?}: {}", path, e);
                        std::process::exit(1);
                    }
                },
                None => PlannerConfig::default(),
            }
            .with_env();

            if let Some(s) = strategy {
                config.strategy = match s {
                    Strategy::Exact => optimizer::Strategy::Exact,
                    Strategy::FarthestFirst => optimizer::Strategy::FarthestFirst,
                };
            }
            if let Some(d) = drivers {
                config.drivers = d;
            }
            if max_stops_per_group.is_some() {
                config.max_stops_per_group = max_stops_per_group;
            }
            if let Some(m) = stop_minutes {
                config.stop_minutes = m;
            }
            if let Some(s) = seed {
                config.seed = s;
            }
            if directions_only {
                config.overflow = OverflowPolicy::DirectionsOnly;
            }
            config.parallel |= parallel;
            config.show_progress |= progress;

            let mut places: Vec<Place> = stops.iter().map(|s| Place::new(s.trim())).collect();
            if let Some(path) = stops_file {
                match read_stops(&path) {
                    Ok(more) => places.extend(more),
                    Err(e) => {
                        eprintln!("Error reading stops from {:?}: {}", path, e);
                        std::process::exit(1);
                    }
                }
            }
            places.retain(|p| !p.as_str().is_empty());

            let request = PlanRequest::new(start, places);
            let outputs = Outputs { json, csv, svg };

            let maps: Box<dyn MapsService> = match fixture {
                Some(path) => match MemoryMaps::from_file(&path) {
                    Ok(m) => Box::new(m),
                    Err(e) => {
                        eprintln!("Error loading fixture {:?}: {}", path, e);
                        std::process::exit(1);
                    }
                },
                None => {
                    let timeout = Duration::from_secs(config.request_timeout_secs);
                    match GoogleMaps::new(config.api_key.clone(), timeout) {
                        Ok(m) => Box::new(m),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            std::process::exit(1);
                        }
                    }
                }
            };

            plan_routes(maps.as_ref(), &config, &request, &outputs);
        }

        Commands::Inspect { file } => {
            inspect_stops(&file);
        }

        Commands::Link { places } => {
            let places: Vec<Place> = places.iter().map(|p| Place::new(p.trim())).collect();
            match map_link(&places) {
                Some(link) => println!("{}", link),
                None => {
                    eprintln!(
                        "Error: a map link holds between 1 and {} places, got {}",
                        MAX_LINK_PLACES,
                        places.len()
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

struct Outputs {
    json: bool,
    csv: Option<PathBuf>,
    svg: Option<PathBuf>,
}

fn read_stops(path: &Path) -> route_planner::Result<Vec<Place>> {
    if path.as_os_str() == "-" {
        read_text(std::io::stdin().lock())
    } else {
        load_stops(path)
    }
}

fn plan_routes(maps: &dyn MapsService, config: &PlannerConfig, request: &PlanRequest, outputs: &Outputs) {
    let start = Instant::now();
    let planner = Planner::new(maps, config).always_geocode(outputs.svg.is_some());

    let response = match planner.plan(request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Planned {} route(s) in {:.2}s", response.groups.len(), start.elapsed().as_secs_f64());

    let report = PlanReport::from_response(&response);
    if outputs.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error encoding JSON: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", report.to_text());
    }

    if let Some(path) = &outputs.csv {
        if let Err(e) = report.export_csv(path) {
            eprintln!("Error writing CSV {:?}: {}", path, e);
        } else {
            println!("Route order saved to {:?}", path);
        }
    }

    if let Some(path) = &outputs.svg {
        let viz = Visualizer::new();
        match viz.generate_svg(&response) {
            Some(svg) => match viz.save_svg(&svg, path) {
                Ok(()) => println!("Plot saved to {:?}", path),
                Err(e) => eprintln!("Error writing SVG {:?}: {}", path, e),
            },
            None => eprintln!("No places could be located; skipping plot"),
        }
    }

    if response.succeeded() == 0 {
        std::process::exit(1);
    }
}

fn inspect_stops(path: &Path) {
    let stops = match read_stops(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading stops from {:?}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("========== Stop List ==========\n");
    println!("Stops: {}", stops.len());
    for (i, stop) in stops.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, stop);
    }

    let mut seen = HashSet::new();
    let duplicates: Vec<&Place> = stops.iter().filter(|s| !seen.insert(s.as_str())).collect();
    if !duplicates.is_empty() {
        println!("\nDuplicate addresses:");
        for d in duplicates {
            println!("  - {}", d);
        }
    }

    let per_driver = MAX_MATRIX_PLACES - 1;
    println!("\nLimits:");
    println!("  Places per distance request: {} (start + {} stops)", MAX_MATRIX_PLACES, per_driver);
    println!("  Exact ordering: up to {} stops per driver", MAX_EXACT_STOPS);
    if stops.len() > per_driver {
        println!(
            "  This list needs at least {} drivers, or --directions-only with farthest-first ordering",
            stops.len().div_ceil(per_driver)
        );
    } else {
        println!("  Fits a single driver");
    }
}
