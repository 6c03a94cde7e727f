use route_finder::dataset::{load_dataset, route_target, RouteDataset};
use route_finder::geojson::write_geojson;
use route_finder::geolocator::{
    find_nearest, parse_radius, FixedPosition, GeolocationProvider, Unsupported,
};
use route_finder::matcher::{best_match, normalize, suggest};
use route_finder::{get_subscriber, init_subscriber, DataSource, FinderError, Location};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use tracing::error;

#[derive(Debug, StructOpt)]
#[structopt(name = "locate", about = "find transit routes by pickup location")]
struct Opt {
    /// route data file or http(s) url
    #[structopt(
        short = "d",
        long = "data",
        env = "ROUTES_DATA",
        default_value = "index.json",
        parse(from_str)
    )]
    data: DataSource,
    /// maximum distance to the nearest pickup location in km
    #[structopt(
        short = "r",
        long = "radius",
        env = "MAX_RADIUS_KM",
        default_value = "5",
        parse(try_from_str = parse_radius)
    )]
    max_radius_km: f64,
    /// seconds to wait for a position fix
    #[structopt(short = "t", long = "timeout", default_value = "10")]
    timeout: u64,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// List up to four routes matching a location name
    Suggest { query: String },
    /// Print the route of the best matching location
    Best {
        query: String,
        /// Create a geojson file with the route's pickup locations
        #[structopt(short = "g", long = "geojson")]
        geojson: Option<PathBuf>,
    },
    /// Print the route closest to a position
    Nearest {
        /// position as "lng,lat"; without it no position fix is available
        #[structopt(short = "l", long = "loc")]
        loc: Option<Location>,
        /// Create a geojson file with the route's pickup locations
        #[structopt(short = "g", long = "geojson")]
        geojson: Option<PathBuf>,
    },
}

fn export(
    dataset: &RouteDataset,
    route_id: &str,
    path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    if let (Some(path), Some(route)) = (path, dataset.get(route_id)) {
        write_geojson(path, route_id, route)?;
    }
    Ok(())
}

async fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    let dataset = load_dataset(&opt.data).await.map_err(|e| {
        error!(error = %e, source = %opt.data, "route data unavailable");
        FinderError::DataUnavailable
    })?;

    match opt.cmd {
        Command::Suggest { query } => {
            if normalize(&query).is_none() {
                return Err(FinderError::EmptyQuery.into());
            }
            let candidates = suggest(&query, &dataset);
            if candidates.is_empty() {
                return Err(FinderError::NoMatch.into());
            }
            for candidate in candidates {
                println!(
                    "{}\tRoute-{} • {}\t{}",
                    candidate.location_name,
                    candidate.route_id,
                    candidate.route_name,
                    route_target(&candidate.route_id)
                );
            }
        }
        Command::Best { query, geojson } => {
            if normalize(&query).is_none() {
                return Err(FinderError::EmptyQuery.into());
            }
            let route_id = best_match(&query, &dataset).ok_or(FinderError::NoMatch)?;
            println!("{}", route_target(&route_id));
            export(&dataset, &route_id, geojson)?;
        }
        Command::Nearest { loc, geojson } => {
            let provider: Box<dyn GeolocationProvider> = match loc {
                Some(loc) => Box::new(FixedPosition(loc)),
                None => Box::new(Unsupported),
            };
            let timeout = Duration::from_secs(opt.timeout);
            let nearest =
                find_nearest(provider.as_ref(), &dataset, opt.max_radius_km, timeout).await?;
            println!(
                "{}\t{}\t{:.2} km",
                route_target(&nearest.route_id),
                nearest.location_name,
                nearest.distance_km
            );
            export(&dataset, &nearest.route_id, geojson)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = get_subscriber("warn".into(), std::io::stderr);
    init_subscriber(subscriber);

    let opt = Opt::from_args();
    if let Err(e) = run(opt).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
