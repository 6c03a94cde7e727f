use route_finder::geolocator::parse_radius;
use route_finder::{
    get_subscriber, init_subscriber, run_service, DataSource, DatasetStore, ServiceConfig,
};
use std::net::TcpListener;
use structopt::StructOpt;
use tracing::info;

#[derive(Debug, StructOpt)]
#[structopt(name = "route-finder", about = "suggest and locate transit routes")]
pub struct Opt {
    /// route data file or http(s) url
    #[structopt(
        short = "d",
        long = "data",
        env = "ROUTES_DATA",
        default_value = "index.json",
        parse(from_str)
    )]
    pub data: DataSource,
    /// http port
    #[structopt(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,
    /// maximum distance to the nearest pickup location in km
    #[structopt(
        short = "r",
        long = "radius",
        env = "MAX_RADIUS_KM",
        default_value = "5",
        parse(try_from_str = parse_radius)
    )]
    pub max_radius_km: f64,
    /// parallel bulk processing
    #[structopt(short = "P", long)]
    pub parallel: bool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("info,actix_web=error".into(), std::io::stdout);
    init_subscriber(subscriber);

    let opt = Opt::from_args();
    let store = DatasetStore::new();
    info!(source = %opt.data, "loading route data");
    store.spawn_load(opt.data);

    let listener = TcpListener::bind(("127.0.0.1", opt.port))?;
    let config = ServiceConfig {
        store,
        listener,
        max_radius_km: opt.max_radius_km,
        parallel: opt.parallel,
    };
    run_service(config)?.await
}
