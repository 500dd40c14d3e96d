use environment_controller::Settings;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "environment-controller")]
struct Opt {
    #[structopt(long, default_value = "0.0.0.0")]
    bind_address: IpAddr,

    #[structopt(long, default_value = "8001")]
    port: u16,

    #[structopt(long, default_value = ".")]
    working_dir: PathBuf,

    #[structopt(long)]
    log_as_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    init_logging(opt.log_as_json);

    let settings = Settings {
        bind_address: SocketAddr::new(opt.bind_address, opt.port),
        db_path: fabric_common::config::db_path(&opt.working_dir, "environment_controller"),
        tasks_repo: opt.working_dir.join("tasks"),
        runtime_dir: opt.working_dir.join("runtime"),
    };
    environment_controller::run(settings).await
}

fn init_logging(as_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if as_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
