use log::{error, info};
use vpn_node_agent::configuration::config::Config;
use vpn_node_agent::controller::controller_handler::{shutdown_signal, Controller};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    info!("Importing configuration");
    let config = Config::from_args();

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    info!(
        "Monitoring {} for node {}",
        controller.config().status_file.display(),
        controller.config().node_id
    );

    if let Err(e) = controller.run(shutdown_signal()).await {
        error!("Node agent stopped on error: {}", e);
        std::process::exit(1);
    }
    info!("Node agent stopped");
}
