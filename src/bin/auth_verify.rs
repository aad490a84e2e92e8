use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use vpn_node_agent::web_interface::verify_client::{read_credentials, verify, DEFAULT_RELAY_URL};

#[derive(Parser)]
#[command(name = "auth-verify")]
#[command(about = "Checks VPN credentials against the local authentication relay")]
struct Args {
    /// File written by the VPN daemon: username, then password.
    credentials_file: Option<PathBuf>,

    #[arg(long, env = "AUTH_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let Some(path) = args.credentials_file else {
        println!("Userpass file not found");
        return ExitCode::FAILURE;
    };

    let credentials = match read_credentials(&path).await {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to read credential file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match verify(&reqwest::Client::new(), &args.relay_url, &credentials).await {
        Ok(true) => {
            println!("Authentication successful");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("Authentication failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("Internal error: {}", e);
            ExitCode::FAILURE
        }
    }
}
