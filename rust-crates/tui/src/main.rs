use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::Address;
use rps_client::{
    config::{
        self,
        AppConfig,
        NetworkTarget,
        WalletConfig,
    },
    poller::DEFAULT_POLL_INTERVAL,
    wallets,
};
use std::{
    path::Path,
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_FILE: &str = "rps.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: rps [--sepolia | --local] [--rpc-url <url>] [--contract <address>]\n\
         [--wallet <name>] [--wallet-dir <path>]\n\
         [--store-dir <path>] [--log-dir <path>] [--poll-secs <n>]\n\
         \n\
         Flags:\n\
           --sepolia            Connect to Sepolia (default; RPC {})\n\
           --local              Connect to a local node (default RPC {})\n\
           --rpc-url <url>      Override the RPC URL for the selected network\n\
           --contract <address> Game contract to open on start\n\
           --wallet <name>      Keystore to play with; omit to watch read-only\n\
           --wallet-dir <path>  Override keystore directory (defaults to ~/.foundry/keystores)\n\
           --store-dir <path>   Where pending moves are kept (defaults to ~/.rps)\n\
           --log-dir <path>     Where logs are written (defaults to ~/.rps/logs)\n\
           --poll-secs <n>      Seconds between contract reads (default {})",
        config::DEFAULT_SEPOLIA_RPC_URL,
        config::DEFAULT_LOCAL_RPC_URL,
        DEFAULT_POLL_INTERVAL.as_secs(),
    );
    std::process::exit(0);
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Sepolia,
        Local,
    }

    fn set_once(slot: &mut Option<String>, value: String, flag: &str) -> Result<()> {
        if slot.is_some() {
            return Err(eyre!("{flag} may only be specified once"));
        }
        *slot = Some(value);
        Ok(())
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut contract: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut store_dir: Option<String> = None;
    let mut log_dir: Option<String> = None;
    let mut poll_secs: Option<String> = None;

    while let Some(arg) = args.next() {
        let mut value = |what: &str| {
            args.next()
                .ok_or_else(|| eyre!("{arg} requires {what} argument"))
        };
        match arg.as_str() {
            "--sepolia" | "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --sepolia/--local"
                    ));
                }
                network_flag = Some(if arg == "--sepolia" {
                    NetworkFlag::Sepolia
                } else {
                    NetworkFlag::Local
                });
            }
            "--rpc-url" => set_once(&mut custom_url, value("a URL")?, "--rpc-url")?,
            "--contract" => set_once(&mut contract, value("an address")?, "--contract")?,
            "--wallet" => set_once(&mut wallet_name, value("a wallet name")?, "--wallet")?,
            "--wallet-dir" => set_once(&mut wallet_dir, value("a path")?, "--wallet-dir")?,
            "--store-dir" => set_once(&mut store_dir, value("a path")?, "--store-dir")?,
            "--log-dir" => set_once(&mut log_dir, value("a path")?, "--log-dir")?,
            "--poll-secs" => set_once(&mut poll_secs, value("a number")?, "--poll-secs")?,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag.unwrap_or(NetworkFlag::Sepolia) {
        NetworkFlag::Sepolia => NetworkTarget::Sepolia {
            url: custom_url
                .unwrap_or_else(|| config::DEFAULT_SEPOLIA_RPC_URL.to_string()),
        },
        NetworkFlag::Local => NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| config::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let contract = contract
        .map(|raw| {
            Address::from_str(raw.trim())
                .map_err(|_| eyre!("Invalid contract address '{raw}'"))
        })
        .transpose()?;

    let wallets = match wallet_name {
        Some(name) => WalletConfig::Keystore {
            name,
            dir: wallets::resolve_wallet_dir(wallet_dir.as_deref())?,
        },
        None if wallet_dir.is_some() => {
            return Err(eyre!("--wallet-dir only applies together with --wallet <name>"));
        }
        None => WalletConfig::ReadOnly,
    };

    let poll_interval = match poll_secs {
        None => DEFAULT_POLL_INTERVAL,
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => return Err(eyre!("--poll-secs expects a positive number, got '{raw}'")),
        },
    };

    let store_dir = config::resolve_dir(store_dir.as_deref(), config::default_data_dir)?;
    let log_dir = config::resolve_dir(log_dir.as_deref(), || {
        Ok(config::default_data_dir()?.join("logs"))
    })?;

    Ok(AppConfig {
        network,
        wallets,
        contract,
        store_dir,
        log_dir,
        poll_interval,
    })
}

/// The TUI owns stdout, so logs go to a daily rolling file.
fn init_tracing(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE));
    let _ = LOG_GUARD.set(guard);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("Failed to install tracing subscriber: {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = parse_args(std::env::args().skip(1))?;
    init_tracing(&app_config.log_dir)?;
    tracing::info!(network = ?app_config.network, "starting rps client");
    client::run_app(app_config).await
}
