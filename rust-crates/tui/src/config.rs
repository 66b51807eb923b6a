use color_eyre::eyre::{
    Result,
    WrapErr,
};
use ethers::types::Address;
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Sepolia { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Sepolia { url } | NetworkTarget::LocalNode { url } => url,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletConfig {
    /// No signer; the game can be watched but not played.
    ReadOnly,
    Keystore { name: String, dir: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub wallets: WalletConfig,
    pub contract: Option<Address>,
    pub store_dir: PathBuf,
    pub log_dir: PathBuf,
    pub poll_interval: Duration,
}

/// `~/.rps`, home of the pending move store and the logs.
pub fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".rps"))
}

pub fn resolve_dir(dir: Option<&str>, default: impl FnOnce() -> Result<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(raw) => Ok(PathBuf::from(shellexpand::tilde(raw).into_owned())),
        None => default(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn resolve_dir__expands_tilde() {
        let home = std::env::var("HOME").unwrap();

        let dir = resolve_dir(Some("~/games"), default_data_dir).unwrap();

        assert_eq!(dir, PathBuf::from(home).join("games"));
    }

    #[test]
    fn resolve_dir__falls_back_to_default() {
        let dir = resolve_dir(None, || Ok(PathBuf::from("/tmp/rps"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/rps"));
    }

    #[test]
    fn network_target__exposes_url() {
        let target = NetworkTarget::LocalNode {
            url: DEFAULT_LOCAL_RPC_URL.to_string(),
        };
        assert_eq!(target.url(), "http://localhost:8545");
    }
}
