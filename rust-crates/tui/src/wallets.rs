use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use ethers::signers::{
    LocalWallet,
    MnemonicBuilder,
    Signer,
    coins_bip39::English,
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

/// Where `cast wallet import` writes keystores.
pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// Keystore files carry no extension, so every visible file counts.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<LocalWallet> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    let wallet = wallet_from_keystore(descriptor, password.as_bytes())?;
    tracing::info!(wallet = %descriptor.name, address = ?wallet.address(), "unlocked wallet");
    Ok(wallet)
}

pub fn wallet_from_keystore(
    descriptor: &WalletDescriptor,
    password: &[u8],
) -> Result<LocalWallet> {
    let secret = decrypt_key(&descriptor.path, password)
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(wallet) = LocalWallet::from_bytes(&secret) {
        return Ok(wallet);
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            return MnemonicBuilder::<English>::default()
                .phrase(mnemonic.trim())
                .build()
                .wrap_err("Failed to derive key from mnemonic");
        }
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}
