use anyhow::{
    Context,
    Result,
};
use chrono::{
    DateTime,
    Utc,
};
use ethers::types::Address;
use generated_abi::Move;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};

pub const STORE_FILE: &str = "pending_moves.json";

/// The move and secret behind a commitment, kept until the reveal.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PendingMove {
    #[serde(rename = "move")]
    pub mv: Move,
    pub secret: String,
    pub saved_at: DateTime<Utc>,
}

impl PendingMove {
    pub fn new(mv: Move, secret: impl Into<String>) -> Self {
        Self {
            mv,
            secret: secret.into(),
            saved_at: Utc::now(),
        }
    }

    /// An empty secret cannot open a commitment the user meant to make.
    pub fn secret(&self) -> Option<&str> {
        if self.secret.is_empty() {
            None
        } else {
            Some(&self.secret)
        }
    }
}

pub trait MoveStore {
    fn load(&self, account: &Address) -> Result<Option<PendingMove>>;

    /// write or overwrite the pending move for an account
    fn save(&mut self, account: &Address, pending: PendingMove) -> Result<()>;
}

pub fn account_key(account: &Address) -> String {
    format!("{account:?}")
}

#[derive(Debug)]
pub struct JsonMoveStore {
    path: PathBuf,
}

impl JsonMoveStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = ensure_store(dir.as_ref())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, PendingMove>> {
        let data = fs::read(&self.path).with_context(|| {
            format!("Failed to read pending moves from {}", self.path.display())
        })?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&data).context("Failed to parse pending moves JSON")
    }

    fn write_all(&self, entries: &BTreeMap<String, PendingMove>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)
            .context("Failed to serialize pending moves")?;
        fs::write(&self.path, json).with_context(|| {
            format!("Failed to write pending moves to {}", self.path.display())
        })
    }
}

impl MoveStore for JsonMoveStore {
    fn load(&self, account: &Address) -> Result<Option<PendingMove>> {
        let mut entries = self.read_all()?;
        Ok(entries.remove(&account_key(account)))
    }

    fn save(&mut self, account: &Address, pending: PendingMove) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(account_key(account), pending);
        self.write_all(&entries)?;
        tracing::debug!(account = %account_key(account), path = %self.path.display(), "saved pending move");
        Ok(())
    }
}

fn ensure_store(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| {
            format!("Failed to create store directory {}", dir.display())
        })?;
    }
    let file_path = dir.join(STORE_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"").with_context(|| {
            format!("Failed to initialize pending move store at {:?}", file_path)
        })?;
    }
    Ok(file_path)
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryMoveStore {
    entries: Arc<Mutex<HashMap<String, PendingMove>>>,
}

impl InMemoryMoveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Arc<Mutex<HashMap<String, PendingMove>>> {
        self.entries.clone()
    }
}

impl MoveStore for InMemoryMoveStore {
    fn load(&self, account: &Address) -> Result<Option<PendingMove>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("pending move store poisoned"))?;
        Ok(guard.get(&account_key(account)).cloned())
    }

    fn save(&mut self, account: &Address, pending: PendingMove) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("pending move store poisoned"))?;
        guard.insert(account_key(account), pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use generated_abi::commitment;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    #[test]
    fn json_store__load_returns_none_for_fresh_store() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMoveStore::open(dir.path()).unwrap();

        // when
        let loaded = store.load(&alice()).unwrap();

        // then
        assert!(loaded.is_none());
        assert!(store.path().exists());
    }

    #[test]
    fn json_store__round_trip_reproduces_commitment() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonMoveStore::open(dir.path()).unwrap();
        let submitted = commitment(Move::Rock, "abc");
        store
            .save(&alice(), PendingMove::new(Move::Rock, "abc"))
            .unwrap();

        // when
        let reopened = JsonMoveStore::open(dir.path()).unwrap();
        let loaded = reopened.load(&alice()).unwrap().unwrap();

        // then
        assert_eq!(loaded.mv, Move::Rock);
        assert_eq!(loaded.secret(), Some("abc"));
        assert_eq!(commitment(loaded.mv, &loaded.secret), submitted);
    }

    #[test]
    fn json_store__keeps_accounts_apart() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonMoveStore::open(dir.path()).unwrap();

        // when
        store
            .save(&alice(), PendingMove::new(Move::Paper, "one"))
            .unwrap();
        store
            .save(&bob(), PendingMove::new(Move::Scissors, "two"))
            .unwrap();

        // then
        assert_eq!(store.load(&alice()).unwrap().unwrap().mv, Move::Paper);
        assert_eq!(store.load(&bob()).unwrap().unwrap().mv, Move::Scissors);
    }

    #[test]
    fn json_store__save_overwrites_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonMoveStore::open(dir.path()).unwrap();
        store
            .save(&alice(), PendingMove::new(Move::Paper, "first"))
            .unwrap();
        store
            .save(&alice(), PendingMove::new(Move::Rock, "second"))
            .unwrap();

        let loaded = store.load(&alice()).unwrap().unwrap();
        assert_eq!(loaded.mv, Move::Rock);
        assert_eq!(loaded.secret, "second");
    }

    #[test]
    fn json_store__file_is_keyed_by_lowercase_address() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonMoveStore::open(dir.path()).unwrap();
        let account = Address::repeat_byte(0xab);

        // when
        store
            .save(&account, PendingMove::new(Move::Scissors, "s"))
            .unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();

        // then
        let entry = &doc[format!("0x{}", "ab".repeat(20))];
        assert_eq!(entry["move"], 3);
        assert_eq!(entry["secret"], "s");
    }

    #[test]
    fn json_store__rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORE_FILE), b"{not json").unwrap();
        let store = JsonMoveStore::open(dir.path()).unwrap();

        assert!(store.load(&alice()).is_err());
    }

    #[test]
    fn pending_move__empty_secret_counts_as_missing() {
        let pending = PendingMove::new(Move::Rock, "");
        assert_eq!(pending.secret(), None);
    }

    #[test]
    fn in_memory_store__shares_entries_between_clones() {
        // given
        let store = InMemoryMoveStore::new();
        let mut writer = store.clone();

        // when
        writer
            .save(&alice(), PendingMove::new(Move::Paper, "x"))
            .unwrap();

        // then
        assert_eq!(store.load(&alice()).unwrap().unwrap().mv, Move::Paper);
        assert!(store.load(&bob()).unwrap().is_none());
        assert_eq!(store.entries().lock().unwrap().len(), 1);
    }
}
