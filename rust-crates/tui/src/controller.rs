use crate::{
    contract::{
        GameConnector,
        GameWriter,
        NO_WALLET,
    },
    game_view::{
        CommitPanel,
        GameState,
        GameView,
        Query,
        derive_view,
    },
    poller::PollEvent,
    reveal,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::{
    Address,
    TxHash,
    U256,
};
use generated_abi::{
    Move,
    PlayerRecord,
    PlayerSlot,
    commitment,
    slot_of,
};
use pending_moves::{
    MoveStore,
    PendingMove,
};
use tracing::{
    error,
    info,
};

pub const NO_CONTRACT: &str = "Contract address not set. Please deploy the contract first";
pub const COMMIT_CLOSED: &str = "Moves can only be committed during the commit phase";
pub const NOT_A_PLAYER: &str = "Only the game's players can commit a move";
pub const ALREADY_COMMITTED: &str = "You have already committed a move for this game";
pub const NOTHING_TO_REVEAL: &str = "There is no move to reveal right now";
const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub contract: Option<Address>,
    pub account: Option<Address>,
    pub bet_amount: Query<U256>,
    pub players: [Query<PlayerRecord>; 2],
    pub viewer_slot: Option<PlayerSlot>,
    pub pending: Option<PendingMove>,
    pub view: GameView,
    pub status: String,
    pub errors: Vec<String>,
}

/// Holds the state of the open game and performs the write operations.
pub struct AppController<K: GameConnector> {
    connector: K,
    contract: Option<Address>,
    game: Option<K::Game>,
    account: Option<Address>,
    store: Box<dyn MoveStore + Send>,
    pending: Option<PendingMove>,
    state: GameState,
    pub status: String,
    errors: Vec<String>,
}

impl<K: GameConnector> AppController<K> {
    pub fn new(
        connector: K,
        contract: Option<Address>,
        store: Box<dyn MoveStore + Send>,
    ) -> Self {
        let account = connector.account();
        let game = contract.map(|address| connector.connect(address));
        let mut controller = Self {
            connector,
            contract,
            game,
            account,
            store,
            pending: None,
            state: GameState::default(),
            status: String::from("Ready"),
            errors: Vec::new(),
        };
        controller.reload_pending();
        controller
    }

    fn reload_pending(&mut self) {
        let Some(account) = self.account else {
            return;
        };
        match self.store.load(&account) {
            Ok(pending) => self.pending = pending,
            Err(err) => self.push_errors(vec![format!("Failed to load saved move: {err:#}")]),
        }
    }

    pub fn game(&self) -> Option<&K::Game> {
        self.game.as_ref()
    }

    pub fn contract(&self) -> Option<Address> {
        self.contract
    }

    /// Switches to another deployment and forgets everything read from the old one.
    pub fn open_game(&mut self, address: Address) -> K::Game {
        info!(contract = ?address, "opening game");
        let game = self.connector.connect(address);
        self.contract = Some(address);
        self.game = Some(game.clone());
        self.state = GameState::default();
        self.reload_pending();
        self.set_status(format!("Opened game {address:?}"));
        game
    }

    pub fn apply(&mut self, event: PollEvent) {
        self.state.apply(event);
    }

    pub fn view(&self) -> GameView {
        derive_view(&self.state, self.account.as_ref(), self.pending.as_ref())
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let players = self.state.player_records();
        AppSnapshot {
            contract: self.contract,
            account: self.account,
            bet_amount: self.state.bet_amount.clone(),
            players: self.state.players.clone(),
            viewer_slot: slot_of(self.account.as_ref(), &players),
            pending: self.pending.clone(),
            view: self.view(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Saves the move locally, then sends `commitMove` with the bet attached.
    ///
    /// Refused unless the viewer is a player still due to commit, so a saved
    /// secret that opens an existing commitment is never overwritten.
    pub async fn commit_move(&mut self, mv: Move, secret: &str) -> Result<TxHash> {
        let game = self.game.as_ref().ok_or_else(|| eyre!(NO_CONTRACT))?;
        let account = self.account.ok_or_else(|| eyre!(NO_WALLET))?;
        match self.view() {
            GameView::Commit(CommitPanel {
                viewer_slot: None, ..
            }) => return Err(eyre!(NOT_A_PLAYER)),
            GameView::Commit(CommitPanel {
                viewer_committed: true,
                ..
            }) => return Err(eyre!(ALREADY_COMMITTED)),
            GameView::Commit(_) => {}
            _ => return Err(eyre!(COMMIT_CLOSED)),
        }
        if secret.is_empty() {
            return Err(eyre!("Secret must not be empty"));
        }
        let bet = *self
            .state
            .bet_amount
            .ready()
            .ok_or_else(|| eyre!("Bet amount has not loaded yet"))?;

        let pending = PendingMove::new(mv, secret);
        self.store
            .save(&account, pending.clone())
            .map_err(|err| eyre!("{err:#}"))
            .wrap_err("Failed to save move locally")?;
        self.pending = Some(pending);

        let hash = commitment(mv, secret);
        info!(%mv, commitment = ?hash, %bet, "committing move");
        game.commit_move(hash, bet)
            .await
            .wrap_err("Failed to commit move")
    }

    pub async fn reveal_move(&mut self) -> Result<TxHash> {
        let game = self.game.as_ref().ok_or_else(|| eyre!(NO_CONTRACT))?;
        if self.account.is_none() {
            return Err(eyre!(NO_WALLET));
        }
        if !self.view().accepts_reveal() {
            return Err(eyre!(NOTHING_TO_REVEAL));
        }
        reveal::reveal_move(game, self.pending.as_ref()).await
    }

    pub async fn surrender(&mut self) -> Result<TxHash> {
        let game = self.game.as_ref().ok_or_else(|| eyre!(NO_CONTRACT))?;
        info!("forfeiting game");
        game.forfeit().await.wrap_err("Failed to Surrender")
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

pub fn hash_preview(hash: &TxHash) -> String {
    let hash = format!("{hash:?}");
    let preview_len = hash.len().min(18);
    let mut preview = hash[..preview_len].to_string();
    if hash.len() > preview_len {
        preview.push_str("...");
    }
    preview
}
