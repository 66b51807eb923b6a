use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::{
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        Provider,
    },
    signers::{
        LocalWallet,
        Signer,
    },
    types::{
        Address,
        H256,
        TxHash,
        U256,
    },
};
use generated_abi::{
    Move,
    PlayerRecord,
    PlayerSlot,
    contract_instance,
    rps_types::RockPaperScissors,
};
use std::{
    future::Future,
    sync::Arc,
};

pub const NO_WALLET: &str = "No wallet connected; restart with --wallet <name> to play";

/// Read surface of the game contract.
pub trait GameReader: Clone + Send + Sync + 'static {
    fn bet_amount(&self) -> impl Future<Output = Result<U256>> + Send;

    fn player(&self, slot: PlayerSlot) -> impl Future<Output = Result<PlayerRecord>> + Send;

    /// raw `gameState()` code; may fall outside the known phases
    fn phase_code(&self) -> impl Future<Output = Result<u8>> + Send;

    /// `surrender()`: the forfeiting address, or zero
    fn forfeiter(&self) -> impl Future<Output = Result<Address>> + Send;

    /// `viewWinner()`: the winning address, or zero
    fn winner(&self) -> impl Future<Output = Result<Address>> + Send;
}

/// Write surface of the game contract. Each call resolves once the node has
/// accepted the transaction, not when it is mined.
pub trait GameWriter {
    fn commit_move(
        &self,
        commitment: H256,
        value: U256,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    fn reveal_move(
        &self,
        mv: Move,
        secret: &str,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    fn forfeit(&self) -> impl Future<Output = Result<TxHash>> + Send;
}

pub trait GameConnector {
    type Game: GameReader + GameWriter;

    fn connect(&self, address: Address) -> Self::Game;

    /// the signing account, if a wallet is loaded
    fn account(&self) -> Option<Address>;
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Clone)]
pub struct EthConnector {
    provider: Arc<Provider<Http>>,
    signer: Option<Arc<SignerClient>>,
}

impl EthConnector {
    pub async fn new(url: &str, wallet: Option<LocalWallet>) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url)
            .wrap_err_with(|| format!("Invalid RPC URL {url}"))?;
        let chain_id = provider
            .get_chainid()
            .await
            .wrap_err_with(|| format!("Failed to connect to provider at {url}"))?;
        tracing::info!(%chain_id, "connected to {url}");
        let signer = wallet.map(|wallet| {
            let wallet = wallet.with_chain_id(chain_id.as_u64());
            tracing::info!(account = ?wallet.address(), "using wallet");
            Arc::new(SignerMiddleware::new(provider.clone(), wallet))
        });
        Ok(Self {
            provider: Arc::new(provider),
            signer,
        })
    }
}

impl GameConnector for EthConnector {
    type Game = EthGame;

    fn connect(&self, address: Address) -> EthGame {
        EthGame {
            reader: contract_instance(address, self.provider.clone()),
            writer: self
                .signer
                .as_ref()
                .map(|client| contract_instance(address, client.clone())),
        }
    }

    fn account(&self) -> Option<Address> {
        self.signer.as_ref().map(|client| client.address())
    }
}

#[derive(Clone)]
pub struct EthGame {
    reader: RockPaperScissors<Provider<Http>>,
    writer: Option<RockPaperScissors<SignerClient>>,
}

impl EthGame {
    fn writer(&self) -> Result<&RockPaperScissors<SignerClient>> {
        self.writer.as_ref().ok_or_else(|| eyre!(NO_WALLET))
    }
}

impl GameReader for EthGame {
    async fn bet_amount(&self) -> Result<U256> {
        self.reader
            .bet_amount()
            .call()
            .await
            .wrap_err("betAmount() call failed")
    }

    async fn player(&self, slot: PlayerSlot) -> Result<PlayerRecord> {
        let raw = self
            .reader
            .players(U256::from(slot.index()))
            .call()
            .await
            .wrap_err_with(|| format!("players({}) call failed", slot.index()))?;
        PlayerRecord::from_raw(raw).wrap_err_with(|| format!("{slot} record is malformed"))
    }

    async fn phase_code(&self) -> Result<u8> {
        self.reader
            .game_state()
            .call()
            .await
            .wrap_err("gameState() call failed")
    }

    async fn forfeiter(&self) -> Result<Address> {
        self.reader
            .surrender()
            .call()
            .await
            .wrap_err("surrender() call failed")
    }

    async fn winner(&self) -> Result<Address> {
        self.reader
            .view_winner()
            .call()
            .await
            .wrap_err("viewWinner() call failed")
    }
}

impl GameWriter for EthGame {
    async fn commit_move(&self, commitment: H256, value: U256) -> Result<TxHash> {
        let call = self.writer()?.commit_move(commitment.0).value(value);
        let pending = call.send().await.wrap_err("commitMove transaction rejected")?;
        Ok(pending.tx_hash())
    }

    async fn reveal_move(&self, mv: Move, secret: &str) -> Result<TxHash> {
        let call = self.writer()?.reveal_move(mv.code(), secret.to_string());
        let pending = call.send().await.wrap_err("revealMove transaction rejected")?;
        Ok(pending.tx_hash())
    }

    async fn forfeit(&self) -> Result<TxHash> {
        let call = self.writer()?.forfeit();
        let pending = call.send().await.wrap_err("forfeit transaction rejected")?;
        Ok(pending.tx_hash())
    }
}
