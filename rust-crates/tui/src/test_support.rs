use crate::contract::{
    GameConnector,
    GameReader,
    GameWriter,
    NO_WALLET,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use ethers::types::{
    Address,
    H256,
    TxHash,
    U256,
};
use generated_abi::{
    Move,
    PlayerRecord,
    PlayerSlot,
    test_helpers::one_hundredth_eth,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteCall {
    Commit { commitment: H256, value: U256 },
    Reveal { mv: Move, secret: String },
    Forfeit,
}

#[derive(Debug)]
pub struct ChainState {
    pub bet_amount: U256,
    pub players: [PlayerRecord; 2],
    pub phase: u8,
    pub forfeiter: Address,
    pub winner: Address,
    pub fail_reads: bool,
    pub fail_writes: bool,
    writes: Vec<(Address, WriteCall)>,
    reads: HashMap<&'static str, usize>,
    connected: Vec<Address>,
}

/// In-memory stand-in for a deployed game contract.
#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub const CONTRACT: Address = Address::repeat_byte(0xc0);

    pub fn new() -> Self {
        let state = ChainState {
            bet_amount: one_hundredth_eth(),
            players: [PlayerRecord::empty(), PlayerRecord::empty()],
            phase: 0,
            forfeiter: Address::zero(),
            winner: Address::zero(),
            fail_reads: false,
            fail_writes: false,
            writes: Vec::new(),
            reads: HashMap::new(),
            connected: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut ChainState)) {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard);
    }

    pub fn reads(&self, query: &str) -> usize {
        let guard = self.state.lock().unwrap();
        guard.reads.get(query).copied().unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        let guard = self.state.lock().unwrap();
        guard.writes.iter().map(|(_, call)| call.clone()).collect()
    }

    pub fn writes_to(&self, contract: Address) -> Vec<WriteCall> {
        let guard = self.state.lock().unwrap();
        guard
            .writes
            .iter()
            .filter(|(address, _)| *address == contract)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn connected(&self) -> Vec<Address> {
        self.state.lock().unwrap().connected.clone()
    }

    pub fn game(&self) -> FakeGame {
        FakeGame {
            address: Self::CONTRACT,
            signer: true,
            chain: self.clone(),
        }
    }

    pub fn connector(&self, account: Option<Address>) -> FakeConnector {
        FakeConnector {
            account,
            chain: self.clone(),
        }
    }

    fn read<T>(&self, query: &'static str, f: impl FnOnce(&ChainState) -> T) -> Result<T> {
        let mut guard = self.state.lock().unwrap();
        *guard.reads.entry(query).or_default() += 1;
        if guard.fail_reads {
            return Err(eyre!("rpc unavailable"));
        }
        Ok(f(&guard))
    }

    fn write(&self, contract: Address, call: WriteCall) -> Result<TxHash> {
        let mut guard = self.state.lock().unwrap();
        if guard.fail_writes {
            return Err(eyre!("execution reverted"));
        }
        guard.writes.push((contract, call));
        Ok(TxHash::from_low_u64_be(guard.writes.len() as u64))
    }
}

#[derive(Clone)]
pub struct FakeGame {
    address: Address,
    signer: bool,
    chain: FakeChain,
}

impl FakeGame {
    fn write(&self, call: WriteCall) -> Result<TxHash> {
        if !self.signer {
            return Err(eyre!(NO_WALLET));
        }
        self.chain.write(self.address, call)
    }
}

impl GameReader for FakeGame {
    async fn bet_amount(&self) -> Result<U256> {
        self.chain.read("bet_amount", |s| s.bet_amount)
    }

    async fn player(&self, slot: PlayerSlot) -> Result<PlayerRecord> {
        self.chain.read("player", |s| s.players[slot.index()])
    }

    async fn phase_code(&self) -> Result<u8> {
        self.chain.read("phase", |s| s.phase)
    }

    async fn forfeiter(&self) -> Result<Address> {
        self.chain.read("forfeiter", |s| s.forfeiter)
    }

    async fn winner(&self) -> Result<Address> {
        self.chain.read("winner", |s| s.winner)
    }
}

impl GameWriter for FakeGame {
    async fn commit_move(&self, commitment: H256, value: U256) -> Result<TxHash> {
        self.write(WriteCall::Commit { commitment, value })
    }

    async fn reveal_move(&self, mv: Move, secret: &str) -> Result<TxHash> {
        self.write(WriteCall::Reveal {
            mv,
            secret: secret.to_string(),
        })
    }

    async fn forfeit(&self) -> Result<TxHash> {
        self.write(WriteCall::Forfeit)
    }
}

pub struct FakeConnector {
    account: Option<Address>,
    chain: FakeChain,
}

impl GameConnector for FakeConnector {
    type Game = FakeGame;

    fn connect(&self, address: Address) -> FakeGame {
        self.chain.state.lock().unwrap().connected.push(address);
        FakeGame {
            address,
            signer: self.account.is_some(),
            chain: self.chain.clone(),
        }
    }

    fn account(&self) -> Option<Address> {
        self.account
    }
}
