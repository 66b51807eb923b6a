use ethers::types::{
    Address,
    H256,
    U256,
};

use crate::{
    Move,
    PlayerRecord,
    commitment,
};

pub const PLAYER_ONE: Address = Address::repeat_byte(0x11);
pub const PLAYER_TWO: Address = Address::repeat_byte(0x22);
pub const SPECTATOR: Address = Address::repeat_byte(0x33);

pub fn one_hundredth_eth() -> U256 {
    U256::exp10(16)
}

pub fn joined(address: Address) -> PlayerRecord {
    PlayerRecord {
        address,
        commitment: H256::zero(),
        revealed: None,
    }
}

pub fn committed(address: Address, mv: Move, secret: &str) -> PlayerRecord {
    PlayerRecord {
        address,
        commitment: commitment(mv, secret),
        revealed: None,
    }
}

pub fn revealed(address: Address, mv: Move) -> PlayerRecord {
    PlayerRecord {
        address,
        commitment: commitment(mv, "secret"),
        revealed: Some(mv),
    }
}

pub fn players(one: PlayerRecord, two: PlayerRecord) -> [PlayerRecord; 2] {
    [one, two]
}
