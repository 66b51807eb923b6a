use std::sync::Arc;

use ethers::{
    providers::Middleware,
    types::{
        Address,
        H256,
        U256,
    },
    utils::{
        format_ether,
        keccak256,
    },
};

pub mod moves;

pub use moves::{
    GamePhase,
    InvalidCode,
    Move,
    PlayerRecord,
    PlayerSlot,
    slot_of,
};

pub mod rps_types {
    use ethers::contract::abigen;

    abigen!(
        RockPaperScissors,
        r#"[
            function betAmount() external view returns (uint256)
            function players(uint256) external view returns (address, bytes32, uint8)
            function gameState() external view returns (uint8)
            function surrender() external view returns (address)
            function viewWinner() external view returns (address)
            function commitMove(bytes32) external payable
            function revealMove(uint8, string) external
            function forfeit() external
        ]"#
    );
}

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub fn contract_instance<M: Middleware>(
    address: Address,
    client: Arc<M>,
) -> rps_types::RockPaperScissors<M> {
    rps_types::RockPaperScissors::new(address, client)
}

/// `keccak256(abi.encodePacked(uint8 move, string secret))`, the value the
/// contract checks on reveal.
pub fn commitment(mv: Move, secret: &str) -> H256 {
    let mut packed = Vec::with_capacity(1 + secret.len());
    packed.push(mv.code());
    packed.extend_from_slice(secret.as_bytes());
    H256::from(keccak256(packed))
}

pub fn commitment_matches(record: &PlayerRecord, mv: Move, secret: &str) -> bool {
    record.commitment == commitment(mv, secret)
}

/// Wei rendered in ether without trailing zeros.
pub fn format_eth(amount: U256) -> String {
    let formatted = format_ether(amount);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => formatted,
    }
}

/// `0x1234...89abcdef`: the first six and last eight characters.
pub fn short_address(address: &Address) -> String {
    let full = format!("{address:?}");
    format!("{}...{}", &full[..6], &full[full.len() - 8..])
}
