use ethers::types::{
    Address,
    H256,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// A code read from the contract that does not map to any known variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidCode {
    pub kind: &'static str,
    pub code: u8,
}

impl fmt::Display for InvalidCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} code {}", self.kind, self.code)
    }
}

impl std::error::Error for InvalidCode {}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// Contract encoding; 0 is reserved for "not revealed".
    pub fn code(self) -> u8 {
        match self {
            Move::Rock => 1,
            Move::Paper => 2,
            Move::Scissors => 3,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Move::Rock => Move::Paper,
            Move::Paper => Move::Scissors,
            Move::Scissors => Move::Rock,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Move::Rock => Move::Scissors,
            Move::Paper => Move::Rock,
            Move::Scissors => Move::Paper,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Move::Rock => "🪨",
            Move::Paper => "📄",
            Move::Scissors => "✂️",
        }
    }
}

impl From<Move> for u8 {
    fn from(value: Move) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for Move {
    type Error = InvalidCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Move::Rock),
            2 => Ok(Move::Paper),
            3 => Ok(Move::Scissors),
            _ => Err(InvalidCode { kind: "move", code }),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GamePhase {
    Commit,
    Reveal,
    Finished,
}

impl GamePhase {
    /// Codes outside `0..=2` have no phase.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(GamePhase::Commit),
            1 => Some(GamePhase::Reveal),
            2 => Some(GamePhase::Finished),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub const BOTH: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    /// Index passed to `players(uint256)`.
    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSlot::One => write!(f, "Player 1"),
            PlayerSlot::Two => write!(f, "Player 2"),
        }
    }
}

/// One entry of the contract's `players` array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlayerRecord {
    pub address: Address,
    pub commitment: H256,
    pub revealed: Option<Move>,
}

impl PlayerRecord {
    pub fn from_raw(raw: (Address, [u8; 32], u8)) -> Result<Self, InvalidCode> {
        let (address, commitment, code) = raw;
        let revealed = match code {
            0 => None,
            other => Some(Move::try_from(other)?),
        };
        Ok(Self {
            address,
            commitment: H256::from(commitment),
            revealed,
        })
    }

    pub fn empty() -> Self {
        Self {
            address: Address::zero(),
            commitment: H256::zero(),
            revealed: None,
        }
    }

    pub fn has_committed(&self) -> bool {
        !self.commitment.is_zero()
    }

    pub fn has_revealed(&self) -> bool {
        self.revealed.is_some()
    }

    /// Addresses compare as bytes, so hex casing of the source string never matters.
    pub fn belongs_to(&self, account: &Address) -> bool {
        !self.address.is_zero() && self.address == *account
    }
}

/// Which slot, if any, the connected account occupies.
pub fn slot_of(
    viewer: Option<&Address>,
    players: &[PlayerRecord; 2],
) -> Option<PlayerSlot> {
    let viewer = viewer?;
    PlayerSlot::BOTH
        .into_iter()
        .find(|slot| players[slot.index()].belongs_to(viewer))
}
