//! Derives what the client shows from the latest contract reads.
//!
//! Nothing here talks to the chain: [`GameState`] accumulates [`PollEvent`]s
//! and [`derive_view`] turns it into a [`GameView`] for the current viewer.

use crate::{
    poller::PollEvent,
    reveal::{
        RevealPanel,
        reveal_panel,
    },
};
use ethers::types::{
    Address,
    U256,
};
use generated_abi::{
    GamePhase,
    Move,
    PlayerRecord,
    PlayerSlot,
    format_eth,
    slot_of,
};
use pending_moves::PendingMove;

/// Latest outcome of one contract read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Query::Loading
    }
}

impl<T> Query<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Query::Ready(value) => Some(value),
            Query::Loading | Query::Failed(_) => None,
        }
    }
}

impl<T> From<Result<T, String>> for Query<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => Query::Ready(value),
            Err(message) => Query::Failed(message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub bet_amount: Query<U256>,
    pub players: [Query<PlayerRecord>; 2],
    pub phase: Query<u8>,
    pub forfeiter: Query<Address>,
    pub winner: Query<Address>,
}

impl GameState {
    /// Later events overwrite earlier ones regardless of when the read started.
    pub fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::BetAmount(result) => self.bet_amount = result.into(),
            PollEvent::Player(slot, result) => self.players[slot.index()] = result.into(),
            PollEvent::Phase(result) => self.phase = result.into(),
            PollEvent::Forfeiter(result) => self.forfeiter = result.into(),
            PollEvent::Winner(result) => self.winner = result.into(),
        }
    }

    /// Player records with unloaded slots treated as empty.
    pub fn player_records(&self) -> [PlayerRecord; 2] {
        let record = |query: &Query<PlayerRecord>| {
            query.ready().copied().unwrap_or_else(PlayerRecord::empty)
        };
        [record(&self.players[0]), record(&self.players[1])]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameView {
    Loading,
    Error(String),
    /// `gameState()` returned a code with no known phase.
    Unrecognized(u8),
    Commit(CommitPanel),
    Reveal(RevealPanel),
    Finished(FinishedView),
}

impl GameView {
    /// A player who has not committed yet, in the commit phase.
    pub fn accepts_commit(&self) -> bool {
        matches!(
            self,
            GameView::Commit(CommitPanel {
                viewer_slot: Some(_),
                viewer_committed: false,
            })
        )
    }

    pub fn accepts_reveal(&self) -> bool {
        matches!(self, GameView::Reveal(RevealPanel::Active { .. }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitPanel {
    pub viewer_slot: Option<PlayerSlot>,
    pub viewer_committed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishedQuery {
    Forfeiter,
    Winner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinishedView {
    Loading(FinishedQuery),
    Failed {
        query: FinishedQuery,
        message: String,
    },
    Forfeited {
        by: PlayerSlot,
    },
    AwaitingReveals,
    Draw(DrawView),
    Decided(DecidedView),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawView {
    Spectator { player_one: Move, player_two: Move },
    Participant { yours: Move, opponent: Move },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecidedView {
    Spectator {
        winner: PlayerSlot,
        player_one: Move,
        player_two: Move,
        payout: Option<String>,
    },
    Participant {
        won: bool,
        yours: Move,
        opponent: Move,
        payout: Option<String>,
    },
}

pub fn derive_view(
    state: &GameState,
    viewer: Option<&Address>,
    pending: Option<&PendingMove>,
) -> GameView {
    let code = match &state.phase {
        Query::Loading => return GameView::Loading,
        Query::Failed(message) => return GameView::Error(message.clone()),
        Query::Ready(code) => *code,
    };
    let players = state.player_records();
    match GamePhase::from_code(code) {
        None => GameView::Unrecognized(code),
        Some(GamePhase::Commit) => GameView::Commit(commit_panel(viewer, &players)),
        Some(GamePhase::Reveal) => {
            GameView::Reveal(reveal_panel(viewer, &players, pending))
        }
        Some(GamePhase::Finished) => GameView::Finished(finished_view(state, viewer)),
    }
}

fn commit_panel(viewer: Option<&Address>, players: &[PlayerRecord; 2]) -> CommitPanel {
    let viewer_slot = slot_of(viewer, players);
    let viewer_committed =
        viewer_slot.is_some_and(|slot| players[slot.index()].has_committed());
    CommitPanel {
        viewer_slot,
        viewer_committed,
    }
}

pub fn finished_view(state: &GameState, viewer: Option<&Address>) -> FinishedView {
    let forfeiter = match &state.forfeiter {
        Query::Loading => return FinishedView::Loading(FinishedQuery::Forfeiter),
        Query::Failed(message) => {
            return FinishedView::Failed {
                query: FinishedQuery::Forfeiter,
                message: message.clone(),
            };
        }
        Query::Ready(address) => *address,
    };
    let players = state.player_records();
    if !forfeiter.is_zero() {
        let by = if players[0].address == forfeiter {
            PlayerSlot::One
        } else {
            PlayerSlot::Two
        };
        return FinishedView::Forfeited { by };
    }

    let (Some(first), Some(second)) = (players[0].revealed, players[1].revealed) else {
        return FinishedView::AwaitingReveals;
    };
    let moves = [first, second];
    let viewer_slot = slot_of(viewer, &players);

    if first == second {
        let draw = match viewer_slot {
            None => DrawView::Spectator {
                player_one: first,
                player_two: second,
            },
            Some(slot) => DrawView::Participant {
                yours: moves[slot.index()],
                opponent: moves[slot.other().index()],
            },
        };
        return FinishedView::Draw(draw);
    }

    let winner = match &state.winner {
        Query::Loading => return FinishedView::Loading(FinishedQuery::Winner),
        Query::Failed(message) => {
            return FinishedView::Failed {
                query: FinishedQuery::Winner,
                message: message.clone(),
            };
        }
        Query::Ready(address) => *address,
    };
    let payout = state.bet_amount.ready().map(|amount| format_eth(*amount));

    match (viewer, viewer_slot) {
        (Some(viewer), Some(slot)) => FinishedView::Decided(DecidedView::Participant {
            won: *viewer == winner,
            yours: moves[slot.index()],
            opponent: moves[slot.other().index()],
            payout,
        }),
        _ => match slot_of(Some(&winner), &players) {
            Some(winner) => FinishedView::Decided(DecidedView::Spectator {
                winner,
                player_one: first,
                player_two: second,
                payout,
            }),
            None => FinishedView::Failed {
                query: FinishedQuery::Winner,
                message: format!("winner {winner:?} is neither player"),
            },
        },
    }
}
