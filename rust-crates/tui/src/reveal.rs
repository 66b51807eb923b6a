use crate::contract::GameWriter;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::{
    Address,
    TxHash,
};
use generated_abi::{
    Move,
    PlayerRecord,
    PlayerSlot,
    commitment_matches,
    slot_of,
};
use pending_moves::PendingMove;

pub const MISSING_MOVE_OR_SECRET: &str = "Move or secret is missing.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevealPanel {
    /// The viewer is not one of the two players.
    Spectating,
    /// The viewer has revealed; the other slot has not necessarily.
    Waiting { for_player: PlayerSlot },
    Active {
        chosen: Option<Move>,
        /// The cached move and secret do not open the on-chain commitment.
        commitment_mismatch: bool,
    },
}

pub fn reveal_panel(
    viewer: Option<&Address>,
    players: &[PlayerRecord; 2],
    pending: Option<&PendingMove>,
) -> RevealPanel {
    let Some(slot) = slot_of(viewer, players) else {
        return RevealPanel::Spectating;
    };
    let own = &players[slot.index()];
    if own.has_revealed() {
        return RevealPanel::Waiting {
            for_player: slot.other(),
        };
    }
    let commitment_mismatch = match pending.and_then(|p| p.secret().map(|s| (p.mv, s))) {
        Some((mv, secret)) => own.has_committed() && !commitment_matches(own, mv, secret),
        None => false,
    };
    RevealPanel::Active {
        chosen: pending.map(|p| p.mv),
        commitment_mismatch,
    }
}

pub fn reveal_args(pending: Option<&PendingMove>) -> Result<(Move, &str)> {
    pending
        .and_then(|p| p.secret().map(|secret| (p.mv, secret)))
        .ok_or_else(|| eyre!(MISSING_MOVE_OR_SECRET))
}

pub async fn reveal_move<W: GameWriter>(
    writer: &W,
    pending: Option<&PendingMove>,
) -> Result<TxHash> {
    let (mv, secret) = reveal_args(pending)?;
    tracing::info!(%mv, "revealing move");
    writer
        .reveal_move(mv, secret)
        .await
        .wrap_err("Failed to reveal move")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_support::{
        FakeChain,
        WriteCall,
    };
    use generated_abi::test_helpers::{
        PLAYER_ONE,
        PLAYER_TWO,
        SPECTATOR,
        committed,
        players,
        revealed,
    };

    #[test]
    fn reveal_panel__waits_once_viewer_has_revealed() {
        // given
        let records = players(
            committed(PLAYER_ONE, Move::Paper, "p1"),
            revealed(PLAYER_TWO, Move::Scissors),
        );

        // when
        let panel = reveal_panel(Some(&PLAYER_TWO), &records, None);

        // then
        assert_eq!(
            panel,
            RevealPanel::Waiting {
                for_player: PlayerSlot::One
            }
        );
    }

    #[test]
    fn reveal_panel__active_with_cached_move() {
        // given
        let records = players(
            committed(PLAYER_ONE, Move::Rock, "abc"),
            committed(PLAYER_TWO, Move::Paper, "p2"),
        );
        let pending = PendingMove::new(Move::Rock, "abc");

        // when
        let panel = reveal_panel(Some(&PLAYER_ONE), &records, Some(&pending));

        // then
        assert_eq!(
            panel,
            RevealPanel::Active {
                chosen: Some(Move::Rock),
                commitment_mismatch: false,
            }
        );
    }

    #[test]
    fn reveal_panel__flags_cache_that_does_not_open_commitment() {
        let records = players(
            committed(PLAYER_ONE, Move::Rock, "abc"),
            committed(PLAYER_TWO, Move::Paper, "p2"),
        );
        let pending = PendingMove::new(Move::Scissors, "abc");

        let panel = reveal_panel(Some(&PLAYER_ONE), &records, Some(&pending));

        assert_eq!(
            panel,
            RevealPanel::Active {
                chosen: Some(Move::Scissors),
                commitment_mismatch: true,
            }
        );
    }

    #[test]
    fn reveal_panel__spectator_gets_no_controls() {
        let records = players(
            committed(PLAYER_ONE, Move::Rock, "abc"),
            committed(PLAYER_TWO, Move::Paper, "p2"),
        );
        assert_eq!(
            reveal_panel(Some(&SPECTATOR), &records, None),
            RevealPanel::Spectating
        );
        assert_eq!(reveal_panel(None, &records, None), RevealPanel::Spectating);
    }

    #[test]
    fn reveal_args__rejects_missing_move_or_secret() {
        let empty_secret = PendingMove::new(Move::Rock, "");

        let missing = reveal_args(None).unwrap_err();
        let blank = reveal_args(Some(&empty_secret)).unwrap_err();

        assert_eq!(missing.to_string(), MISSING_MOVE_OR_SECRET);
        assert_eq!(blank.to_string(), MISSING_MOVE_OR_SECRET);
    }

    #[tokio::test]
    async fn reveal_move__sends_cached_move_and_secret() {
        // given
        let chain = FakeChain::new();
        let pending = PendingMove::new(Move::Paper, "hunter2");

        // when
        reveal_move(&chain.game(), Some(&pending)).await.unwrap();

        // then
        assert_eq!(
            chain.writes(),
            vec![WriteCall::Reveal {
                mv: Move::Paper,
                secret: "hunter2".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn reveal_move__does_not_dispatch_without_secret() {
        let chain = FakeChain::new();

        let result = reveal_move(&chain.game(), None).await;

        assert!(result.is_err());
        assert!(chain.writes().is_empty());
    }
}
