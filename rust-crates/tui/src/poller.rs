use crate::contract::GameReader;
use color_eyre::eyre::Result;
use ethers::types::{
    Address,
    U256,
};
use generated_abi::{
    PlayerRecord,
    PlayerSlot,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// Failed reads carry the rendered error chain.
pub type ReadResult<T> = std::result::Result<T, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    BetAmount(ReadResult<U256>),
    Player(PlayerSlot, ReadResult<PlayerRecord>),
    Phase(ReadResult<u8>),
    Forfeiter(ReadResult<Address>),
    Winner(ReadResult<Address>),
}

#[derive(Debug)]
enum PollCommand {
    RefreshNow,
    Shutdown,
}

/// Owns the background task that re-reads the contract on a fixed interval.
/// Dropping the handle aborts the task.
pub struct Poller {
    cmd_tx: mpsc::UnboundedSender<PollCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<R: GameReader>(
        reader: R,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(poll_worker(reader, interval, cmd_rx, event_tx));
        let poller = Self {
            cmd_tx,
            handle: Some(handle),
        };
        (poller, event_rx)
    }

    pub fn refresh_now(&self) {
        let _ = self.cmd_tx.send(PollCommand::RefreshNow);
    }

    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(PollCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!(?err, "poll worker ended abnormally");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn poll_worker<R: GameReader>(
    reader: R,
    interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
    event_tx: mpsc::UnboundedSender<PollEvent>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut known_players: [Option<PlayerRecord>; 2] = [None, None];

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            cmd = cmd_rx.recv() => match cmd {
                Some(PollCommand::RefreshNow) => {}
                Some(PollCommand::Shutdown) | None => break,
            }
        }
        if poll_once(&reader, &mut known_players, &event_tx).await.is_err() {
            debug!("poll event receiver dropped");
            break;
        }
    }
}

async fn poll_once<R: GameReader>(
    reader: &R,
    known_players: &mut [Option<PlayerRecord>; 2],
    event_tx: &mpsc::UnboundedSender<PollEvent>,
) -> Result<(), mpsc::error::SendError<PollEvent>> {
    let (bet_amount, player_one, player_two, phase, forfeiter) = futures::join!(
        reader.bet_amount(),
        reader.player(PlayerSlot::One),
        reader.player(PlayerSlot::Two),
        reader.phase_code(),
        reader.forfeiter(),
    );

    event_tx.send(PollEvent::BetAmount(flatten(bet_amount, "betAmount")))?;
    for (slot, result) in [(PlayerSlot::One, player_one), (PlayerSlot::Two, player_two)] {
        if let Ok(record) = &result {
            known_players[slot.index()] = Some(*record);
        }
        event_tx.send(PollEvent::Player(slot, flatten(result, "players")))?;
    }
    event_tx.send(PollEvent::Phase(flatten(phase, "gameState")))?;
    event_tx.send(PollEvent::Forfeiter(flatten(forfeiter, "surrender")))?;

    let both_revealed = known_players
        .iter()
        .all(|record| record.is_some_and(|r| r.has_revealed()));
    if both_revealed {
        let winner = reader.winner().await;
        event_tx.send(PollEvent::Winner(flatten(winner, "viewWinner")))?;
    }
    debug!(both_revealed, "refetched game state");
    Ok(())
}

fn flatten<T>(result: Result<T>, query: &'static str) -> ReadResult<T> {
    result.map_err(|err| {
        warn!(?err, query, "contract read failed");
        format!("{err:#}")
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_support::FakeChain;
    use generated_abi::{
        Move,
        test_helpers::{
            PLAYER_ONE,
            PLAYER_TWO,
            committed,
            revealed,
        },
    };
    use tokio::time::Instant;

    async fn collect(
        rx: &mut mpsc::UnboundedReceiver<PollEvent>,
        count: usize,
    ) -> Vec<PollEvent> {
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            events.push(rx.recv().await.expect("poller stopped early"));
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn spawn__reads_five_queries_immediately_then_every_interval() {
        // given
        let chain = FakeChain::new();
        let game = chain.game();
        let started = Instant::now();

        // when
        let (poller, mut rx) = Poller::spawn(game, DEFAULT_POLL_INTERVAL);
        let first = collect(&mut rx, 5).await;
        let first_elapsed = started.elapsed();
        let second = collect(&mut rx, 5).await;
        let second_elapsed = started.elapsed();

        // then
        assert!(first_elapsed < Duration::from_secs(1));
        assert!(second_elapsed >= DEFAULT_POLL_INTERVAL);
        assert!(matches!(first[0], PollEvent::BetAmount(Ok(_))));
        assert!(matches!(first[3], PollEvent::Phase(Ok(0))));
        assert!(second.iter().all(|ev| !matches!(ev, PollEvent::Winner(_))));
        assert_eq!(chain.reads("winner"), 0);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn spawn__queries_winner_once_both_players_revealed() {
        // given
        let chain = FakeChain::new();
        chain.update(|c| {
            c.players = [revealed(PLAYER_ONE, Move::Rock), revealed(PLAYER_TWO, Move::Paper)];
            c.winner = PLAYER_TWO;
        });

        // when
        let (poller, mut rx) = Poller::spawn(chain.game(), DEFAULT_POLL_INTERVAL);
        let events = collect(&mut rx, 6).await;

        // then
        assert_eq!(events[5], PollEvent::Winner(Ok(PLAYER_TWO)));
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn spawn__skips_winner_while_one_player_unrevealed() {
        // given
        let chain = FakeChain::new();
        chain.update(|c| {
            c.players = [
                revealed(PLAYER_ONE, Move::Rock),
                committed(PLAYER_TWO, Move::Paper, "s"),
            ];
        });

        // when
        let (poller, mut rx) = Poller::spawn(chain.game(), DEFAULT_POLL_INTERVAL);
        let events = collect(&mut rx, 10).await;

        // then
        assert!(events.iter().all(|ev| !matches!(ev, PollEvent::Winner(_))));
        assert_eq!(chain.reads("winner"), 0);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn spawn__forwards_read_failures_and_keeps_polling() {
        // given
        let chain = FakeChain::new();
        chain.update(|c| c.fail_reads = true);

        // when
        let (poller, mut rx) = Poller::spawn(chain.game(), DEFAULT_POLL_INTERVAL);
        let first = collect(&mut rx, 5).await;
        chain.update(|c| c.fail_reads = false);
        let second = collect(&mut rx, 5).await;

        // then
        assert!(matches!(&first[0], PollEvent::BetAmount(Err(msg)) if msg.contains("rpc unavailable")));
        assert!(matches!(second[0], PollEvent::BetAmount(Ok(_))));
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now__triggers_read_before_interval() {
        // given
        let chain = FakeChain::new();
        let (poller, mut rx) = Poller::spawn(chain.game(), DEFAULT_POLL_INTERVAL);
        collect(&mut rx, 5).await;
        let started = Instant::now();

        // when
        poller.refresh_now();
        collect(&mut rx, 5).await;

        // then
        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL);
        assert_eq!(chain.reads("bet_amount"), 2);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown__closes_event_stream() {
        // given
        let chain = FakeChain::new();
        let (poller, mut rx) = Poller::spawn(chain.game(), DEFAULT_POLL_INTERVAL);
        collect(&mut rx, 5).await;

        // when
        poller.shutdown().await;

        // then
        while rx.recv().await.is_some() {}
        let reads = chain.reads("bet_amount");
        time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
        assert_eq!(chain.reads("bet_amount"), reads);
    }
}
