use crate::ui;
use color_eyre::eyre::{
    Report,
    Result,
    WrapErr,
    eyre,
};
use pending_moves::JsonMoveStore;
use rps_client::{
    config::{
        AppConfig,
        WalletConfig,
    },
    contract::{
        EthConnector,
        EthGame,
    },
    controller::{
        AppController,
        hash_preview,
    },
    poller::{
        PollEvent,
        Poller,
    },
    wallets,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};

type ActivePoller = Option<(Poller, mpsc::UnboundedReceiver<PollEvent>)>;

pub async fn run_app(config: AppConfig) -> Result<()> {
    let wallet = match &config.wallets {
        WalletConfig::ReadOnly => {
            info!("no wallet selected; running read-only");
            None
        }
        WalletConfig::Keystore { name, dir } => {
            let descriptor = wallets::find_wallet(dir, name)?;
            Some(wallets::unlock_wallet(&descriptor)?)
        }
    };
    let connector = EthConnector::new(config.network.url(), wallet).await?;
    let store = JsonMoveStore::open(&config.store_dir)
        .map_err(|err| eyre!("{err:#}"))
        .wrap_err("Failed to open pending move store")?;
    info!(path = %store.path().display(), "pending move store ready");
    let controller = AppController::new(connector, config.contract, Box::new(store));

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        controller,
        config.poll_interval,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn next_poll_event(poller: &mut ActivePoller) -> Option<PollEvent> {
    match poller {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn spawn_poller(game: Option<&EthGame>, interval: Duration) -> ActivePoller {
    game.map(|game| Poller::spawn(game.clone(), interval))
}

fn redraw(
    controller: &AppController<EthConnector>,
    ui_state: &mut ui::UiState,
    context: &'static str,
) -> Result<()> {
    ui::draw(ui_state, &controller.snapshot()).wrap_err(context)
}

fn show_processing_status(
    controller: &mut AppController<EthConnector>,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    redraw(controller, ui_state, context)
}

fn report_failure(
    controller: &mut AppController<EthConnector>,
    ui_state: &mut ui::UiState,
    err: &Report,
) {
    let message = format!("{err:#}");
    controller.push_errors(vec![message.clone()]);
    controller.set_status(err.to_string());
    ui::show_alert(ui_state, message);
}

async fn run_loop(
    mut controller: AppController<EthConnector>,
    poll_interval: Duration,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!("Running app loop");
    let mut poller = spawn_poller(controller.game(), poll_interval);
    if poller.is_none() {
        controller.set_status("No contract selected. Press n to open a game.");
    }
    redraw(&controller, ui_state, "initial draw failed")?;

    loop {
        tokio::select! {
            maybe_event = next_poll_event(&mut poller) => {
                match maybe_event {
                    Some(event) => {
                        controller.apply(event);
                        redraw(&controller, ui_state, "draw after poll failed")?;
                    }
                    None => {
                        warn!("poller channel closed");
                        poller = None;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Refresh => {
                        if let Some((p, _)) = poller.as_ref() {
                            p.refresh_now();
                            controller.set_status("Refreshing...");
                        }
                    }
                    ui::UserEvent::Commit { mv, secret } => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            format!("Committing {mv}..."),
                            "draw while committing failed",
                        )?;
                        match controller.commit_move(mv, &secret).await {
                            Ok(tx) => controller.set_status(format!(
                                "Commit sent ({}); waiting for confirmation...",
                                hash_preview(&tx)
                            )),
                            Err(err) => {
                                error!(error = ?err, "commit failed");
                                report_failure(&mut controller, ui_state, &err);
                            }
                        }
                    }
                    ui::UserEvent::Reveal => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Revealing move...",
                            "draw while revealing failed",
                        )?;
                        match controller.reveal_move().await {
                            Ok(tx) => controller.set_status(format!(
                                "Reveal sent ({}); waiting for confirmation...",
                                hash_preview(&tx)
                            )),
                            Err(err) => {
                                error!(error = ?err, "reveal failed");
                                report_failure(&mut controller, ui_state, &err);
                            }
                        }
                    }
                    ui::UserEvent::Forfeit => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Forfeiting...",
                            "draw while forfeiting failed",
                        )?;
                        match controller.surrender().await {
                            Ok(tx) => controller.set_status(format!(
                                "Forfeit sent ({}); waiting for confirmation...",
                                hash_preview(&tx)
                            )),
                            Err(err) => {
                                error!(error = ?err, "forfeit failed");
                                report_failure(&mut controller, ui_state, &err);
                            }
                        }
                    }
                    ui::UserEvent::OpenGame(address) => {
                        if let Some((old, _)) = poller.take() {
                            old.shutdown().await;
                        }
                        let game = controller.open_game(address);
                        poller = Some(Poller::spawn(game, poll_interval));
                    }
                }
                redraw(&controller, ui_state, "draw after input failed")?;
            }
        }
    }

    if let Some((p, _)) = poller.take() {
        p.shutdown().await;
    }
    Ok(())
}
