use color_eyre::eyre::{Result, eyre};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ethers::types::Address;
use futures::StreamExt;
use generated_abi::{Move, PlayerRecord, PlayerSlot, format_eth, short_address};
use rand::{Rng, distr::Alphanumeric};
use ratatui::{prelude::*, widgets::*};
use rps_client::{
    controller::AppSnapshot,
    game_view::{
        CommitPanel, DecidedView, DrawView, FinishedQuery, FinishedView, GameView, Query,
    },
    reveal::RevealPanel,
};
use std::{io::stdout, str::FromStr};
use unicode_width::UnicodeWidthStr;

const RANDOM_SECRET_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Commit { mv: Move, secret: String },
    Reveal,
    Forfeit,
    Refresh,
    OpenGame(Address),
}

pub type InputEventReceiver = EventStream;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    /// Mirrors the last drawn view; `c` opens the commit modal only when set.
    commit_enabled: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    CommitModal(CommitState),
    OpenGameModal(OpenGameState),
    ForfeitModal,
    QuitModal,
    Alert(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CommitState {
    mv: Move,
    secret: String,
    hint: Option<&'static str>,
}

impl Default for CommitState {
    fn default() -> Self {
        CommitState {
            mv: Move::Rock,
            secret: String::new(),
            hint: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct OpenGameState {
    input: String,
    error: Option<String>,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Opens a blocking alert; it stays up until dismissed with Enter or Esc.
pub fn show_alert(state: &mut UiState, message: impl Into<String>) {
    state.mode = Mode::Alert(message.into());
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.commit_enabled = snap.view.accepts_commit();
    if !state.commit_enabled && matches!(state.mode, Mode::CommitModal(_)) {
        state.mode = Mode::Normal;
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    // raw mode swallows SIGINT
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }
    let commit_enabled = state.commit_enabled;
    match &mut state.mode {
        Mode::CommitModal(cs) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Left => {
                cs.mv = cs.mv.prev();
                Some(UserEvent::Redraw)
            }
            KeyCode::Right => {
                cs.mv = cs.mv.next();
                Some(UserEvent::Redraw)
            }
            KeyCode::Tab => {
                cs.secret = random_secret();
                cs.hint = None;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                cs.secret.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                if cs.secret.is_empty() {
                    cs.hint = Some("Type a secret or press Tab to generate one");
                    return Some(UserEvent::Redraw);
                }
                let ev = UserEvent::Commit {
                    mv: cs.mv,
                    secret: std::mem::take(&mut cs.secret),
                };
                state.mode = Mode::Normal;
                Some(ev)
            }
            KeyCode::Char(c) => {
                cs.secret.push(c);
                cs.hint = None;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::OpenGameModal(os) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                os.input.pop();
                os.error = None;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => match Address::from_str(os.input.trim()) {
                Ok(address) => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::OpenGame(address))
                }
                Err(_) => {
                    os.error = Some(format!("'{}' is not a contract address", os.input.trim()));
                    Some(UserEvent::Redraw)
                }
            },
            KeyCode::Char(c) if !c.is_whitespace() => {
                os.input.push(c);
                os.error = None;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::ForfeitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                state.mode = Mode::Normal;
                Some(UserEvent::Forfeit)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Alert(_) => match k.code {
            KeyCode::Enter | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('c') if commit_enabled => {
                state.mode = Mode::CommitModal(CommitState::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') => Some(UserEvent::Reveal),
            KeyCode::Char('f') => {
                state.mode = Mode::ForfeitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('n') => {
                state.mode = Mode::OpenGameModal(OpenGameState::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('u') => Some(UserEvent::Refresh),
            _ => None,
        },
    }
}

fn random_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SECRET_LEN)
        .map(char::from)
        .collect()
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // game + prize
            Constraint::Length(7), // player cards
            Constraint::Min(7),    // stage
            Constraint::Length(6), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_game_panel(f, chunks[0], snap);
    draw_players(f, chunks[1], snap);
    draw_stage(f, chunks[2], snap);
    draw_status(f, chunks[3], snap);
    draw_help(f, chunks[4]);
    draw_modals(f, state);
}

fn draw_game_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = Paragraph::new(game_lines(snap))
        .block(Block::default().borders(Borders::ALL).title("Rock Paper Scissors"));
    f.render_widget(widget, area);
}

fn game_lines(snap: &AppSnapshot) -> Vec<Line<'static>> {
    let contract = match snap.contract {
        Some(address) => format!("{address:?}"),
        None => String::from("not set (press n to open a game)"),
    };
    let account = match snap.account {
        Some(address) => format!("{address:?}"),
        None => String::from("none (read-only spectator)"),
    };
    let bet = query_line("Bet: ", &snap.bet_amount, |amount| {
        format!("{} ETH", format_eth(*amount))
    });
    let prize = query_line("Prize Amount: ", &snap.bet_amount, |amount| {
        format!("{} ETH", format_eth(*amount))
    });
    vec![
        Line::from(format!("Contract: {contract}")),
        Line::from(format!("Account: {account}")),
        Line::from(vec![bet, Span::raw(" | "), prize]),
    ]
}

fn query_line<'a, T>(
    label: &'a str,
    query: &Query<T>,
    render: impl FnOnce(&T) -> String,
) -> Span<'a> {
    match query {
        Query::Loading => Span::styled(
            format!("{label}loading..."),
            Style::default().fg(Color::DarkGray),
        ),
        Query::Failed(message) => {
            Span::styled(format!("{label}{message}"), Style::default().fg(Color::Red))
        }
        Query::Ready(value) => Span::raw(format!("{label}{}", render(value))),
    }
}

fn draw_players(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    for slot in PlayerSlot::BOTH {
        let is_viewer = snap.viewer_slot == Some(slot);
        let lines = match &snap.players[slot.index()] {
            Query::Loading => {
                vec![Line::styled("Loading...", Style::default().fg(Color::DarkGray))]
            }
            Query::Failed(message) => {
                vec![Line::styled(message.clone(), Style::default().fg(Color::Red))]
            }
            Query::Ready(record) => player_lines(record),
        };
        let title = if is_viewer {
            format!("{slot} (You)")
        } else {
            slot.to_string()
        };
        let border = if is_viewer {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let card = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title),
        );
        f.render_widget(card, cols[slot.index()]);
    }
}

fn player_lines(record: &PlayerRecord) -> Vec<Line<'static>> {
    if record.address.is_zero() {
        return vec![Line::styled(
            "Waiting for player to join",
            Style::default().fg(Color::DarkGray),
        )];
    }
    let revealed = match record.revealed {
        Some(mv) => format!("Revealed: ✅ {}", move_label(mv)),
        None => String::from("Revealed: ❌"),
    };
    vec![
        Line::from(format!("Address: {}", short_address(&record.address))),
        Line::from(format!(
            "Move Chosen: {}",
            if record.has_committed() { "✅" } else { "❌" }
        )),
        Line::from(revealed),
    ]
}

fn move_label(mv: Move) -> String {
    format!("{} {}", mv.emoji(), mv)
}

fn draw_stage(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let (title, lines) = match &snap.view {
        GameView::Loading => ("Game", vec![dim("Loading game state...")]),
        GameView::Error(message) => ("Game", vec![red(message.clone())]),
        GameView::Unrecognized(code) => {
            ("Game", vec![red(format!("Unknown game state {code}"))])
        }
        GameView::Commit(panel) => ("Commit Phase", commit_lines(panel, snap)),
        GameView::Reveal(panel) => ("Reveal Phase", reveal_lines(panel)),
        GameView::Finished(view) => ("Game Over", finished_lines(view)),
    };
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn commit_lines(panel: &CommitPanel, snap: &AppSnapshot) -> Vec<Line<'static>> {
    if panel.viewer_slot.is_none() {
        return vec![Line::from("Players are choosing their moves.")];
    }
    if panel.viewer_committed {
        let mut lines = vec![Line::from("Move committed. Waiting for your opponent...")];
        if let Some(pending) = &snap.pending {
            lines.push(Line::from(format!("Your move: {}", move_label(pending.mv))));
        }
        return lines;
    }
    let stake = match snap.bet_amount.ready() {
        Some(amount) => format!("{} ETH", format_eth(*amount)),
        None => String::from("the bet"),
    };
    vec![
        Line::from("Choose your move and a secret to hide it until the reveal."),
        Line::from(format!("Press c to commit and stake {stake}.")),
    ]
}

fn reveal_lines(panel: &RevealPanel) -> Vec<Line<'static>> {
    match panel {
        RevealPanel::Spectating => vec![Line::from("Players are revealing their moves.")],
        RevealPanel::Waiting { for_player } => {
            vec![dim(format!("Waiting for {for_player} to reveal..."))]
        }
        RevealPanel::Active {
            chosen,
            commitment_mismatch,
        } => {
            let mut lines = vec![match chosen {
                Some(mv) => Line::from(format!("Your move: {}", move_label(*mv))),
                None => red("No saved move found for this account".to_string()),
            }];
            if *commitment_mismatch {
                lines.push(Line::styled(
                    "Saved move and secret do not match your commitment; the reveal will likely fail.",
                    Style::default().fg(Color::Yellow),
                ));
            }
            lines.push(Line::from("Press r to reveal, f to forfeit."));
            lines
        }
    }
}

fn finished_lines(view: &FinishedView) -> Vec<Line<'static>> {
    let restart = Line::from("Press n to open another game.");
    match view {
        FinishedView::Loading(FinishedQuery::Forfeiter) => {
            vec![dim("Loading forfeit status...")]
        }
        FinishedView::Loading(FinishedQuery::Winner) => vec![dim("Loading winner...")],
        FinishedView::Failed { message, .. } => vec![red(message.clone())],
        FinishedView::Forfeited { by } => vec![
            Line::styled(
                format!("{by} Forfeited"),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            restart,
        ],
        FinishedView::AwaitingReveals => vec![dim("Waiting for result...")],
        FinishedView::Draw(draw) => {
            let moves = match draw {
                DrawView::Spectator {
                    player_one,
                    player_two,
                } => format!(
                    "Player 1: {} | Player 2: {}",
                    move_label(*player_one),
                    move_label(*player_two)
                ),
                DrawView::Participant { yours, opponent } => format!(
                    "Your move: {} | Opponent's move: {}",
                    move_label(*yours),
                    move_label(*opponent)
                ),
            };
            vec![bold("It's a Draw!"), Line::from(moves), restart]
        }
        FinishedView::Decided(DecidedView::Participant {
            won,
            yours,
            opponent,
            payout,
        }) => {
            let headline = match (won, payout) {
                (true, Some(payout)) => format!("You Won {payout} ETH!"),
                (true, None) => String::from("You Won!"),
                (false, _) => String::from("You Lost"),
            };
            vec![
                bold(headline),
                Line::from(format!(
                    "Your move: {} | Opponent's move: {}",
                    move_label(*yours),
                    move_label(*opponent)
                )),
                restart,
            ]
        }
        FinishedView::Decided(DecidedView::Spectator {
            winner,
            player_one,
            player_two,
            payout,
        }) => {
            let headline = match payout {
                Some(payout) => format!("{winner} Won {payout} ETH"),
                None => format!("{winner} Won"),
            };
            vec![
                bold(headline),
                Line::from(format!(
                    "Player 1: {} | Player 2: {}",
                    move_label(*player_one),
                    move_label(*player_two)
                )),
                restart,
            ]
        }
    }
}

fn dim(text: impl Into<String>) -> Line<'static> {
    Line::styled(text.into(), Style::default().fg(Color::DarkGray))
}

fn red(text: String) -> Line<'static> {
    Line::styled(text, Style::default().fg(Color::Red))
}

fn bold(text: impl Into<String>) -> Line<'static> {
    Line::styled(text.into(), Style::default().add_modifier(Modifier::BOLD))
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let text = if snap.status.trim().is_empty() {
            "Ready"
        } else {
            snap.status.as_str()
        };
        Paragraph::new(text.to_string())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        // newest first so the latest failure stays visible
        let lines: Vec<Line> = snap
            .errors
            .iter()
            .rev()
            .map(|e| Line::from(e.clone()))
            .collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "c commit | r reveal | f forfeit | n open game | u refresh | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::CommitModal(cs) => {
            let area = centered_rect(50, 40, f.area());
            let block = Block::default().borders(Borders::ALL).title("Commit Move");
            let moves: Vec<Span> = Move::ALL
                .iter()
                .flat_map(|mv| {
                    let style = if *mv == cs.mv {
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
                    } else {
                        Style::default()
                    };
                    [Span::styled(format!(" {} ", move_label(*mv)), style), Span::raw(" ")]
                })
                .collect();
            let mut lines = vec![
                Line::from(moves),
                Line::from(""),
                Line::from(format!("Secret: {}", cs.secret)),
                Line::from(""),
                Line::from("←/→ move | type secret | Tab random | Enter=commit Esc=cancel"),
            ];
            if let Some(hint) = cs.hint {
                lines.push(Line::styled(hint, Style::default().fg(Color::Red)));
            }
            let inner = block.inner(area);
            f.render_widget(Clear, area);
            f.render_widget(block, area);
            f.render_widget(Paragraph::new(lines), inner);
            let cursor_x = inner.x + ("Secret: ".width() + cs.secret.width()) as u16;
            f.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y + 2));
        }
        Mode::OpenGameModal(os) => {
            let area = centered_rect(60, 30, f.area());
            let block = Block::default().borders(Borders::ALL).title("Open Game");
            let mut lines = vec![
                Line::from("Contract address:"),
                Line::from(os.input.clone()),
                Line::from(""),
                Line::from("Enter=open Esc=cancel"),
            ];
            if let Some(error) = &os.error {
                lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
            }
            let inner = block.inner(area);
            f.render_widget(Clear, area);
            f.render_widget(block, area);
            f.render_widget(Paragraph::new(lines), inner);
            let cursor_x = inner.x + os.input.width() as u16;
            f.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y + 1));
        }
        Mode::ForfeitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Forfeit");
            let p = Paragraph::new("Forfeit the game and lose your bet? (Y/N)")
                .wrap(Wrap { trim: true });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Alert(message) => {
            let area = centered_rect(60, 30, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title("Alert");
            let p = Paragraph::new(vec![
                Line::from(message.clone()),
                Line::from(""),
                Line::from("Enter/Esc to dismiss"),
            ])
            .wrap(Wrap { trim: false });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
