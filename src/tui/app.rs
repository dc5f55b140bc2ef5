//! TUI application state and main event loop

use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::time;
use tokio_stream::wrappers::WatchStream;

use super::compose::ComposeState;
use super::debug_log::DebugLogState;
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::ui;
use crate::api::client::ChatClient;
use crate::config::Config;
use crate::engine::{Phase, Snapshot, SyncEngine, SyncSettings};
use crate::session::Identity;

/// How often the screen is redrawn without input (picks up new log lines).
const IDLE_REDRAW_MS: u64 = 250;

/// Lines moved per PageUp/PageDown.
const PAGE_LINES: usize = 10;

/// Something the event loop must do on the app's behalf.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Hand the text to the sync engine.
    Send(String),
}

/// Application state
pub struct App {
    pub should_exit: bool,
    /// Latest copy of the engine's view.
    pub snapshot: Snapshot,
    pub identity: Identity,
    /// Store address shown in the status bar.
    pub store: String,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub debug_log: DebugLogState,
}

impl App {
    pub fn new(identity: Identity, store: String, log_buffer: LogBuffer) -> Self {
        Self {
            should_exit: false,
            snapshot: Snapshot {
                phase: Phase::Loading,
                messages: Vec::new(),
                last_error: None,
            },
            identity,
            store,
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            debug_log: DebugLogState::new(log_buffer),
        }
    }

    /// Whether the compose box is still asking for a username.
    pub fn needs_name(&self) -> bool {
        !self.identity.is_set()
    }

    /// Handle input events
    pub fn handle_event(&mut self, event: Event) -> Option<Action> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            // Resize is picked up by the next draw.
            _ => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_exit = true,
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Esc => self.should_exit = true,
            KeyCode::F(2) => self.debug_log.toggle(),
            KeyCode::Enter => return self.submit(),
            KeyCode::Char(c) => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Up => self.messages.scroll_up(1),
            KeyCode::Down => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.messages.scroll_down(PAGE_LINES),
            _ => {}
        }
        None
    }

    /// Enter: the first accepted line names the user, later ones are sent.
    fn submit(&mut self) -> Option<Action> {
        let text = self.compose.take()?;
        if self.needs_name() {
            self.identity.set(&text);
            return None;
        }
        self.messages.follow();
        Some(Action::Send(text))
    }

    /// Render the UI
    pub fn render(&self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }
}

/// Run an interactive session against the configured store.
pub async fn run(config: &Config, user: Option<&str>, log_buffer: LogBuffer) -> Result<()> {
    let identity = Identity::new();
    if let Some(name) = user {
        identity.set(name);
    }

    let client = ChatClient::new(config)?;
    let engine = SyncEngine::new(client, identity.clone(), SyncSettings::from(config));
    let mut app = App::new(identity, config.base_url.clone(), log_buffer);

    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    engine.start();
    let result = run_app(&mut terminal, &mut app, &engine).await;
    engine.stop().await;
    ratatui::restore();

    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    engine: &SyncEngine<ChatClient>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut updates = WatchStream::new(engine.subscribe());
    let mut idle = time::interval(Duration::from_millis(IDLE_REDRAW_MS));

    while !app.should_exit {
        app.snapshot = engine.snapshot();
        app.debug_log.refresh();
        terminal
            .draw(|frame| app.render(frame))
            .context("Failed to draw terminal")?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if let Some(Action::Send(text)) = app.handle_event(event) {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            engine.submit(&text).await;
                        });
                    }
                }
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => app.should_exit = true,
            },
            Some(_) = updates.next() => {}
            _ = idle.tick() => {}
        }
    }

    Ok(())
}
