pub mod app;
pub mod ui;

use std::io;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use inference_common::video_meta::VideoMeta;
use inference_common::{CountSummary, Progress};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::presenter::Presenter;
use crate::report::Artifacts;
use app::App;

const UI_FPS: u64 = 30;
const UI_FRAME_TIME: Duration = Duration::from_millis(1000 / UI_FPS);

/// Full screen dashboard. Owns the terminal from construction until drop.
pub struct TuiPresenter {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    app: App,
    last_render: Option<Instant>,
}

impl TuiPresenter {
    pub fn new() -> Result<Self> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            app: App::new(),
            last_render: None,
        })
    }

    fn draw(&mut self) -> Result<()> {
        let app = &mut self.app;
        self.terminal.draw(|f| ui::draw(f, app))?;
        self.last_render = Some(Instant::now());
        Ok(())
    }

    /// Redraws at most `UI_FPS` times per second while counting.
    fn draw_throttled(&mut self) -> Result<()> {
        match self.last_render {
            Some(at) if at.elapsed() < UI_FRAME_TIME => Ok(()),
            _ => self.draw(),
        }
    }

    /// Drains pending key events without blocking the counting loop.
    fn check_interrupt(&mut self) -> Result<()> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if is_interrupt(&key) {
                    bail!("Interrupted");
                }
            }
        }
        Ok(())
    }

    /// Blocks on the finished dashboard until the user quits.
    fn run_until_quit(&mut self) -> Result<()> {
        loop {
            self.draw()?;

            if event::poll(UI_FRAME_TIME)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                                self.app.quit();
                            }
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                self.app.quit();
                            }
                            KeyCode::Right | KeyCode::Char('l') => self.app.next_snapshot(),
                            KeyCode::Left | KeyCode::Char('h') => self.app.prev_snapshot(),
                            _ => {}
                        }
                    }
                }
            }

            if self.app.should_quit() {
                return Ok(());
            }
        }
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && key.code == KeyCode::Char('c')
        && key.modifiers.contains(KeyModifiers::CONTROL)
}

impl Presenter for TuiPresenter {
    fn start(&mut self, video: &VideoMeta) -> Result<()> {
        self.app.start(video);
        self.draw()
    }

    fn progress(&mut self, progress: &Progress) -> Result<()> {
        self.app.update(progress);
        self.check_interrupt()?;
        self.draw_throttled()
    }

    fn render(&mut self, summary: &CountSummary, artifacts: &Artifacts) -> Result<()> {
        self.app.finish(summary, artifacts);
        self.run_until_quit()
    }

    fn error(&mut self, message: &str) -> Result<()> {
        log::error!("{message}");
        self.app.fail(message);
        self.run_until_quit()
    }
}

impl Drop for TuiPresenter {
    fn drop(&mut self) {
        // Cleanup terminal
        if let Err(e) = disable_raw_mode() {
            log::warn!("Failed to disable raw mode: {e}");
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            log::warn!("Failed to leave alternate screen: {e}");
        }
        if let Err(e) = self.terminal.show_cursor() {
            log::warn!("Failed to restore cursor: {e}");
        }
    }
}
