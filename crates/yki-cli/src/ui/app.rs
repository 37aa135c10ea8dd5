use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use gemini_client::{ContentGenerationFailure, ContentGenerator};
use ratatui::{Terminal, backend::CrosstermBackend};
use speech_player::worker::{PlayerEvent, PlayerHandle};
use yki_types::session::{ExamPhase, ExamSession, SubmitOutcome};
use yki_types::{FullTest, PlaybackStatus, Question, TestLevel, TestPart};

use super::render;

const MAX_LOG_LINES: usize = 500;

/// Result of one content generation run.
pub(crate) struct Generated {
    level: TestLevel,
    result: Result<FullTest, ContentGenerationFailure>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Continue,
    Quit,
}

/// Launch the TUI, spawn the generation thread, and drive the event loop.
pub(crate) fn run_tui(
    content: Arc<dyn ContentGenerator>,
    player: PlayerHandle,
    player_events: Receiver<PlayerEvent>,
    level: Option<TestLevel>,
    log_rx: Receiver<String>,
) -> Result<()> {
    let (gen_tx, gen_req_rx) = unbounded::<TestLevel>();
    let (gen_done_tx, gen_rx) = unbounded::<Generated>();
    std::thread::spawn(move || {
        while let Ok(level) = gen_req_rx.recv() {
            let result = content.generate_test(level);
            if let Err(e) = &result {
                tracing::warn!(level = %level, error = %e, "test generation failed");
            }
            if gen_done_tx.send(Generated { level, result }).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(player.clone(), gen_tx, gen_rx, log_rx);
    if let Some(level) = level {
        app.start_level(level);
    }

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app, &player_events);
    player.shutdown();

    restore_terminal(&mut term)?;
    result
}

/// In-memory UI state for rendering + interaction.
pub(crate) struct App {
    pub(crate) session: ExamSession,
    /// Highlighted entry on the level selection screen.
    pub(crate) level_cursor: usize,
    /// Highlighted question (multiple-choice parts) or task (writing, speaking).
    pub(crate) item_cursor: usize,
    /// Keystrokes go into the selected writing answer.
    pub(crate) editing: bool,
    pub(crate) playback: PlaybackStatus,
    /// Listening task whose script was last sent to the player.
    pub(crate) playing_task: Option<usize>,
    pub(crate) status: String,

    pub(crate) logs_open: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) logs_scroll: usize,

    player: PlayerHandle,
    gen_tx: Sender<TestLevel>,
    gen_rx: Receiver<Generated>,
    log_rx: Receiver<String>,
}

impl App {
    pub(crate) fn new(
        player: PlayerHandle,
        gen_tx: Sender<TestLevel>,
        gen_rx: Receiver<Generated>,
        log_rx: Receiver<String>,
    ) -> Self {
        Self {
            session: ExamSession::new(),
            level_cursor: 0,
            item_cursor: 0,
            editing: false,
            playback: PlaybackStatus::default(),
            playing_task: None,
            status: "Valitse taso".into(),
            logs_open: false,
            logs: VecDeque::new(),
            logs_scroll: 0,
            player,
            gen_tx,
            gen_rx,
            log_rx,
        }
    }

    pub(crate) fn start_level(&mut self, level: TestLevel) {
        if !self.session.begin(level) {
            return;
        }
        self.item_cursor = 0;
        self.editing = false;
        if self.gen_tx.send(level).is_err() {
            self.session.fail("Virhe kokeen luomisessa.");
            return;
        }
        self.status = format!("Luodaan {} koetta...", level.as_str());
    }

    pub(crate) fn drain_generation(&mut self) {
        while let Ok(done) = self.gen_rx.try_recv() {
            if self.session.phase() != &ExamPhase::Generating(done.level) {
                tracing::debug!(level = %done.level, "stale generation result dropped");
                continue;
            }
            match done.result {
                Ok(test) => {
                    self.session.load(test);
                    self.item_cursor = 0;
                    self.status = "Koe valmis. Onnea!".into();
                }
                Err(e) => {
                    self.session.fail(e.user_notice());
                    self.status = "Valitse taso".into();
                }
            }
        }
    }

    pub(crate) fn apply_player_event(&mut self, ev: PlayerEvent) {
        match ev {
            PlayerEvent::Status(status) => self.playback = status,
            PlayerEvent::Failed { notice, .. } => self.status = notice,
        }
    }

    pub(crate) fn drain_logs(&mut self) {
        while let Ok(line) = self.log_rx.try_recv() {
            self.logs.push_back(line);
            if self.logs.len() > MAX_LOG_LINES {
                self.logs.pop_front();
            }
        }
    }

    fn toggle_logs(&mut self) {
        self.logs_open = !self.logs_open;
        self.logs_scroll = 0;
    }

    /// Number of selectable rows in the active part.
    pub(crate) fn item_count(&self) -> usize {
        let Some(test) = self.session.test() else {
            return 0;
        };
        let part = self.session.active_part();
        if part.is_multiple_choice() {
            test.questions(part).len()
        } else {
            test.task_count(part)
        }
    }

    /// Selected question with the index of the task it belongs to.
    pub(crate) fn current_question(&self) -> Option<(usize, &Question)> {
        let test = self.session.test()?;
        question_rows(test, self.session.active_part())
            .into_iter()
            .nth(self.item_cursor)
    }

    fn move_cursor(&mut self, down: bool) {
        let count = self.item_count();
        if count == 0 {
            return;
        }
        self.item_cursor = if down {
            (self.item_cursor + 1).min(count - 1)
        } else {
            self.item_cursor.saturating_sub(1)
        };
    }

    fn choose_option(&mut self, index: usize) {
        let part = self.session.active_part();
        let Some((_, question)) = self.current_question() else {
            return;
        };
        let Some(option) = question.options().get(index).cloned() else {
            return;
        };
        let id = question.id.clone();
        self.session.choose(part, &id, &option);
    }

    /// Listening task the cursor is in.
    fn current_listening_task(&self) -> Option<usize> {
        if self.session.active_part() != TestPart::Listening {
            return None;
        }
        let test = self.session.test()?;
        if test.listening.is_empty() {
            return None;
        }
        Some(self.current_question().map(|(task, _)| task).unwrap_or(0))
    }

    /// Play/stop control for the selected listening task.
    pub(crate) fn toggle_listening(&mut self) {
        let Some(task) = self.current_listening_task() else {
            return;
        };
        let Some(text) = self
            .session
            .test()
            .and_then(|t| t.listening.get(task))
            .map(|t| t.audio_prompt.clone())
        else {
            return;
        };
        if self.playback.is_busy() && self.playing_task != Some(task) {
            self.player.play(text);
        } else {
            self.player.toggle(text);
        }
        self.playing_task = Some(task);
    }

    fn stop_audio(&mut self) {
        if self.playback.is_busy() {
            self.player.stop();
        }
    }

    fn change_part(&mut self, part: Option<TestPart>, forward: bool) {
        let moved = match part {
            Some(part) if part != self.session.active_part() => {
                self.session.select_part(part);
                true
            }
            Some(_) => false,
            None if forward => self.session.next_part(),
            None => self.session.prev_part(),
        };
        if moved {
            self.stop_audio();
            self.item_cursor = 0;
            self.editing = false;
        }
    }

    fn submit(&mut self) {
        match self.session.submit() {
            SubmitOutcome::Submitted => {
                self.editing = false;
                self.status = "Vastaukset palautettu. Katso oikeat vastaukset.".into();
            }
            SubmitOutcome::Restarted => {
                self.stop_audio();
                self.item_cursor = 0;
                self.playing_task = None;
                self.status = "Valitse taso".into();
            }
            SubmitOutcome::Ignored => {}
        }
    }

    fn edit_writing(&mut self, key: KeyCode) {
        let index = self.item_cursor;
        let Some(mut text) = self.session.answers().writing.get(index).cloned() else {
            self.editing = false;
            return;
        };
        match key {
            KeyCode::Esc => {
                self.editing = false;
                return;
            }
            KeyCode::Enter => text.push('\n'),
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Char(c) => text.push(c),
            _ => return,
        }
        if !self.session.write(index, text) {
            self.editing = false;
        }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return KeyAction::Quit;
        }
        if self.logs_open {
            match key.code {
                KeyCode::Esc | KeyCode::Char('l') => self.toggle_logs(),
                KeyCode::Up => {
                    self.logs_scroll = (self.logs_scroll + 1).min(self.logs.len());
                }
                KeyCode::Down => self.logs_scroll = self.logs_scroll.saturating_sub(1),
                KeyCode::Char('q') => return KeyAction::Quit,
                _ => {}
            }
            return KeyAction::Continue;
        }
        if self.editing {
            self.edit_writing(key.code);
            return KeyAction::Continue;
        }
        if self.session.notice().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.session.dismiss_notice();
            }
            return KeyAction::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return KeyAction::Quit,
            KeyCode::Char('l') => self.toggle_logs(),
            _ => match self.session.phase().clone() {
                ExamPhase::SelectingLevel => self.handle_level_key(key.code),
                ExamPhase::Generating(_) => {}
                ExamPhase::InProgress => self.handle_exam_key(key.code),
            },
        }
        KeyAction::Continue
    }

    fn handle_level_key(&mut self, code: KeyCode) {
        let count = TestLevel::ALL.len();
        match code {
            KeyCode::Up => self.level_cursor = self.level_cursor.saturating_sub(1),
            KeyCode::Down => self.level_cursor = (self.level_cursor + 1).min(count - 1),
            KeyCode::Char('1') => self.start_level(TestLevel::Perustaso),
            KeyCode::Char('2') => self.start_level(TestLevel::Keskitaso),
            KeyCode::Enter => {
                if let Some(level) = TestLevel::ALL.get(self.level_cursor).copied() {
                    self.start_level(level);
                }
            }
            _ => {}
        }
    }

    fn handle_exam_key(&mut self, code: KeyCode) {
        let part = self.session.active_part();
        match code {
            KeyCode::Tab | KeyCode::Right => self.change_part(None, true),
            KeyCode::BackTab | KeyCode::Left => self.change_part(None, false),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.change_part(TestPart::ORDER.get(idx).copied(), true);
            }
            KeyCode::Up => self.move_cursor(false),
            KeyCode::Down => self.move_cursor(true),
            KeyCode::Char(c @ 'a'..='d') if part.is_multiple_choice() => {
                self.choose_option(c as usize - 'a' as usize);
            }
            KeyCode::Char('p') | KeyCode::Char(' ') if part == TestPart::Listening => {
                self.toggle_listening();
            }
            KeyCode::Enter if part == TestPart::Writing && !self.session.is_submitted() => {
                if self.item_cursor < self.item_count() {
                    self.editing = true;
                }
            }
            KeyCode::Char('s') => self.submit(),
            _ => {}
        }
    }
}

/// Questions of a multiple-choice part, each tagged with its task index.
pub(crate) fn question_rows(test: &FullTest, part: TestPart) -> Vec<(usize, &Question)> {
    match part {
        TestPart::Reading => test
            .reading
            .iter()
            .enumerate()
            .flat_map(|(i, t)| t.questions.iter().map(move |q| (i, q)))
            .collect(),
        TestPart::Listening => test
            .listening
            .iter()
            .enumerate()
            .flat_map(|(i, t)| t.questions.iter().map(move |q| (i, q)))
            .collect(),
        TestPart::Writing | TestPart::Speaking => Vec::new(),
    }
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    player_events: &Receiver<PlayerEvent>,
) -> Result<()> {
    let tick = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(ev) = player_events.try_recv() {
            app.apply_player_event(ev);
        }
        app.drain_generation();
        app.drain_logs();
        terminal.draw(|f| render::draw(f, app))?;

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                if k.kind == KeyEventKind::Press && app.handle_key(k) == KeyAction::Quit {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}
