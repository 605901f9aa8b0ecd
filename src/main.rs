mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use keydrill::{
    config::{Config, ConfigStore, FileConfigStore},
    curriculum::{Curriculum, Level, PlanParams},
    error_freq::ErrorFrequencyMap,
    history::{HistoryDb, LessonRecord},
    keystroke::{self, Applied},
    plan::{BuiltinPlanSource, HttpPlanSource, PlanFetcher, PlanSource},
    practice::{HttpPracticeSource, PracticeSource, StaticPracticeSource},
    progression::{self, ProgressionController, ProgressionState},
    rate_limit::FixedWindowRateLimiter,
    report,
    runtime::{AppEvent, CrosstermEventSource, Runner},
    scoring::{compute_stats, Stats},
    session::Session,
    storage::{self, keys, FileKvStore, KvStore},
    app_dirs::AppDirs,
};

const TICK_RATE_MS: u64 = 100;
/// Lesson attempts considered when deriving the level from history.
const RECENT_ATTEMPTS: u32 = 10;

/// terminal typing tutor with generated lesson plans and targeted drills
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing tutor that works through a generated lesson plan, tracks your per-character mistakes, and builds targeted practice drills from them."
)]
pub struct Cli {
    /// skill level for the lesson plan (defaults to your recent average wpm)
    #[clap(short = 'l', long, value_enum)]
    level: Option<CliLevel>,

    /// discard any saved plan and request a fresh one
    #[clap(long)]
    fresh: bool,

    /// skip the plan generator and use the built-in course
    #[clap(long)]
    offline: bool,

    /// override the plan generator endpoint
    #[clap(long)]
    plan_url: Option<String>,

    /// override the practice generator endpoint
    #[clap(long)]
    practice_url: Option<String>,

    /// write lesson history as CSV to the given path and exit
    #[clap(long)]
    export_history: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum CliLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl From<CliLevel> for Level {
    fn from(level: CliLevel) -> Self {
        match level {
            CliLevel::Beginner => Level::Beginner,
            CliLevel::Intermediate => Level::Intermediate,
            CliLevel::Advanced => Level::Advanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Loading,
    Typing,
    Results,
    Complete,
    Error(String),
}

pub struct App {
    pub config: Config,
    pub controller: Option<ProgressionController>,
    pub session: Option<Session>,
    pub freq: ErrorFrequencyMap,
    pub stats: Stats,
    pub screen: Screen,
    pub notice: Option<String>,
    store: Box<dyn KvStore>,
    history: Option<HistoryDb>,
    fetcher: PlanFetcher,
    limiter: Arc<Mutex<FixedWindowRateLimiter>>,
    offline: bool,
    practice_mode: bool,
}

impl App {
    fn new(cli: &Cli, config: Config, store: Box<dyn KvStore>, history: Option<HistoryDb>) -> Self {
        let limiter = Arc::new(Mutex::new(FixedWindowRateLimiter::new(
            config.rate_limit_window(),
            config.rate_limit_max_requests,
        )));

        let mut app = Self {
            config,
            controller: None,
            session: None,
            freq: ErrorFrequencyMap::new(),
            stats: Stats::default(),
            screen: Screen::Loading,
            notice: None,
            store,
            history,
            fetcher: PlanFetcher::new(),
            limiter,
            offline: cli.offline,
            practice_mode: false,
        };

        let params = app.initial_params(cli);

        if cli.fresh {
            ProgressionController::reset(app.store.as_ref());
        } else if let Some(saved) = progression::load_saved_plan(app.store.as_ref()) {
            // without an explicit level flag, a saved plan in progress
            // is still the plan being answered, even if the history-
            // derived average has since crossed a level boundary
            let requested = match cli.level {
                Some(_) => params.clone(),
                None => saved.params.clone(),
            };
            if let Some(controller) =
                ProgressionController::restore(saved, &requested, app.config.level_buckets)
            {
                app.install_controller(controller);
                return app;
            }
        }

        app.start_plan_fetch(params);
        app
    }

    /// Level and wpm for the plan request: an explicit flag wins, otherwise
    /// recent history decides, otherwise beginner.
    fn initial_params(&self, cli: &Cli) -> PlanParams {
        let current_wpm = self
            .history
            .as_ref()
            .and_then(|db| db.recent_average_wpm(RECENT_ATTEMPTS).ok().flatten())
            .unwrap_or(0.0);

        let level = match cli.level {
            Some(level) => level.into(),
            None => Level::from_wpm(current_wpm, &self.config.level_buckets),
        };

        PlanParams::Level { level, current_wpm }
    }

    fn plan_source(&self) -> Arc<dyn PlanSource> {
        if self.offline {
            return Arc::new(BuiltinPlanSource);
        }
        match HttpPlanSource::new(
            &self.config.plan_endpoint,
            self.limiter.clone(),
            &self.config.client_id,
        ) {
            Ok(source) => Arc::new(source),
            Err(_) => Arc::new(BuiltinPlanSource),
        }
    }

    fn start_plan_fetch(&mut self, params: PlanParams) {
        self.screen = Screen::Loading;
        self.fetcher.request(self.plan_source(), params);
    }

    fn install_controller(&mut self, controller: ProgressionController) {
        self.session = controller.session_for_current();
        self.screen = match controller.state() {
            ProgressionState::Active { .. } => Screen::Typing,
            ProgressionState::Complete => Screen::Complete,
            ProgressionState::Error(message) => Screen::Error(message.clone()),
            ProgressionState::Loading => Screen::Loading,
        };
        self.stats = Stats::default();
        self.practice_mode = false;
        self.controller = Some(controller);
    }

    fn on_tick(&mut self) {
        if let Some(fetch) = self.fetcher.try_latest() {
            match fetch.result {
                Ok(curriculum) => {
                    let controller = ProgressionController::new(
                        fetch.params,
                        curriculum,
                        self.config.level_buckets,
                    );
                    controller.persist(self.store.as_ref());
                    self.install_controller(controller);
                }
                Err(e) => {
                    // no retry: fall back to the built-in course
                    self.notice = Some(format!("plan generator unavailable ({e})"));
                    let controller = ProgressionController::new(
                        fetch.params,
                        Curriculum::builtin(),
                        self.config.level_buckets,
                    );
                    self.install_controller(controller);
                }
            }
        }

        if self.screen == Screen::Typing {
            if let Some(session) = &self.session {
                if session.has_started() {
                    self.stats = compute_stats(session, SystemTime::now());
                }
            }
        }
    }

    fn on_char(&mut self, c: char) {
        if self.screen != Screen::Typing {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let applied = keystroke::apply(session, c, &mut self.freq);
        if applied.completed() {
            self.finish_lesson();
        }
    }

    fn on_paste(&mut self, text: &str) {
        if self.screen != Screen::Typing {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        // a paste is processed as individual keystrokes
        let applied = keystroke::apply_str(session, text, &mut self.freq);
        if applied == Applied::Completed {
            self.finish_lesson();
        }
    }

    fn finish_lesson(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        self.stats = compute_stats(session, SystemTime::now());

        if !self.practice_mode {
            self.record_history();
        }
        self.screen = Screen::Results;
    }

    fn record_history(&mut self) {
        let (Some(db), Some(controller), Some(session)) =
            (&self.history, &self.controller, &self.session)
        else {
            return;
        };
        let Some(lesson) = controller.current_lesson() else {
            return;
        };
        let snapshot = controller.snapshot();
        let module = controller
            .curriculum()
            .modules
            .get(snapshot.current_module_index)
            .map(|m| m.name.clone())
            .unwrap_or_default();

        let record = LessonRecord {
            module,
            lesson: lesson.title.clone(),
            wpm: self.stats.wpm,
            accuracy: self.stats.accuracy,
            errors: session.error_count as u32,
            policy: session.policy,
            timestamp: chrono::Local::now(),
        };
        if db.record_lesson(&record).is_err() {
            self.notice = Some("could not save lesson history".to_string());
        }
    }

    /// Advance past the finished lesson, or leave a practice drill.
    fn next_lesson(&mut self) {
        if self.practice_mode {
            self.practice_mode = false;
        } else if let Some(controller) = self.controller.as_mut() {
            if let Err(e) = controller.advance(self.store.as_ref()) {
                self.screen = Screen::Error(e.to_string());
                return;
            }
        }

        let Some(controller) = &self.controller else {
            return;
        };
        match controller.state() {
            ProgressionState::Complete => {
                self.session = None;
                self.screen = Screen::Complete;
            }
            ProgressionState::Active { .. } => {
                self.session = controller.session_for_current();
                self.stats = Stats::default();
                self.screen = Screen::Typing;
            }
            ProgressionState::Error(message) => {
                self.screen = Screen::Error(message.clone());
            }
            ProgressionState::Loading => {}
        }
    }

    fn retry_lesson(&mut self) {
        if self.practice_mode {
            self.start_practice();
            return;
        }
        if let Some(controller) = &self.controller {
            self.session = controller.session_for_current();
            self.stats = Stats::default();
            self.screen = Screen::Typing;
        }
    }

    fn practice_source(&self) -> Box<dyn PracticeSource> {
        if self.config.remote_practice && !self.offline {
            if let Ok(source) = HttpPracticeSource::new(
                &self.config.practice_endpoint,
                self.limiter.clone(),
                &self.config.client_id,
            ) {
                return Box::new(source);
            }
        }
        Box::new(StaticPracticeSource::new())
    }

    /// Start a drill built from the accumulated error statistics. Drills
    /// use the block-on-error policy and do not count as lessons.
    fn start_practice(&mut self) {
        let practice = match self.practice_source().generate(&self.freq) {
            Ok(practice) => practice,
            Err(e) => {
                self.notice = Some(format!("practice generator unavailable ({e})"));
                match StaticPracticeSource::new().generate(&self.freq) {
                    Ok(practice) => practice,
                    Err(_) => return,
                }
            }
        };

        let _ = storage::put_json(self.store.as_ref(), keys::PRACTICE_TEXT, &practice);

        self.session = Some(Session::new(
            &practice.text,
            keydrill::session::MismatchPolicy::Block,
        ));
        self.stats = Stats::default();
        self.practice_mode = true;
        self.screen = Screen::Typing;
    }

    /// Returns true when the app should exit.
    fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Esc {
            return true;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match self.screen {
            Screen::Typing => {
                if let KeyCode::Char(c) = key.code {
                    self.on_char(c);
                }
            }
            Screen::Results => match key.code {
                KeyCode::Char('n') => self.next_lesson(),
                KeyCode::Char('r') => self.retry_lesson(),
                KeyCode::Char('p') => self.start_practice(),
                _ => {}
            },
            Screen::Complete => {
                if key.code == KeyCode::Char('p') {
                    self.start_practice();
                }
            }
            Screen::Loading | Screen::Error(_) => {}
        }

        false
    }

    #[cfg(test)]
    pub fn for_render(
        session: Session,
        freq: ErrorFrequencyMap,
        stats: Stats,
        screen: Screen,
    ) -> Self {
        let config = Config::default();
        let limiter = Arc::new(Mutex::new(FixedWindowRateLimiter::for_generators()));
        Self {
            config,
            controller: None,
            session: Some(session),
            freq,
            stats,
            screen,
            notice: None,
            store: Box::new(keydrill::storage::MemoryKvStore::new()),
            history: None,
            fetcher: PlanFetcher::new(),
            limiter,
            offline: true,
            practice_mode: false,
        }
    }
}

fn export_history(path: &PathBuf) -> Result<(), Box<dyn Error>> {
    let db = HistoryDb::new()?;
    let records = db.all_records()?;
    report::export(path, &records)?;
    println!("wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = &cli.export_history {
        return export_history(path);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut config = FileConfigStore::new().load();
    if let Some(url) = &cli.plan_url {
        config.plan_endpoint = url.clone();
    }
    if let Some(url) = &cli.practice_url {
        config.practice_endpoint = url.clone();
    }

    let store_dir = AppDirs::store_dir().unwrap_or_else(|| PathBuf::from(".keydrill"));
    let store = Box::new(FileKvStore::new(store_dir));
    let history = HistoryDb::new().ok();

    let mut app = App::new(&cli, config, store, history);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource, Duration::from_millis(TICK_RATE_MS));
    let result = run_app(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<CrosstermEventSource>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Paste(text) => app.on_paste(&text),
            AppEvent::Key(key) => {
                if app.on_key(key) {
                    break;
                }
            }
        }
    }

    Ok(())
}
