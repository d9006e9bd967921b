use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{Receiver, unbounded};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::Config;
use crate::console::{Console, ConsoleReply, DataSource, RefreshKind};
use crate::controller::{LinesController, ProcessesController, TabController};
use crate::process::mode_of;
use crate::search::FilterState;
use crate::status::{Tab, TabEvent, TabKind, TabView};
use crate::tree::ProcessTree;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AppMode {
    Normal,
    Search,
}

/// Owns one controller per tab and the console, and routes messages between
/// them on the control thread.
pub struct AppContext {
    profiles: LinesController<Tab>,
    processes: ProcessesController<Tab>,
    logs: LinesController<Tab>,
    console: Console,
    tab_events: Receiver<TabEvent>,

    current: TabKind,
    mode: AppMode,
    search_active: bool,
    show_context: bool,
    cursors: [usize; 3],

    refresh_rate: Option<Duration>,
    last_refresh: Instant,
    /// Requests sent to the console and not yet answered, per kind.
    in_flight: HashMap<RefreshKind, usize>,
}

impl AppContext {
    pub fn new<S: DataSource>(config: &Config, source: S) -> Self {
        let (event_tx, event_rx) = unbounded();
        let filter = FilterState {
            text: config.initial_filter.clone().unwrap_or_default(),
            options: config.search_options,
            ..FilterState::default()
        };

        let profiles = LinesController::new(
            Tab::new(TabKind::Profiles, filter.clone()),
            "profiles",
            true,
            event_tx.clone(),
        );
        let processes = ProcessesController::new(
            Tab::new(TabKind::Processes, filter.clone()),
            ProcessTree::new(),
            event_tx.clone(),
        );
        let logs = LinesController::new(Tab::new(TabKind::Logs, filter), "logs", false, event_tx);

        let mut app = Self {
            profiles,
            processes,
            logs,
            console: Console::spawn(source),
            tab_events: event_rx,
            current: config.initial_tab,
            mode: AppMode::Normal,
            search_active: false,
            show_context: true,
            cursors: [0; 3],
            refresh_rate: (config.refresh_rate_ms > 0)
                .then(|| Duration::from_millis(config.refresh_rate_ms)),
            last_refresh: Instant::now(),
            in_flight: HashMap::new(),
        };

        app.switch_tab(config.initial_tab);
        if config.initial_filter.is_some() {
            app.toggle_search();
            app.mode = AppMode::Normal;
        }
        app
    }

    pub fn current_tab(&self) -> TabKind {
        self.current
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn search_active(&self) -> bool {
        self.search_active
    }

    pub fn show_context(&self) -> bool {
        self.show_context
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn processes(&self) -> &ProcessesController<Tab> {
        &self.processes
    }

    pub fn profiles(&self) -> &LinesController<Tab> {
        &self.profiles
    }

    pub fn logs(&self) -> &LinesController<Tab> {
        &self.logs
    }

    pub fn tab(&self, kind: TabKind) -> &Tab {
        match kind {
            TabKind::Profiles => self.profiles.get_tab(),
            TabKind::Processes => self.processes.get_tab(),
            TabKind::Logs => self.logs.get_tab(),
        }
    }

    pub fn tab_mut(&mut self, kind: TabKind) -> &mut Tab {
        match kind {
            TabKind::Profiles => self.profiles.get_tab_mut(),
            TabKind::Processes => self.processes.get_tab_mut(),
            TabKind::Logs => self.logs.get_tab_mut(),
        }
    }

    fn controller_mut(&mut self, kind: TabKind) -> &mut dyn TabController {
        match kind {
            TabKind::Profiles => &mut self.profiles,
            TabKind::Processes => &mut self.processes,
            TabKind::Logs => &mut self.logs,
        }
    }

    /// Show `kind` and ask the console for fresh data for it.
    pub fn switch_tab(&mut self, kind: TabKind) {
        self.current = kind;
        self.request_refresh();
    }

    pub fn request_refresh(&mut self) {
        let kind = self.current.refresh_kind();
        self.console.send_refresh_message(kind);
        *self.in_flight.entry(kind).or_default() += 1;
        self.last_refresh = Instant::now();
    }

    /// True while the current tab waits for the console.
    pub fn refreshing(&self) -> bool {
        self.in_flight
            .get(&self.current.refresh_kind())
            .is_some_and(|count| *count > 0)
    }

    fn reply_received(&mut self, kind: RefreshKind) {
        if let Some(count) = self.in_flight.get_mut(&kind) {
            *count = count.saturating_sub(1);
        }
    }

    /// Flip the profile under the cursor between enforce and complain mode.
    pub fn cycle_profile_mode(&mut self) {
        if self.current != TabKind::Profiles {
            return;
        }
        let cursor = self.cursor(TabKind::Profiles);
        let Some(line) = self.profiles.rows().visible_rows().nth(cursor) else {
            return;
        };
        let (Some(old_status), Some(open)) = (mode_of(line), line.rfind('(')) else {
            log::debug!("profile line {line:?} has no mode");
            return;
        };
        let new_status = match old_status {
            "enforce" => "complain",
            "complain" => "enforce",
            other => {
                log::debug!("not switching a profile in {other} mode");
                return;
            }
        };
        let profile = line[..open].trim_end();
        self.console
            .send_change_profile_status_message(profile, old_status, new_status);
        *self.in_flight.entry(RefreshKind::Profile).or_default() += 1;
    }

    pub fn toggle_search(&mut self) {
        self.search_active = !self.search_active;
        let active = self.search_active;
        for kind in TabKind::ALL {
            let tab = self.tab_mut(kind);
            if active {
                tab.show_searchbar();
            } else {
                tab.hide_searchbar();
            }
        }
        self.mode = if active {
            AppMode::Search
        } else {
            AppMode::Normal
        };
    }

    pub fn handle_reply(&mut self, reply: ConsoleReply) {
        match reply {
            ConsoleReply::Data { kind, text } => {
                self.reply_received(kind);
                let tab = TabKind::from_refresh_kind(kind);
                self.controller_mut(tab).ingest(&text);
                self.clamp_cursor(tab);
            }
            ConsoleReply::Failed { kind, error } => {
                self.reply_received(kind);
                log::warn!("refresh of {kind:?} failed: {error}");
                let tab = TabKind::from_refresh_kind(kind);
                self.controller_mut(tab)
                    .view_mut()
                    .set_status_label_text(&format!(" refresh failed: {error}"));
            }
        }
    }

    pub fn handle_tab_event(&mut self, event: TabEvent) {
        match event {
            TabEvent::RefreshRequested(kind) => {
                let controller = self.controller_mut(kind);
                controller.refresh();
                log::trace!("{} tab refiltered:{}", kind.title(), controller.view().status_label());
                self.clamp_cursor(kind);
            }
        }
    }

    /// Drain console replies and tab events without blocking.
    pub fn pump(&mut self) {
        while let Some(reply) = self.console.try_recv() {
            self.handle_reply(reply);
        }
        while let Ok(event) = self.tab_events.try_recv() {
            self.handle_tab_event(event);
        }
    }

    /// Periodic refresh of the current tab. Skipped while an earlier
    /// request for it is unanswered.
    pub fn tick(&mut self, now: Instant) {
        let Some(rate) = self.refresh_rate else {
            return;
        };
        if !self.refreshing() && now.duration_since(self.last_refresh) >= rate {
            self.request_refresh();
        }
    }

    pub fn row_count(&self, kind: TabKind) -> usize {
        match kind {
            TabKind::Profiles => self.profiles.rows().visible_rows().count(),
            TabKind::Processes => self.processes.rows().rows(self.show_context).len(),
            TabKind::Logs => self.logs.rows().visible_rows().count(),
        }
    }

    pub fn cursor(&self, kind: TabKind) -> usize {
        self.cursors[kind.index()]
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let count = self.row_count(self.current);
        let cursor = &mut self.cursors[self.current.index()];
        if count == 0 {
            *cursor = 0;
            return;
        }
        let next = cursor.saturating_add_signed(delta);
        *cursor = next.min(count - 1);
    }

    fn clamp_cursor(&mut self, kind: TabKind) {
        let count = self.row_count(kind);
        let cursor = &mut self.cursors[kind.index()];
        *cursor = (*cursor).min(count.saturating_sub(1));
    }

    pub fn toggle_selection_at_cursor(&mut self) {
        let cursor = self.cursor(self.current);
        match self.current {
            TabKind::Processes => {
                let pid = self
                    .processes
                    .rows()
                    .rows(self.show_context)
                    .get(cursor)
                    .map(|row| row.record.pid);
                if let Some(pid) = pid {
                    self.processes.rows_mut().toggle_selection(pid);
                }
            }
            TabKind::Profiles | TabKind::Logs => {
                let controller = if self.current == TabKind::Profiles {
                    &mut self.profiles
                } else {
                    &mut self.logs
                };
                let line = controller.rows().visible_rows().nth(cursor).cloned();
                if let Some(line) = line {
                    controller.rows_mut().toggle_selection(&line);
                }
            }
        }
    }

    pub fn handle_input(&mut self, event: KeyEvent) -> Result<bool> {
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return Ok(true);
        }
        if self.handle_option_keys(event) {
            return Ok(false);
        }
        let should_quit = match self.mode {
            AppMode::Search => self.handle_search_input(event)?,
            AppMode::Normal => self.handle_normal_input(event)?,
        };
        Ok(should_quit)
    }

    fn handle_option_keys(&mut self, event: KeyEvent) -> bool {
        let tab = self.tab_mut(self.current);
        match event.code {
            KeyCode::F(2) => tab.toggle_regex(),
            KeyCode::F(3) => tab.toggle_match_case(),
            KeyCode::F(4) => tab.toggle_whole_word(),
            KeyCode::F(5) => tab.toggle_fuzzy(),
            _ => return false,
        }
        true
    }

    fn handle_search_input(&mut self, event: KeyEvent) -> Result<bool> {
        match event.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.mode = AppMode::Normal;
            }
            KeyCode::Char('u') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.tab_mut(self.current).set_search_text("");
            }
            KeyCode::Backspace => {
                self.tab_mut(self.current).pop_search_char();
            }
            KeyCode::Char(c)
                if !event.modifiers.contains(KeyModifiers::CONTROL)
                    && !event.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.tab_mut(self.current).push_search_char(c);
            }
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            _ => {}
        }
        Ok(false)
    }

    fn handle_normal_input(&mut self, event: KeyEvent) -> Result<bool> {
        match event.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab => self.switch_tab(self.current.next()),
            KeyCode::BackTab => self.switch_tab(self.current.prev()),
            KeyCode::Char(c @ '1'..='3') => {
                let idx = c as usize - '1' as usize;
                self.switch_tab(TabKind::ALL[idx]);
            }
            KeyCode::Char('/') => {
                if self.search_active {
                    self.mode = AppMode::Search;
                } else {
                    self.toggle_search();
                }
            }
            KeyCode::Esc if self.search_active => self.toggle_search(),
            KeyCode::Char('e') => self.tab_mut(self.current).toggle_enforce(),
            KeyCode::Char('c') => self.tab_mut(self.current).toggle_complain(),
            KeyCode::Char('u') => self.tab_mut(self.current).toggle_unconfined(),
            KeyCode::Char('t') => {
                self.show_context = !self.show_context;
                self.clamp_cursor(TabKind::Processes);
            }
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char('m') => self.cycle_profile_mode(),
            KeyCode::Char(' ') => self.toggle_selection_at_cursor(),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::PageUp => self.move_cursor(-10),
            KeyCode::PageDown => self.move_cursor(10),
            KeyCode::Home | KeyCode::Char('g') => self.cursors[self.current.index()] = 0,
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(isize::MAX),
            _ => {}
        }
        Ok(false)
    }
}
