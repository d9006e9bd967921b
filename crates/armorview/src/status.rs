use clap::ValueEnum;
use crossbeam_channel::Sender;

use crate::console::RefreshKind;
use crate::search::{FilterState, SearchFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum TabKind {
    Profiles,
    Processes,
    Logs,
}

impl TabKind {
    pub const ALL: [TabKind; 3] = [TabKind::Profiles, TabKind::Processes, TabKind::Logs];

    pub fn title(self) -> &'static str {
        match self {
            TabKind::Profiles => "Profiles",
            TabKind::Processes => "Processes",
            TabKind::Logs => "Logs",
        }
    }

    pub fn refresh_kind(self) -> RefreshKind {
        match self {
            TabKind::Profiles => RefreshKind::Profile,
            TabKind::Processes => RefreshKind::Process,
            TabKind::Logs => RefreshKind::Logs,
        }
    }

    pub fn from_refresh_kind(kind: RefreshKind) -> Self {
        match kind {
            RefreshKind::Profile => TabKind::Profiles,
            RefreshKind::Process => TabKind::Processes,
            RefreshKind::Logs => TabKind::Logs,
        }
    }

    pub fn index(self) -> usize {
        TabKind::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(0)
    }

    pub fn next(self) -> Self {
        TabKind::ALL[(self.index() + 1) % TabKind::ALL.len()]
    }

    pub fn prev(self) -> Self {
        TabKind::ALL[(self.index() + TabKind::ALL.len() - 1) % TabKind::ALL.len()]
    }
}

/// Sent by a tab view when its filter inputs change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEvent {
    RefreshRequested(TabKind),
}

/// What a controller needs from the view of its tab.
pub trait TabView {
    fn status_label(&self) -> &str;
    fn set_status_label_text(&mut self, text: &str);
    fn show_searchbar(&mut self);
    fn hide_searchbar(&mut self);
    fn searchbar_visible(&self) -> bool;
    fn filter_state(&self) -> &FilterState;
    /// Channel the view announces filter changes on.
    fn set_refresh_sender(&mut self, sender: Sender<TabEvent>);
}

/// View model of a single "status + search" tab.
#[derive(Debug, Clone)]
pub struct Tab {
    kind: TabKind,
    status_label: String,
    searchbar_visible: bool,
    filter: FilterState,
    refresh_sender: Option<Sender<TabEvent>>,
}

impl Tab {
    pub fn new(kind: TabKind, filter: FilterState) -> Self {
        Self {
            kind,
            status_label: String::new(),
            searchbar_visible: false,
            filter,
            refresh_sender: None,
        }
    }

    pub fn search_text(&self) -> &str {
        &self.filter.text
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.filter.text = text.into();
        self.request_refresh();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.filter.text.push(c);
        self.request_refresh();
    }

    pub fn pop_search_char(&mut self) {
        if self.filter.text.pop().is_some() {
            self.request_refresh();
        }
    }

    pub fn toggle_regex(&mut self) {
        self.filter.options.use_regex = !self.filter.options.use_regex;
        self.request_refresh();
    }

    pub fn toggle_match_case(&mut self) {
        self.filter.options.match_case = !self.filter.options.match_case;
        self.request_refresh();
    }

    pub fn toggle_whole_word(&mut self) {
        self.filter.options.whole_word = !self.filter.options.whole_word;
        self.request_refresh();
    }

    pub fn toggle_fuzzy(&mut self) {
        self.filter.options.fuzzy = !self.filter.options.fuzzy;
        self.request_refresh();
    }

    pub fn toggle_enforce(&mut self) {
        self.filter.toggles.enforce = !self.filter.toggles.enforce;
        self.request_refresh();
    }

    pub fn toggle_complain(&mut self) {
        self.filter.toggles.complain = !self.filter.toggles.complain;
        self.request_refresh();
    }

    pub fn toggle_unconfined(&mut self) {
        self.filter.toggles.unconfined = !self.filter.toggles.unconfined;
        self.request_refresh();
    }

    fn request_refresh(&self) {
        if let Some(sender) = &self.refresh_sender {
            if sender.send(TabEvent::RefreshRequested(self.kind)).is_err() {
                log::debug!("{} tab: refresh receiver is gone", self.kind.title());
            }
        }
    }
}

impl TabView for Tab {
    fn status_label(&self) -> &str {
        &self.status_label
    }

    fn set_status_label_text(&mut self, text: &str) {
        self.status_label = text.to_string();
    }

    fn show_searchbar(&mut self) {
        self.searchbar_visible = true;
    }

    fn hide_searchbar(&mut self) {
        self.searchbar_visible = false;
    }

    fn searchbar_visible(&self) -> bool {
        self.searchbar_visible
    }

    fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    fn set_refresh_sender(&mut self, sender: Sender<TabEvent>) {
        self.refresh_sender = Some(sender);
    }
}

/// Plumbing shared by every tab controller: ownership of the tab view and
/// the refresh-request registration.
#[derive(Debug)]
pub struct StatusController<V> {
    tab: V,
}

impl<V: TabView> StatusController<V> {
    pub fn new(tab: V) -> Self {
        Self { tab }
    }

    pub fn get_tab(&self) -> &V {
        &self.tab
    }

    pub fn get_tab_mut(&mut self) -> &mut V {
        &mut self.tab
    }

    pub fn set_refresh_signal_handler(&mut self, sender: Sender<TabEvent>) {
        self.tab.set_refresh_sender(sender);
    }

    pub fn search_filter(&self) -> SearchFilter {
        SearchFilter::new(self.tab.filter_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_filter_changes_request_refresh() {
        let (tx, rx) = unbounded();
        let mut controller = StatusController::new(Tab::new(TabKind::Logs, FilterState::default()));
        controller.set_refresh_signal_handler(tx);

        let tab = controller.get_tab_mut();
        tab.push_search_char('a');
        tab.toggle_enforce();
        tab.pop_search_char();
        tab.pop_search_char();

        let events: Vec<TabEvent> = rx.try_iter().collect();
        assert_eq!(events, vec![TabEvent::RefreshRequested(TabKind::Logs); 3]);
        assert!(!controller.get_tab().filter_state().toggles.enforce);
    }

    #[test]
    fn test_tab_without_sender_is_quiet() {
        let mut tab = Tab::new(TabKind::Profiles, FilterState::default());
        tab.set_search_text("abc");
        assert_eq!(tab.search_text(), "abc");
    }

    #[test]
    fn test_searchbar_visibility() {
        let mut tab = Tab::new(TabKind::Processes, FilterState::default());
        assert!(!tab.searchbar_visible());
        tab.show_searchbar();
        assert!(tab.searchbar_visible());
        tab.hide_searchbar();
        assert!(!tab.searchbar_visible());
    }

    #[test]
    fn test_tab_cycling() {
        assert_eq!(TabKind::Logs.next(), TabKind::Profiles);
        assert_eq!(TabKind::Profiles.prev(), TabKind::Logs);
        assert_eq!(TabKind::Processes.refresh_kind(), RefreshKind::Process);
    }
}
