use crossbeam_channel::Sender;

use crate::process::{ProcessRecord, parse_line};
use crate::rows::{RowList, RowStore};
use crate::search::SearchFilter;
use crate::status::{StatusController, TabEvent, TabView};
use crate::tree::ProcessTree;

/// The ingest/refresh contract the application drives every tab through.
pub trait TabController {
    /// Replace all rows with the ones parsed from `raw_text`, then refresh.
    fn ingest(&mut self, raw_text: &str);

    /// Re-filter the current rows and update the status label. Returns the
    /// number of matching rows.
    fn refresh(&mut self) -> usize;

    fn view(&self) -> &dyn TabView;

    fn view_mut(&mut self) -> &mut dyn TabView;
}

pub struct ProcessesController<V, S = ProcessTree> {
    status: StatusController<V>,
    col_record: S,
}

impl<V, S> ProcessesController<V, S>
where
    V: TabView,
    S: RowStore<Record = ProcessRecord>,
{
    pub fn new(tab: V, col_record: S, refresh_sender: Sender<TabEvent>) -> Self {
        let mut status = StatusController::new(tab);
        status.set_refresh_signal_handler(refresh_sender);
        Self { status, col_record }
    }

    pub fn rows(&self) -> &S {
        &self.col_record
    }

    pub fn rows_mut(&mut self) -> &mut S {
        &mut self.col_record
    }

    pub fn get_tab(&self) -> &V {
        self.status.get_tab()
    }

    pub fn get_tab_mut(&mut self) -> &mut V {
        self.status.get_tab_mut()
    }

    /// Filter hook evaluated by the row store for every process.
    pub fn filter_record(filter: &SearchFilter, record: &ProcessRecord) -> bool {
        let pid = record.pid.to_string();
        filter.matches(
            &[
                record.command.as_str(),
                record.user.as_str(),
                pid.as_str(),
                record.status.as_str(),
            ],
            Some(record.status.as_str()),
        )
    }
}

impl<V, S> TabController for ProcessesController<V, S>
where
    V: TabView,
    S: RowStore<Record = ProcessRecord>,
{
    fn ingest(&mut self, raw_text: &str) {
        self.col_record.clear();

        let mut skipped = 0usize;
        for line in raw_text.lines() {
            match parse_line(line) {
                Ok(record) => self.col_record.insert(record),
                Err(err) => {
                    skipped += 1;
                    log::trace!("skipping process line: {err}");
                }
            }
        }
        log::debug!(
            "ingested {} process(es), skipped {skipped} line(s)",
            self.col_record.len()
        );
        if self.col_record.is_empty() {
            log::warn!("process listing had no parsable rows");
        }

        self.col_record.reselect_rows();
        self.refresh();
    }

    fn refresh(&mut self) -> usize {
        let filter = self.status.search_filter();
        let num_visible = self
            .col_record
            .filter(|record| Self::filter_record(&filter, record));
        self.status
            .get_tab_mut()
            .set_status_label_text(&format!(" {num_visible} matching processes"));
        num_visible
    }

    fn view(&self) -> &dyn TabView {
        self.status.get_tab()
    }

    fn view_mut(&mut self) -> &mut dyn TabView {
        self.status.get_tab_mut()
    }
}

/// One row per non-empty line. Used by the profile and log tabs.
pub struct LinesController<V> {
    status: StatusController<V>,
    rows: RowList<String>,
    noun: &'static str,
    /// Whether each line carries a `name (mode)` status for the checkboxes.
    lines_have_status: bool,
}

impl<V: TabView> LinesController<V> {
    pub fn new(
        tab: V,
        noun: &'static str,
        lines_have_status: bool,
        refresh_sender: Sender<TabEvent>,
    ) -> Self {
        let mut status = StatusController::new(tab);
        status.set_refresh_signal_handler(refresh_sender);
        Self {
            status,
            rows: RowList::new(),
            noun,
            lines_have_status,
        }
    }

    pub fn rows(&self) -> &RowList<String> {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut RowList<String> {
        &mut self.rows
    }

    pub fn get_tab(&self) -> &V {
        self.status.get_tab()
    }

    pub fn get_tab_mut(&mut self) -> &mut V {
        self.status.get_tab_mut()
    }
}

impl<V: TabView> TabController for LinesController<V> {
    fn ingest(&mut self, raw_text: &str) {
        self.rows.clear();
        for line in raw_text.lines() {
            let line = line.trim_end();
            if !line.trim().is_empty() {
                self.rows.insert(line.to_string());
            }
        }
        self.rows.reselect_rows();
        self.refresh();
    }

    fn refresh(&mut self) -> usize {
        let filter = self.status.search_filter();
        let with_status = self.lines_have_status;
        let num_visible = self.rows.filter(|line| {
            let status = with_status.then_some(line.as_str());
            filter.matches(&[line.as_str()], status)
        });
        let text = format!(" {num_visible} matching {}", self.noun);
        self.status.get_tab_mut().set_status_label_text(&text);
        num_visible
    }

    fn view(&self) -> &dyn TabView {
        self.status.get_tab()
    }

    fn view_mut(&mut self) -> &mut dyn TabView {
        self.status.get_tab_mut()
    }
}
