use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Tabs};

use crate::app::{AppContext, AppMode};
use crate::status::{TabKind, TabView};

pub mod table;

pub fn render(frame: &mut Frame<'_>, app: &AppContext) {
    let tab = app.tab(app.current_tab());
    let search_height = if tab.searchbar_visible() { 1 } else { 0 };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(search_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_header(frame, layout[0], app);
    if tab.searchbar_visible() {
        render_search_bar(frame, layout[1], app);
    }
    table::render(frame, layout[2], app);
    render_status(frame, layout[3], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &AppContext) {
    let titles: Vec<Line> = TabKind::ALL
        .iter()
        .enumerate()
        .map(|(idx, kind)| Line::from(format!("{} {}", idx + 1, kind.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.current_tab().index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn render_search_bar(frame: &mut Frame, area: Rect, app: &AppContext) {
    let tab = app.tab(app.current_tab());
    let filter = tab.filter_state();
    let editing = app.mode() == AppMode::Search;

    let flag = |on: bool, label: &'static str| {
        let style = if on {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(format!(" [{label}]"), style)
    };

    let mut spans = vec![
        Span::styled("search: ", Style::default().fg(Color::Cyan)),
        Span::raw(tab.search_text().to_string()),
    ];
    if editing {
        spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)));
    }
    spans.push(flag(filter.options.use_regex, "F2 regex"));
    spans.push(flag(filter.options.match_case, "F3 case"));
    spans.push(flag(filter.options.whole_word, "F4 word"));
    spans.push(flag(filter.options.fuzzy, "F5 fuzzy"));
    if app.current_tab() != TabKind::Logs {
        spans.push(flag(filter.toggles.enforce, "e enforce"));
        spans.push(flag(filter.toggles.complain, "c complain"));
        spans.push(flag(filter.toggles.unconfined, "u unconfined"));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &AppContext) {
    let tab = app.tab(app.current_tab());
    let hints = match (app.mode(), app.current_tab()) {
        (AppMode::Search, _) => "  Enter/Esc done",
        (AppMode::Normal, TabKind::Profiles) => {
            "  Tab switch  / search  m mode  r refresh  q quit"
        }
        (AppMode::Normal, _) => "  Tab switch  / search  space select  t context  r refresh  q quit",
    };
    let mut spans = vec![Span::styled(
        tab.status_label().to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if app.current_tab() == TabKind::Processes {
        let selected = app.processes().rows().selected_pids().len();
        if selected > 0 {
            spans.push(Span::raw(format!(", {selected} selected")));
        }
    }
    if app.refreshing() {
        spans.push(Span::styled(" (refreshing)", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(hints, Style::default().fg(Color::DarkGray)));
    let line = Line::from(spans);
    frame.render_widget(Paragraph::new(line), area);
}
