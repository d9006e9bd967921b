use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, List, ListItem, ListState, Row, Table, TableState};

use crate::app::AppContext;
use crate::controller::LinesController;
use crate::process::COLUMN_NAMES;
use crate::status::{Tab, TabKind};

pub fn render(frame: &mut Frame, area: Rect, app: &AppContext) {
    match app.current_tab() {
        TabKind::Processes => render_processes(frame, area, app),
        TabKind::Profiles => render_lines(frame, area, app, app.profiles(), " Profiles "),
        TabKind::Logs => render_lines(frame, area, app, app.logs(), " Logs "),
    }
}

fn block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title)
}

fn highlight() -> Style {
    Style::default()
        .bg(Color::Rgb(60, 60, 90))
        .add_modifier(Modifier::BOLD)
}

fn render_processes(frame: &mut Frame, area: Rect, app: &AppContext) {
    let rows = app.processes().rows().rows(app.show_context());

    let header = Row::new(COLUMN_NAMES.iter().map(|name| Cell::from(*name))).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let body: Vec<Row> = rows
        .iter()
        .map(|row| {
            let [command, user, pid, status] = row.record.columns();
            let marker = if row.selected { "* " } else { "  " };
            let style = if !row.matched {
                Style::default().fg(Color::DarkGray)
            } else if row.record.is_confined() {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(format!("{marker}{}{command}", row.prefix)),
                Cell::from(user),
                Cell::from(pid),
                Cell::from(status),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(45),
        Constraint::Length(12),
        Constraint::Length(8),
        Constraint::Min(20),
    ];
    let table = Table::new(body, widths)
        .header(header)
        .block(block(" Processes "))
        .highlight_style(highlight());

    let mut state = TableState::default();
    if !rows.is_empty() {
        state.select(Some(app.cursor(TabKind::Processes)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_lines(
    frame: &mut Frame,
    area: Rect,
    app: &AppContext,
    controller: &LinesController<Tab>,
    title: &str,
) {
    let rows = controller.rows();
    let items: Vec<ListItem> = rows
        .visible_rows()
        .map(|line| {
            let marker = if rows.is_selected(line) { "* " } else { "  " };
            ListItem::new(format!("{marker}{line}"))
        })
        .collect();

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(app.cursor(app.current_tab())));
    }
    let list = List::new(items)
        .block(block(title))
        .highlight_style(highlight());
    frame.render_stateful_widget(list, area, &mut state);
}
