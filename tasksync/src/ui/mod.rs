//! Terminal UI rendering.
//!
//! Rendering is a pure function of the [`App`]. The few geometry facts the
//! engine needs back (viewport heights, wrap width) are computed by the
//! same layout helpers and pushed in via [`App::resize`].

pub mod chat_panel;
pub mod status_bar;
pub mod task_panel;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::{App, Focus};
use crate::gateway::StoreGateway;
use crate::sync::RowMeasure;
use crate::view::Route;

/// Columns reserved left of list content (author, id, markers).
pub const GUTTER: u16 = 14;

/// Height of the task header above the chat.
pub const DETAIL_HEIGHT: u16 = 7;

/// Height of single-line input boxes.
pub const INPUT_HEIGHT: u16 = 3;

/// Height of the new-task form.
pub const FORM_HEIGHT: u16 = 4;

/// Screen regions for one route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Areas {
    /// Bottom status line.
    pub status: Rect,
    /// Search box (list) or task header (detail).
    pub header: Rect,
    /// Scrollable list: tasks or messages.
    pub list: Rect,
    /// Composer (detail) or new-task form (list).
    pub footer: Rect,
}

/// Splits `area` for `route`.
#[must_use]
pub fn areas(area: Rect, route: Route, form_open: bool) -> Areas {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    let (header, footer) = match route {
        Route::SignIn => {
            return Areas {
                status: outer[1],
                list: outer[0],
                ..Areas::default()
            };
        }
        Route::TaskList => (INPUT_HEIGHT, if form_open { FORM_HEIGHT } else { 0 }),
        Route::TaskDetail(_) => (DETAIL_HEIGHT, INPUT_HEIGHT),
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header),
            Constraint::Min(3),
            Constraint::Length(footer),
        ])
        .split(outer[0]);
    Areas {
        status: outer[1],
        header: chunks[0],
        list: chunks[1],
        footer: chunks[2],
    }
}

/// Width of list content inside borders and gutter.
#[must_use]
pub const fn content_width(list: Rect) -> u16 {
    list.width.saturating_sub(2 + GUTTER)
}

/// Rows visible inside the bordered list.
#[must_use]
pub const fn inner_height(list: Rect) -> u16 {
    list.height.saturating_sub(2)
}

/// Hard-wraps `text` at `width` chars; every line yields at least one row.
#[must_use]
pub fn wrap(text: &str, width: u16) -> Vec<String> {
    let width = usize::from(width.max(1));
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        rows.extend(chars.chunks(width).map(|c| c.iter().collect::<String>()));
    }
    rows
}

/// Row measure matching [`wrap`] at a fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapMeasure {
    /// Content width in columns.
    pub width: u16,
}

impl RowMeasure for WrapMeasure {
    fn height(&self, text: &str) -> u32 {
        u32::try_from(wrap(text, self.width).len().max(1)).unwrap_or(u32::MAX)
    }
}

/// Main draw function for the entire UI.
pub fn draw<G: StoreGateway + 'static>(frame: &mut Frame, app: &App<G>) {
    let route = app.engine().route();
    let areas = areas(frame.area(), route, app.new_task.is_some());

    match route {
        Route::SignIn => render_sign_in(frame, areas.list, app),
        Route::TaskList => task_panel::render(frame, &areas, app),
        Route::TaskDetail(_) => chat_panel::render(frame, &areas, app),
    }
    status_bar::render(frame, areas.status, app);

    if let Some(notice) = app.engine().notice() {
        render_notice(frame, &notice.text);
    }
}

fn render_sign_in<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let form = &app.sign_in;
    let field = |label: &'static str, value: String, focused: bool| {
        let style = if focused {
            theme::highlighted()
        } else {
            theme::normal()
        };
        Line::from(vec![
            Span::styled(format!("{label:>9}: "), theme::dimmed()),
            Span::styled(value, style),
        ])
    };
    let mut lines = vec![
        Line::from(Span::styled("Sign in to the task store", theme::bold())),
        Line::raw(""),
        field(
            "Name",
            form.name.display(app.focus == Focus::SignInName),
            app.focus == Focus::SignInName,
        ),
        field(
            "API key",
            "*".repeat(form.key.text().chars().count())
                + if app.focus == Focus::SignInKey { "█" } else { "" },
            app.focus == Focus::SignInKey,
        ),
    ];
    if let Some(error) = &form.error {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(error.clone(), theme::error())));
    }
    let block = Block::default()
        .title(Span::styled("tasksync", theme::panel_title(theme::TASKS_TITLE)))
        .borders(Borders::ALL)
        .border_style(theme::highlighted());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_notice(frame: &mut Frame, text: &str) {
    let area = frame.area();
    let width = area.width.saturating_sub(4).min(60);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + area.height / 3,
        width,
        height: 5.min(area.height),
    };
    let block = Block::default()
        .title(Span::styled("Notice", theme::panel_title(theme::ERROR)))
        .borders(Borders::ALL)
        .border_style(theme::normal().fg(theme::ERROR));
    let body = vec![
        Line::raw(text.to_string()),
        Line::from(Span::styled("Enter/Esc: dismiss", theme::dimmed())),
    ];
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(body).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}
