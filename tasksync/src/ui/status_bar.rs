//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, Focus};
use crate::gateway::StoreGateway;

/// Key help for the focused widget.
const fn help_text(focus: Focus, editing: bool) -> &'static str {
    if editing {
        return "Enter: save | Shift+Enter: newline | Esc: discard | Tab: save & leave";
    }
    match focus {
        Focus::SignInName | Focus::SignInKey => "Enter: sign in | Tab: switch field | Esc: quit",
        Focus::Search => "type to filter | Enter/Tab/Esc: back to list",
        Focus::Tasks => {
            "Enter: open | n: new | /: search | v: view | s: sort | c: open/done | a: AI | d: delete"
        }
        Focus::NewTitle | Focus::NewDescription => "Enter: create | Tab: switch field | Esc: cancel",
        Focus::Title | Focus::Description => {
            "Enter/e: edit | x: complete/reopen | d: delete | Tab: next | Esc: back"
        }
        Focus::Messages => "↑↓/jk: select | Enter/e: edit | d: delete | PgUp/PgDn: scroll | Esc: back",
        Focus::Composer => "Enter: send | Tab: next | Esc: back",
    }
}

/// Render the status bar at the bottom of the screen.
pub fn render<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let engine = app.engine();
    let user = engine
        .user_name()
        .unwrap_or_else(|| "signed out".to_string());

    let (ai_color, ai_text) = if engine.enrichment_requested() {
        (theme::AI, "AI on")
    } else if engine.ai_available() {
        (theme::FG_SECONDARY, "AI off")
    } else {
        (theme::FG_SECONDARY, "AI n/a")
    };

    let mut spans = vec![
        Span::styled("tasksync", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(theme::SUCCESS)),
        Span::raw(format!(" {user}")),
        Span::raw(" | "),
        Span::styled(ai_text, theme::normal().fg(ai_color)),
    ];
    let in_flight = engine.edits().saving_count();
    if in_flight > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(format!("saving {in_flight}"), theme::saving()));
    }
    spans.push(Span::raw(" | "));
    spans.push(Span::styled(
        help_text(app.focus, app.editing_field().is_some()),
        theme::dimmed(),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
