//! Task detail rendering: header with inline editors, chat, composer.

use chrono::Utc;
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tasksync_proto::task::TaskStatus;

use super::{Areas, GUTTER, content_width, theme, wrap};
use crate::app::{App, Focus};
use crate::edit::{EditSession, FieldPhase};
use crate::gateway::StoreGateway;
use crate::pending::Collection;
use crate::view::{FieldId, format_elapsed};

/// Render the task detail screen.
pub fn render<G: StoreGateway + 'static>(frame: &mut Frame, areas: &Areas, app: &App<G>) {
    render_header(frame, areas.header, app);
    render_messages(frame, areas.list, app);
    render_composer(frame, areas.footer, app);
}

fn border(focused: bool) -> Style {
    if focused {
        theme::highlighted()
    } else {
        theme::normal()
    }
}

/// Draft with a block caret.
fn with_caret(session: &EditSession) -> String {
    let mut shown: String = session.draft().chars().take(session.caret()).collect();
    shown.push('█');
    shown.extend(session.draft().chars().skip(session.caret()));
    shown
}

/// Text and style of a field given its edit phase.
fn field_view<G: StoreGateway + 'static>(
    app: &App<G>,
    field: FieldId,
    text: &str,
    base: Style,
) -> (String, Style) {
    let edits = app.engine().edits();
    match (edits.phase(field), edits.session(field)) {
        (FieldPhase::Editing, Some(session)) => (with_caret(session), theme::editing()),
        (FieldPhase::Saving, _) => (text.to_string(), theme::saving()),
        _ => (text.to_string(), base),
    }
}

fn render_header<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let engine = app.engine();
    let Some(task) = engine.lists().detail() else {
        let block = Block::default().title("Loading…").borders(Borders::ALL);
        frame.render_widget(block, area);
        return;
    };
    let width = area.width.saturating_sub(2);

    let (title, title_style) = field_view(app, FieldId::TaskTitle, &task.title, theme::bold());
    let title_style = if app.focus == Focus::Title && app.editing_field().is_none() {
        title_style.patch(theme::selected())
    } else {
        title_style
    };
    let mut lines = vec![Line::from(Span::styled(title, title_style))];

    let (description, description_style) = field_view(
        app,
        FieldId::TaskDescription,
        &task.description,
        theme::normal(),
    );
    let description_style = if app.focus == Focus::Description && app.editing_field().is_none() {
        description_style.patch(theme::selected())
    } else {
        description_style
    };
    let (description, description_style) = if description.is_empty() {
        ("(no description)".to_string(), theme::dimmed())
    } else {
        (description, description_style)
    };
    lines.extend(
        wrap(&description, width)
            .into_iter()
            .take(3)
            .map(|row| Line::from(Span::styled(row, description_style))),
    );

    let (status, status_style) = match task.status {
        TaskStatus::Open => ("open", theme::normal().fg(theme::WARNING)),
        TaskStatus::Completed => ("completed", theme::normal().fg(theme::SUCCESS)),
    };
    lines.push(Line::from(vec![
        Span::styled(status, status_style),
        Span::styled(
            format!(
                " · by {} · {} · ⏱ {}",
                task.created_by,
                task.created_at.format("%Y-%m-%d %H:%M"),
                format_elapsed(task, Utc::now()),
            ),
            theme::dimmed(),
        ),
    ]));

    let block = Block::default()
        .title(Span::styled(
            format!("Task #{}", task.id),
            theme::panel_title(theme::TASKS_TITLE),
        ))
        .borders(Borders::ALL)
        .border_style(border(matches!(app.focus, Focus::Title | Focus::Description)));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_messages<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let engine = app.engine();
    let lists = engine.lists();
    let width = content_width(area);
    let gutter = usize::from(GUTTER);
    let mut lines: Vec<Line> = Vec::new();

    for (index, msg) in lists.messages().iter().enumerate() {
        let field = FieldId::Message(msg.id);
        let (content, style) = field_view(app, field, &msg.content, theme::normal());
        let style = if app.focus == Focus::Messages
            && index == app.selected_message
            && app.editing_field().is_none()
        {
            style.patch(theme::selected())
        } else {
            style
        };
        let time = msg.created_at.format(&app.timestamp_format).to_string();
        for (row, text) in wrap(&content, width).into_iter().enumerate() {
            let gutter_span = match row {
                0 => Span::styled(
                    format!("{:<gutter$}", truncate(&msg.user_name, gutter - 1)),
                    theme::normal().fg(theme::sender_color(&msg.user_name)),
                ),
                1 if msg.is_edited => {
                    Span::styled(format!("{:<gutter$}", format!("{time} ✎")), theme::timestamp())
                }
                1 => Span::styled(format!("{time:<gutter$}"), theme::timestamp()),
                _ => Span::raw(" ".repeat(gutter)),
            };
            lines.push(Line::from(vec![gutter_span, Span::styled(text, style)]));
        }
    }
    if let Some(task) = lists.messages_task() {
        for placeholder in engine.pending().placeholders(Collection::Messages(task)) {
            for (row, text) in wrap(placeholder.text(), width).into_iter().enumerate() {
                let author = if row == 0 {
                    truncate(&placeholder.author, gutter - 1)
                } else {
                    String::new()
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("{author:<gutter$}"), theme::dimmed()),
                    Span::styled(text, theme::placeholder()),
                ]));
            }
        }
    }

    let offset = u16::try_from(lists.message_viewport().offset).unwrap_or(u16::MAX);
    let block = Block::default()
        .title(Span::styled("Chat", theme::panel_title(theme::CHAT_TITLE)))
        .borders(Borders::ALL)
        .border_style(border(app.focus == Focus::Messages));
    frame.render_widget(Paragraph::new(lines).block(block).scroll((offset, 0)), area);
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn render_composer<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let focused = app.focus == Focus::Composer;
    let line = if app.composer.text().is_empty() && !focused {
        Line::from(Span::styled("Type a message...", theme::dimmed()))
    } else {
        Line::from(Span::styled(app.composer.display(focused), theme::normal()))
    };
    let title = if app.engine().enrichment_requested() {
        "Message (✨ AI on)"
    } else {
        "Message"
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border(focused));
    frame.render_widget(Paragraph::new(line).block(block), area);
}
