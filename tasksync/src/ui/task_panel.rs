//! Task list rendering: search box, card or table projection, new-task form.

use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
};
use tasksync_proto::task::{Task, TaskStatus};

use super::{Areas, GUTTER, content_width, theme, wrap};
use crate::app::{App, Focus};
use crate::gateway::StoreGateway;
use crate::pending::Collection;
use crate::view::{SortOrder, ViewMode, format_elapsed};

/// Render the task list screen.
pub fn render<G: StoreGateway + 'static>(frame: &mut Frame, areas: &Areas, app: &App<G>) {
    render_search(frame, areas.header, app);
    match app.engine().lists().view_mode() {
        ViewMode::Card => render_cards(frame, areas.list, app),
        ViewMode::Table => render_table(frame, areas.list, app),
    }
    if let Some(form) = &app.new_task {
        let label = if app.engine().enrichment_requested() {
            "Enter: improve & create"
        } else {
            "Enter: create"
        };
        let lines = vec![
            Line::from(vec![
                Span::styled("Title: ", theme::dimmed()),
                Span::raw(form.title.display(app.focus == Focus::NewTitle)),
            ]),
            Line::from(vec![
                Span::styled("Notes: ", theme::dimmed()),
                Span::raw(form.description.display(app.focus == Focus::NewDescription)),
            ]),
        ];
        let block = Block::default()
            .title(format!("New task ({label})"))
            .borders(Borders::ALL)
            .border_style(theme::highlighted());
        frame.render_widget(Paragraph::new(lines).block(block), areas.footer);
    }
}

fn focused_border(focused: bool) -> ratatui::style::Style {
    if focused {
        theme::highlighted()
    } else {
        theme::normal()
    }
}

fn render_search<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let focused = app.focus == Focus::Search;
    let line = if app.search.text().is_empty() && !focused {
        Line::from(Span::styled("/ to search titles, notes and chat", theme::dimmed()))
    } else {
        Line::raw(app.search.display(focused))
    };
    let block = Block::default()
        .title("Search")
        .borders(Borders::ALL)
        .border_style(focused_border(focused));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn list_title<G: StoreGateway + 'static>(app: &App<G>) -> String {
    let lists = app.engine().lists();
    let partition = match lists.partition() {
        TaskStatus::Open => "Open",
        TaskStatus::Completed => "Completed",
    };
    if lists.search().is_empty() {
        format!("{partition} tasks")
    } else {
        format!("{partition} tasks matching \"{}\"", lists.search())
    }
}

fn task_marker(task: &Task) -> &'static str {
    match task.status {
        TaskStatus::Open => "[ ]",
        TaskStatus::Completed => "[✓]",
    }
}

fn render_cards<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let engine = app.engine();
    let width = content_width(area);
    let gutter = usize::from(GUTTER);
    let mut lines: Vec<Line> = Vec::new();

    for (index, task) in engine.lists().task_rows().into_iter().enumerate() {
        let selected = app.focus == Focus::Tasks && index == app.selected_task;
        let title_style = if selected {
            theme::selected()
        } else {
            theme::bold()
        };
        for (row, text) in wrap(&task.title, width).into_iter().enumerate() {
            let gutter_text = if row == 0 {
                format!("{} #{}", task_marker(task), task.id)
            } else {
                String::new()
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{gutter_text:<gutter$}"), theme::dimmed()),
                Span::styled(text, title_style),
            ]));
        }
        if !task.description.is_empty() {
            for text in wrap(&task.description, width) {
                lines.push(Line::from(vec![
                    Span::raw(" ".repeat(gutter)),
                    Span::styled(text, theme::normal()),
                ]));
            }
        }
    }
    for placeholder in engine.pending().placeholders(Collection::Tasks) {
        for (row, text) in wrap(placeholder.text(), width).into_iter().enumerate() {
            let gutter_text = if row == 0 { "[…]" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(format!("{gutter_text:<gutter$}"), theme::dimmed()),
                Span::styled(text, theme::placeholder()),
            ]));
        }
    }

    let offset = u16::try_from(engine.lists().task_viewport().offset).unwrap_or(u16::MAX);
    let block = Block::default()
        .title(list_title(app))
        .borders(Borders::ALL)
        .border_style(focused_border(app.focus == Focus::Tasks));
    frame.render_widget(Paragraph::new(lines).block(block).scroll((offset, 0)), area);
}

fn render_table<G: StoreGateway + 'static>(frame: &mut Frame, area: Rect, app: &App<G>) {
    let engine = app.engine();
    let now = Utc::now();
    let offset = usize::try_from(engine.lists().task_viewport().offset).unwrap_or(usize::MAX);
    let arrow = match engine.lists().sort_order() {
        SortOrder::Asc => "▲",
        SortOrder::Desc => "▼",
    };

    let mut rows: Vec<Row> = engine
        .lists()
        .task_rows()
        .into_iter()
        .enumerate()
        .map(|(index, task)| {
            let style = if app.focus == Focus::Tasks && index == app.selected_task {
                theme::selected()
            } else {
                theme::normal()
            };
            Row::new(vec![
                format!("{} #{}", task_marker(task), task.id),
                task.title.clone(),
                task.created_by.clone(),
                task.created_at.format("%Y-%m-%d %H:%M").to_string(),
                format_elapsed(task, now),
            ])
            .style(style)
        })
        .collect();
    rows.extend(
        engine
            .pending()
            .placeholders(Collection::Tasks)
            .map(|p| {
                Row::new(vec![
                    "[…]".to_string(),
                    p.text().to_string(),
                    p.author.clone(),
                    String::new(),
                    String::new(),
                ])
                .style(theme::placeholder())
            }),
    );

    let header = Row::new(vec![
        "Task".to_string(),
        "Title".to_string(),
        "Owner".to_string(),
        format!("Created {arrow}"),
        "Timer".to_string(),
    ])
    .style(theme::bold());
    let block = Block::default()
        .title(list_title(app))
        .borders(Borders::ALL)
        .border_style(focused_border(app.focus == Focus::Tasks));
    let table = Table::new(
        rows.into_iter().skip(offset),
        [
            Constraint::Length(GUTTER),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(17),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(block);
    frame.render_widget(table, area);
}
