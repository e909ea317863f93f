//! Monitor rendering.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use super::app::{App, Focus};
use super::colors;

pub fn render(app: &mut App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    render_top_bar(app, frame, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(chunks[1]);
    render_tree(app, frame, body[0]);
    render_editor(app, frame, body[1]);

    render_bottom_bar(app, frame, chunks[2]);

    if let Some(text) = app.monitor.modal.as_deref() {
        render_modal(frame, text);
    }
}

fn render_top_bar(app: &App, frame: &mut Frame, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let blocker = Line::from(vec![
        Span::styled("BLOCKER: ", Style::default().fg(colors::HEADER).add_modifier(Modifier::BOLD)),
        Span::styled(app.monitor.blocker.as_str(), Style::default().fg(colors::BLOCKER)),
    ]);
    let status = Line::from(vec![
        Span::styled("STATUS: ", Style::default().fg(colors::HEADER).add_modifier(Modifier::BOLD)),
        Span::styled(app.monitor.status.as_str(), Style::default().fg(colors::STATUS)),
    ]);
    frame.render_widget(Paragraph::new(blocker), halves[0]);
    frame.render_widget(Paragraph::new(status), halves[1]);
}

fn panel(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(colors::FOCUS)
    } else {
        Style::default().fg(colors::DIM)
    };
    Block::default().borders(Borders::ALL).border_style(style).title(title)
}

fn render_tree(app: &App, frame: &mut Frame, area: Rect) {
    let title = match app.tree.root() {
        Some(root) => format!(" {} ", root.display()),
        None => " Files ".to_string(),
    };

    let items: Vec<ListItem> = app
        .tree
        .entries()
        .iter()
        .map(|entry| {
            let marker = match (entry.is_dir, entry.expanded) {
                (true, true) => "▾ ",
                (true, false) => "▸ ",
                (false, _) => "  ",
            };
            ListItem::new(Line::from(vec![
                Span::raw("  ".repeat(entry.depth)),
                Span::raw(marker),
                Span::raw(entry.name.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(panel(title, app.focus == Focus::Tree))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default().with_selected(Some(app.tree.selected_index()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_editor(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Focus::Editor;
    let title = match app.editor.path() {
        Some(path) if app.editor.is_read_only() => format!(" {} (read-only) ", path.display()),
        Some(path) => format!(" {} ", path.display()),
        None => " Editor ".to_string(),
    };
    let block = panel(title, focused);
    let inner = block.inner(area);

    app.editor.scroll_to_cursor(inner.height as usize);
    let scroll = app.editor.scroll;
    let lines: Vec<Line> = app
        .editor
        .lines()
        .iter()
        .skip(scroll)
        .take(inner.height as usize)
        .map(|l| Line::raw(l.as_str()))
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);

    if focused && app.monitor.modal.is_none() && !app.editor.is_read_only() && inner.height > 0 {
        let (row, col) = app.editor.cursor();
        let x = inner.x + (col as u16).min(inner.width.saturating_sub(1));
        let y = inner.y + (row.saturating_sub(scroll) as u16).min(inner.height - 1);
        frame.set_cursor_position(Position::new(x, y));
    }
}

fn render_bottom_bar(app: &App, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(40), Constraint::Length(10)])
        .split(area);

    let target = Line::from(vec![
        Span::styled("TARGET: ", Style::default().fg(colors::HEADER).add_modifier(Modifier::BOLD)),
        Span::raw(app.monitor.network_info.as_str()),
    ]);
    let editor_style = if app.monitor.worker_exited {
        Style::default().fg(colors::FAILED)
    } else {
        Style::default().fg(colors::DIM)
    };
    let hints = Line::from(vec![
        Span::styled("^S", Style::default().fg(colors::KEYBIND)),
        Span::raw(" save "),
        Span::styled("^Q", Style::default().fg(colors::KEYBIND)),
        Span::raw(" quit  "),
        Span::styled(app.monitor.editor_status.as_str(), editor_style),
    ]);

    frame.render_widget(Paragraph::new(target), chunks[0]);
    frame.render_widget(Paragraph::new(hints), chunks[1]);
    frame.render_widget(Paragraph::new(app.monitor.elapsed_text()), chunks[2]);
}

fn render_modal(frame: &mut Frame, text: &str) {
    let area = centered(frame.area(), 60, 7);
    let body = vec![
        Line::raw(text),
        Line::raw(""),
        Line::styled("Press Enter or Esc to close", Style::default().fg(colors::DIM)),
    ];
    let modal = Paragraph::new(body)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(colors::STATUS)));

    frame.render_widget(Clear, area);
    frame.render_widget(modal, area);
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = area.width * percent_x / 100;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::Message;
    use ratatui::{Terminal, backend::TestBackend};

    fn rendered(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| render(app, f)).unwrap();
        terminal.backend().to_string()
    }

    #[test]
    fn test_bars_show_monitor_state() {
        let mut app = App::new();
        app.apply(Message::blocker("Waiting for a response"));
        app.apply(Message::network_info("mainnet:0xabc"));

        let screen = rendered(&mut app);
        assert!(screen.contains("BLOCKER: Waiting for a response"));
        assert!(screen.contains("STATUS: Waiting"));
        assert!(screen.contains("TARGET: mainnet:0xabc"));
        assert!(screen.contains("00:00:0"));
    }

    #[test]
    fn test_modal_is_drawn() {
        let mut app = App::new();
        app.apply(Message::open_modal("profit was found!"));
        assert!(rendered(&mut app).contains("profit was found!"));
    }

    #[test]
    fn test_centered_fits_area() {
        let rect = centered(Rect::new(0, 0, 100, 5), 60, 7);
        assert_eq!(rect.width, 60);
        assert_eq!(rect.height, 5);
        assert_eq!(rect.x, 20);
    }
}
