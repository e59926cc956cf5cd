use crate::alerts::{Alert, AlertLevel};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::time::Duration;
use textwrap::fill;

pub struct UI {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    scroll_position: u16,
    selected_history: usize,
    history_scroll: usize,
    max_scroll: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Path,
    Body,
    History,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Path => Focus::Body,
            Focus::Body => Focus::History,
            Focus::History => Focus::Path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePane {
    Empty,
    Pending { method: String, path: String },
    Success { status: u16, body: String },
    Failure { message: String },
}

/// Everything the console needs to draw one frame.
#[derive(Debug, Clone)]
pub struct ConsoleView {
    pub host: String,
    pub method: String,
    pub path: String,
    pub body: String,
    pub body_error: Option<String>,
    pub history: Vec<String>,
    pub response: ResponsePane,
    pub focus: Focus,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Quit,
    Send,
    CycleMethod,
    FormatBody,
    ClearHistory,
    NextFocus,
    InputChar(char),
    Backspace,
    Newline,
    SelectPrevHistory,
    SelectNextHistory,
    LoadSelectedHistory,
    ScrollUp,
    ScrollDown,
    DismissAlert,
}

impl UI {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            scroll_position: 0,
            selected_history: 0,
            history_scroll: 0,
            max_scroll: 0,
        })
    }

    pub fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    pub fn render(&mut self, view: &ConsoleView) -> Result<()> {
        let (scroll_pos, selected, history_scroll) = (
            self.scroll_position,
            self.selected_history,
            self.history_scroll,
        );
        self.terminal
            .draw(|f| Self::render_console(f, view, scroll_pos, selected, history_scroll))?;

        self.update_max_scroll(&view.response);
        Ok(())
    }

    fn render_console(
        f: &mut Frame,
        view: &ConsoleView,
        scroll_pos: u16,
        selected_history: usize,
        history_scroll: usize,
    ) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(10),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(f.size());

        Self::render_request_line(f, main_chunks[0], view);

        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(main_chunks[1]);

        Self::render_body(f, content_chunks[0], view);
        Self::render_response(f, content_chunks[1], &view.response, scroll_pos);
        Self::render_history(
            f,
            main_chunks[2],
            &view.history,
            selected_history,
            history_scroll,
            view.focus == Focus::History,
        );
        Self::render_status(f, main_chunks[3], view.alert.as_ref());
        Self::render_help(f, main_chunks[4]);
    }

    fn focus_style(focused: bool) -> Style {
        if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        }
    }

    fn render_request_line(f: &mut Frame, area: Rect, view: &ConsoleView) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(10), Constraint::Min(10)])
            .split(area);

        f.render_widget(
            Paragraph::new(view.method.clone())
                .style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
                .block(Block::default().borders(Borders::ALL).title("Method")),
            chunks[0],
        );

        let cursor = if view.focus == Focus::Path { "▏" } else { "" };
        f.render_widget(
            Paragraph::new(format!("{}{}", view.path, cursor))
                .style(Style::default().fg(Color::White))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Self::focus_style(view.focus == Focus::Path))
                        .title(format!("🌐 {}", view.host)),
                ),
            chunks[1],
        );
    }

    fn render_body(f: &mut Frame, area: Rect, view: &ConsoleView) {
        let mut lines: Vec<Line> = view
            .body
            .split('\n')
            .map(|line| Line::from(line.to_string()))
            .collect();
        if view.focus == Focus::Body {
            if let Some(last) = lines.last_mut() {
                last.spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
            }
        }

        let title = match &view.body_error {
            Some(_) => "📝 Body (not JSON)",
            None => "📝 Body",
        };
        f.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Self::focus_style(view.focus == Focus::Body))
                    .title(title),
            ),
            area,
        );
    }

    fn render_response(f: &mut Frame, area: Rect, response: &ResponsePane, scroll_pos: u16) {
        let (title, text, style) = match response {
            ResponsePane::Empty => (
                "📄 Response".to_string(),
                String::new(),
                Style::default().fg(Color::Gray),
            ),
            ResponsePane::Pending { method, path } => (
                "📄 Response".to_string(),
                format!("⏳ {} {}", method, path),
                Style::default().fg(Color::Yellow),
            ),
            ResponsePane::Success { status, body } => (
                format!("📄 Response ({})", status),
                body.clone(),
                Style::default().fg(Color::White),
            ),
            ResponsePane::Failure { message } => (
                "❌ Response".to_string(),
                message.clone(),
                Style::default().fg(Color::Red),
            ),
        };

        let line_count = text.lines().count();
        f.render_widget(
            Paragraph::new(text)
                .style(style)
                .wrap(Wrap { trim: false })
                .scroll((scroll_pos, 0))
                .block(Block::default().borders(Borders::ALL).title(title)),
            area,
        );

        let visible_height = area.height.saturating_sub(2) as usize;
        if line_count > visible_height {
            let scrollbar = Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None);
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(line_count)
                .position(scroll_pos as usize);
            f.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
        }
    }

    fn render_history(
        f: &mut Frame,
        area: Rect,
        entries: &[String],
        selected: usize,
        history_scroll: usize,
        focused: bool,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Self::focus_style(focused))
            .title("📚 History");

        if entries.is_empty() {
            f.render_widget(
                Paragraph::new("No requests sent yet")
                    .style(Style::default().fg(Color::Gray))
                    .block(block),
                area,
            );
            return;
        }

        let visible_height = area.height.saturating_sub(2) as usize;
        let start_index = history_scroll.min(entries.len() - 1);
        let end_index = (start_index + visible_height).min(entries.len());

        let items: Vec<ListItem> = entries[start_index..end_index]
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let absolute_index = start_index + i;
                let style = if focused && absolute_index == selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                ListItem::new(format!("{:>2}. {}", absolute_index + 1, entry)).style(style)
            })
            .collect();

        f.render_widget(List::new(items).block(block), area);
    }

    fn render_status(f: &mut Frame, area: Rect, alert: Option<&Alert>) {
        let (text, style) = match alert {
            Some(alert) => {
                let style = match alert.level {
                    AlertLevel::Success => Style::default().fg(Color::Green),
                    AlertLevel::Info => Style::default().fg(Color::Cyan),
                    AlertLevel::Warn => Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                    AlertLevel::Error => Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                };
                (
                    fill(&alert.message, area.width.saturating_sub(4) as usize),
                    style,
                )
            }
            None => (String::new(), Style::default()),
        };

        f.render_widget(
            Paragraph::new(text)
                .style(style)
                .block(Block::default().borders(Borders::ALL).title("Status")),
            area,
        );
    }

    fn render_help(f: &mut Frame, area: Rect) {
        let key = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let help_text = Line::from(vec![
            Span::styled("Ctrl+S", key),
            Span::raw(" Send  "),
            Span::styled("F2", key),
            Span::raw(" Method  "),
            Span::styled("Tab", key),
            Span::raw(" Focus  "),
            Span::styled("Ctrl+F", key),
            Span::raw(" Format  "),
            Span::styled("PgUp/PgDn", key),
            Span::raw(" Scroll  "),
            Span::styled("Ctrl+L", key),
            Span::raw(" Clear History  "),
            Span::styled("Esc", key),
            Span::raw(" Dismiss  "),
            Span::styled("Ctrl+Q", key),
            Span::raw(" Quit"),
        ]);

        f.render_widget(
            Paragraph::new(help_text)
                .block(Block::default().borders(Borders::ALL).title("⌨️ Controls")),
            area,
        );
    }

    /// Waits up to `timeout` for a key press and maps it for the focused pane.
    pub fn get_user_input(&mut self, focus: Focus, timeout: Duration) -> Result<Option<UserAction>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(map_key(focus, key)),
            _ => Ok(None),
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll_position = self.scroll_position.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.scroll_position < self.max_scroll {
            self.scroll_position += 1;
        }
    }

    pub fn select_prev_history(&mut self) {
        if self.selected_history > 0 {
            self.selected_history -= 1;
            self.update_history_scroll();
        }
    }

    pub fn select_next_history(&mut self, history_len: usize) {
        if history_len > 0 && self.selected_history < history_len - 1 {
            self.selected_history += 1;
            self.update_history_scroll();
        }
    }

    pub fn get_selected_history(&self) -> usize {
        self.selected_history
    }

    pub fn reset_history_selection(&mut self) {
        self.selected_history = 0;
        self.history_scroll = 0;
    }

    pub fn reset_scroll(&mut self) {
        self.scroll_position = 0;
    }

    fn update_history_scroll(&mut self) {
        // history pane is 10 rows tall including its border
        let visible_height = 8;
        if self.selected_history < self.history_scroll {
            self.history_scroll = self.selected_history;
        } else if self.selected_history >= self.history_scroll + visible_height {
            self.history_scroll = self.selected_history + 1 - visible_height;
        }
    }

    fn update_max_scroll(&mut self, response: &ResponsePane) {
        let text = match response {
            ResponsePane::Success { body, .. } => body.as_str(),
            ResponsePane::Failure { message } => message.as_str(),
            _ => "",
        };
        let height = self.terminal.size().map(|s| s.height).unwrap_or(24);
        let visible_height = height.saturating_sub(20) as usize;
        let width =
            (self.terminal.size().map(|s| s.width).unwrap_or(80) * 60 / 100).saturating_sub(4);
        let lines_count = fill(text, width.max(1) as usize).lines().count();
        self.max_scroll = lines_count.saturating_sub(visible_height) as u16;
        self.scroll_position = self.scroll_position.min(self.max_scroll);
    }
}

/// Key bindings. Global chords win over pane-local editing keys.
pub fn map_key(focus: Focus, key: KeyEvent) -> Option<UserAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return Some(UserAction::Quit),
        KeyCode::Char('s') if ctrl => return Some(UserAction::Send),
        KeyCode::Char('f') if ctrl => return Some(UserAction::FormatBody),
        KeyCode::Char('l') if ctrl => return Some(UserAction::ClearHistory),
        KeyCode::F(5) => return Some(UserAction::Send),
        KeyCode::F(2) => return Some(UserAction::CycleMethod),
        KeyCode::Tab => return Some(UserAction::NextFocus),
        KeyCode::Esc => return Some(UserAction::DismissAlert),
        KeyCode::PageUp => return Some(UserAction::ScrollUp),
        KeyCode::PageDown => return Some(UserAction::ScrollDown),
        _ => {}
    }

    match focus {
        Focus::Path => match key.code {
            KeyCode::Enter => Some(UserAction::Send),
            KeyCode::Backspace => Some(UserAction::Backspace),
            KeyCode::Char(c) if !ctrl => Some(UserAction::InputChar(c)),
            _ => None,
        },
        Focus::Body => match key.code {
            KeyCode::Enter => Some(UserAction::Newline),
            KeyCode::Backspace => Some(UserAction::Backspace),
            KeyCode::Char(c) if !ctrl => Some(UserAction::InputChar(c)),
            _ => None,
        },
        Focus::History => match key.code {
            KeyCode::Up => Some(UserAction::SelectPrevHistory),
            KeyCode::Down => Some(UserAction::SelectNextHistory),
            KeyCode::Enter => Some(UserAction::LoadSelectedHistory),
            _ => None,
        },
    }
}
