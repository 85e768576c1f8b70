use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::reader::ReaderSession;
use crate::theme::Base16Palette;

const KEY_HINTS: &str = "space play/pause  s stop  h/l page  g go to  b bookmark  q quit";
const EMPTY_PAGE: &str = "(this page has no text)";
const LOADING_PAGE: &str = "Loading page...";

/// Page text plus a one-line status bar.
#[derive(Debug, Default)]
pub struct ReaderView {
    scroll_offset: usize,
    last_line_count: usize,
    last_text_height: usize,
}

impl ReaderView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn reset_scroll(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max = self.last_line_count.saturating_sub(self.last_text_height);
        self.scroll_offset = (self.scroll_offset + lines).min(max);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn page_height(&self) -> usize {
        self.last_text_height.max(1)
    }

    /// `page_input` is the page number being typed, if any.
    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        session: &ReaderSession,
        page_input: Option<&str>,
        palette: &Base16Palette,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);

        self.render_page(f, chunks[0], session, palette);
        let status = status_line(session, page_input, chunks[1].width as usize, palette);
        f.render_widget(Paragraph::new(status).style(palette.status_style()), chunks[1]);
    }

    fn render_page(&mut self, f: &mut Frame, area: Rect, session: &ReaderSession, palette: &Base16Palette) {
        let title = match session.title() {
            Some(title) => format!(" Reading: {title} "),
            None => " Reader ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(palette.border_style())
            .style(palette.text_style());
        let inner = block.inner(area);

        let body = if session.needs_render() {
            LOADING_PAGE
        } else if session.page_text().trim().is_empty() {
            EMPTY_PAGE
        } else {
            session.page_text()
        };

        let width = (inner.width as usize).saturating_sub(2).max(1);
        let lines: Vec<Line> = textwrap::wrap(body, width)
            .into_iter()
            .map(|line| Line::from(format!(" {line}")))
            .collect();

        self.last_line_count = lines.len();
        self.last_text_height = inner.height as usize;
        let max_offset = self.last_line_count.saturating_sub(self.last_text_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);

        let visible: Vec<Line> = lines.into_iter().skip(self.scroll_offset).collect();
        f.render_widget(Paragraph::new(visible).block(block), area);
    }
}

fn status_line(
    session: &ReaderSession,
    page_input: Option<&str>,
    width: usize,
    palette: &Base16Palette,
) -> Line<'static> {
    let state = session.narration_state();
    let mut spans = vec![
        Span::raw(format!(
            " Page {} of {} ",
            session.current_page(),
            session.page_count()
        )),
        Span::styled(format!(" {} ", state.label()), palette.narration_style(state)),
    ];

    let notice = session.bookmark_notice();
    if !notice.is_empty() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {notice} "), palette.notice_style()));
    }

    if let Some(message) = session.current_message() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!(" {} ", message.text),
            palette.message_style(message.severity),
        ));
    }

    let right = match page_input {
        Some(input) => format!("Go to page: {input}_ "),
        None => format!("{KEY_HINTS} "),
    };
    let used: usize = spans.iter().map(|s| s.content.width()).sum();
    if used + right.width() < width {
        spans.push(Span::raw(" ".repeat(width - used - right.width())));
        spans.push(Span::styled(right, Style::default().fg(palette.base_04)));
    }

    Line::from(spans)
}
