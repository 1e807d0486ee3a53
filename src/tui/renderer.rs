use ansi_to_tui::IntoText;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Row, Table};

use crate::app::{App, Focus};
use crate::buffer::OutputLine;
use crate::program::{ProgramState, ProgramStatus};

/// Rows taken by the header, the status bar and the output pane borders
const CHROME_ROWS: u16 = 4;

const HELP: &str = "q quit | Tab focus | 1-9/Enter start/stop | j/k move | f follow";

/// TUI rendering handler
pub struct Renderer;

impl Renderer {
    /// Render application state
    pub fn render(frame: &mut Frame, app: &App) {
        let [header, list, output, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(Self::list_height(app)),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let title = match app.name() {
            Some(name) => format!("Program runner: {}", name),
            None => "Program runner".to_string(),
        };
        frame.render_widget(
            Paragraph::new(title).style(Style::default().add_modifier(Modifier::BOLD)),
            header,
        );

        Self::render_list(frame, app, list);
        Self::render_output(frame, app, output);

        let status_text = if app.status_line().is_empty() {
            HELP.to_string()
        } else {
            format!("{}  ({})", app.status_line(), HELP)
        };
        frame.render_widget(
            Paragraph::new(status_text).style(Style::default().fg(Color::DarkGray)),
            status,
        );
    }

    /// Number of output lines visible for a terminal of `height` rows
    pub fn output_rows(app: &App, height: u16) -> usize {
        height
            .saturating_sub(Self::list_height(app))
            .saturating_sub(CHROME_ROWS) as usize
    }

    fn list_height(app: &App) -> u16 {
        // header row plus borders
        u16::try_from(app.programs().len())
            .unwrap_or(u16::MAX)
            .saturating_add(3)
    }

    fn render_list(frame: &mut Frame, app: &App, area: Rect) {
        let rows = app.programs().iter().map(|program| {
            let style = if program.index() == app.selected_index() {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Row::new(vec![
                Span::raw(toggle_key(program.index())),
                status_span(program.status()),
                Span::raw(program.display_command()),
            ])
            .style(style)
        });

        let table = Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Min(10),
            ],
        )
        .header(
            Row::new(vec!["Key", "Running?", "Program"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(pane_block(" Programs ", app.focus() == Focus::List));

        frame.render_widget(table, area);
    }

    fn render_output(frame: &mut Frame, app: &App, area: Rect) {
        let program = app.selected_program();
        let view = app.current_view();
        let visible = area.height.saturating_sub(2) as usize;

        let lines: Vec<Line> = program
            .snapshot()
            .iter()
            .skip(view.scroll_offset())
            .take(visible)
            .map(styled_line)
            .collect();

        let follow = if view.follow() { " [follow]" } else { "" };
        let block = pane_block(&output_title(program, follow), app.focus() == Focus::Output)
            .title_bottom(format!(" {} ", program.message()));

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::bordered()
        .title(title.to_string())
        .border_style(border)
}

fn output_title(program: &ProgramState, follow: &str) -> String {
    format!(" Output: {}{} ", program.display_command(), follow)
}

fn toggle_key(index: usize) -> String {
    if index < 9 {
        format!("{}", index + 1)
    } else {
        String::new()
    }
}

fn status_span(status: ProgramStatus) -> Span<'static> {
    let style = match status {
        ProgramStatus::Running => Style::default().fg(Color::Green),
        ProgramStatus::Stopping => Style::default().fg(Color::Yellow),
        ProgramStatus::Failed => Style::default().fg(Color::Red),
        ProgramStatus::Idle | ProgramStatus::Succeeded => Style::default(),
    };
    Span::styled(status.label(), style)
}

/// Parse ANSI escape sequences into spans; stderr lines default to red
fn styled_line(line: &OutputLine) -> Line<'static> {
    let spans = match line.content.as_str().into_text() {
        Ok(text) => text
            .lines
            .into_iter()
            .next()
            .map(|line| line.spans)
            .unwrap_or_default(),
        Err(_) => vec![Span::raw(line.content.clone())],
    };
    let styled = Line::from(spans);
    if line.is_stderr() {
        styled.style(Style::default().fg(Color::Red))
    } else {
        styled
    }
}
