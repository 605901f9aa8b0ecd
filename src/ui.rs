use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use keydrill::scoring::{pace_std_dev, wpm_points};
use keydrill::session::{MismatchPolicy, Outcome, Session};

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match &self.screen {
            Screen::Loading => render_message(
                "Generating your practice plan...",
                Color::Yellow,
                area,
                buf,
            ),
            Screen::Error(message) => {
                render_message(&format!("Plan error: {message}"), Color::Red, area, buf)
            }
            Screen::Complete => render_complete(self, area, buf),
            Screen::Typing => render_typing(self, area, buf),
            Screen::Results => render_results(self, area, buf),
        }
    }
}

fn render_message(text: &str, color: Color, area: Rect, buf: &mut Buffer) {
    let widget = Paragraph::new(Span::styled(
        text.to_string(),
        Style::default()
            .fg(color)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });

    // vertically center the single message line
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height / 2),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    widget.render(chunks[1], buf);
}

fn render_complete(app: &App, area: Rect, buf: &mut Buffer) {
    let snapshot = app.controller.as_ref().map(|c| c.snapshot());
    let summary = match snapshot {
        Some(s) => format!("Plan complete: {} lessons finished", s.total_lessons),
        None => "Plan complete".to_string(),
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height / 2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        summary,
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(p)ractice weak keys / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);
}

fn header_line(app: &App) -> String {
    let Some(controller) = &app.controller else {
        return "practice drill".to_string();
    };

    match (controller.current_lesson(), controller.snapshot()) {
        (Some(lesson), snapshot) => {
            let module_name = controller
                .curriculum()
                .modules
                .get(snapshot.current_module_index)
                .map(|m| m.name.as_str())
                .unwrap_or("");
            let policy = app
                .session
                .as_ref()
                .map(|s| s.policy)
                .unwrap_or_default();
            let policy_label = match policy {
                MismatchPolicy::Block => "block on error",
                MismatchPolicy::Advance => "advance on error",
            };
            format!(
                "{} / {} ({}/{})  target {} wpm  [{}]",
                module_name,
                lesson.title,
                snapshot.completed_lessons + 1,
                snapshot.total_lessons,
                lesson.target_wpm,
                policy_label,
            )
        }
        _ => "practice drill".to_string(),
    }
}

fn prompt_spans<'a>(session: &Session) -> Vec<Span<'a>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);

    let target = session.target_text();
    let target_chars: Vec<char> = target.chars().collect();

    let mut spans = session
        .typed
        .iter()
        .enumerate()
        .map(|(idx, typed)| {
            let expected = target_chars.get(idx).copied().unwrap_or(' ');
            match typed.outcome {
                Outcome::Incorrect => Span::styled(
                    match typed.char {
                        ' ' => "·".to_owned(),
                        c => c.to_string(),
                    },
                    red_bold_style,
                ),
                Outcome::Correct => Span::styled(expected.to_string(), green_bold_style),
            }
        })
        .collect::<Vec<Span>>();

    if let Some(next) = session.expected_char(session.cursor_pos) {
        spans.push(Span::styled(next.to_string(), underlined_dim_bold_style));
        let rest: String = target_chars[session.cursor_pos + 1..].iter().collect();
        spans.push(Span::styled(rest, dim_bold_style));
    }

    spans
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = &app.session else {
        render_message("No lesson loaded", Color::Red, area, buf);
        return;
    };

    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let target = session.target_text();
    let mut prompt_occupied_lines =
        ((target.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16;
    if target.width() <= max_chars_per_line as usize {
        prompt_occupied_lines = 1;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Length(
                    ((area.height.saturating_sub(4) as f64 - prompt_occupied_lines as f64) / 2.0)
                        as u16,
                ),
                Constraint::Length(prompt_occupied_lines),
                Constraint::Min(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(area);

    Paragraph::new(Span::styled(header_line(app), dim_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let prompt = Paragraph::new(Line::from(prompt_spans(session)))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true });
    prompt.render(chunks[2], buf);

    if session.has_started() {
        let stats = &app.stats;
        let live = format!(
            "{} wpm   {}% acc   streak {}   ~{}s left",
            stats.wpm, stats.accuracy, stats.current_streak, stats.estimated_remaining_secs,
        );
        Paragraph::new(Span::styled(live, bold_style))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(
            notice.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = &app.session else {
        render_message("No finished lesson", Color::Red, area, buf);
        return;
    };

    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let magenta_style = Style::default().fg(Color::Magenta);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // problem chars
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let points = wpm_points(session);
    let overall_duration = points.last().map(|p| p.0).unwrap_or(1.0).max(1.0);
    let highest_wpm = points
        .iter()
        .map(|p| p.1)
        .fold(0.0_f64, f64::max)
        .max(1.0)
        .ceil();

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&points)];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, overall_duration])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(format!("{overall_duration:.0}"), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(format!("{highest_wpm:.0}"), bold_style),
                ]),
        );
    chart.render(chunks[0], buf);

    let stats = &app.stats;
    let summary = format!(
        "{} wpm   {}% acc   {} errors   best streak {}   {:.2} sd",
        stats.wpm,
        stats.accuracy,
        session.error_count,
        stats.longest_streak,
        pace_std_dev(session),
    );
    Paragraph::new(Span::styled(summary, bold_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let trouble = app
        .freq
        .top_problem_chars(5)
        .iter()
        .map(|(c, s)| {
            let shown = if *c == ' ' { "space".to_string() } else { c.to_string() };
            format!("{} ({:.0}%)", shown, s.miss_rate() * 100.0)
        })
        .collect::<Vec<_>>()
        .join("  ");
    let trouble_line = if trouble.is_empty() {
        "no trouble keys this run".to_string()
    } else {
        format!("trouble keys: {trouble}")
    };
    Paragraph::new(Span::styled(
        trouble_line,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(n)ext lesson / (r)etry / (p)ractice weak keys / (esc)ape",
        italic_style,
    ))
    .render(chunks[4], buf);
}
