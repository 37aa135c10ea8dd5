use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap},
};
use yki_types::session::{AnswerReview, ExamPhase};
use yki_types::{FullTest, PlaybackState, PlaybackStatus, Question, TestLevel, TestPart};

use super::app::{App, question_rows};

const OPTION_LETTERS: [char; 4] = ['a', 'b', 'c', 'd'];

pub(crate) fn draw(f: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(f.area());

    let level = app
        .session
        .level()
        .map(|l| format!("{} ({})", l.as_str(), l.cefr_range()))
        .unwrap_or_else(|| "-".into());
    let header = Paragraph::new(Line::from(vec![
        Span::styled("YKI-harjoituskoe", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  taso: {level}")),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let titles: Vec<String> = TestPart::ORDER
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", i + 1, p.title()))
        .collect();
    let in_progress = app.session.phase() == &ExamPhase::InProgress;
    let highlight = if in_progress {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let tabs = Tabs::new(titles)
        .select(app.session.active_part().index())
        .highlight_style(highlight)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(tabs, chunks[1]);

    match app.session.phase().clone() {
        ExamPhase::SelectingLevel => draw_levels(f, app, chunks[2]),
        ExamPhase::Generating(level) => {
            let body = Paragraph::new(vec![
                Line::from(format!("Luodaan {} koetta...", level.as_str())),
                Line::from(""),
                Line::from("Tämä voi kestää hetken."),
            ])
            .block(Block::default().borders(Borders::ALL).title("Odota"));
            f.render_widget(body, chunks[2]);
        }
        ExamPhase::InProgress => draw_part(f, app, chunks[2]),
    }

    let submit_label = if app.session.is_submitted() {
        "UUSI KOE"
    } else {
        "PALAUTA"
    };
    let keys = match app.session.phase() {
        ExamPhase::InProgress if app.editing => "kirjoita | Enter rivinvaihto | Esc valmis".to_string(),
        ExamPhase::InProgress => format!(
            "keys: 1-4/Tab osio | ↑/↓ valitse | a-d vastaa | p toista | Enter kirjoita | s {submit_label} | l logs | q quit"
        ),
        _ => "keys: ↑/↓ valitse | Enter aloita | l logs | q quit".to_string(),
    };
    let footer = Paragraph::new(vec![
        Line::from(format!(
            "ääni: {} | {}",
            playback_label(&app.playback),
            app.status
        )),
        Line::from(keys),
    ])
    .block(Block::default().borders(Borders::TOP));
    f.render_widget(footer, chunks[3]);

    if let Some(notice) = app.session.notice() {
        let area = centered_rect(50, 20, f.area());
        f.render_widget(Clear, area);
        let popup = Paragraph::new(vec![
            Line::from(notice.to_string()),
            Line::from(""),
            Line::from("Enter / Esc sulkee"),
        ])
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Virhe"));
        f.render_widget(popup, area);
    }

    if app.logs_open {
        let area = centered_rect(90, 80, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Logs (Esc to close, ↑/↓ scroll)");
        let inner = block.inner(area);
        let height = inner.height as usize;
        let end = app.logs.len().saturating_sub(app.logs_scroll);
        let start = end.saturating_sub(height);
        let mut items: Vec<ListItem> = app
            .logs
            .iter()
            .skip(start)
            .take(end - start)
            .map(|line| ListItem::new(line.clone()))
            .collect();
        if items.is_empty() {
            items.push(ListItem::new("<no logs>"));
        }
        f.render_widget(List::new(items).block(block), area);
    }
}

fn draw_levels(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = TestLevel::ALL
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let marker = if i == app.level_cursor { "▶ " } else { "  " };
            ListItem::new(vec![
                Line::from(Span::styled(
                    format!("{marker}{} {} ({})", i + 1, level.as_str(), level.cefr_range()),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(format!("    {}", level.description())),
            ])
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Valitse taso"));
    f.render_widget(list, area);
}

fn draw_part(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let Some(test) = app.session.test() else {
        return;
    };
    let part = app.session.active_part();
    let (lines, focus_line) = match part {
        TestPart::Reading | TestPart::Listening => part_lines_mc(app, test, part),
        TestPart::Writing => writing_lines(app, test),
        TestPart::Speaking => speaking_lines(app, test),
    };
    let height = area.height.saturating_sub(2) as usize;
    let scroll = focus_line.saturating_sub(height / 3) as u16;
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(part.title()));
    f.render_widget(body, area);
}

fn bold(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        text.into(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn part_lines_mc(app: &App, test: &FullTest, part: TestPart) -> (Vec<Line<'static>>, usize) {
    let mut lines = Vec::new();
    let mut focus = 0;
    let mut last_task = None;
    for (row, (task_idx, question)) in question_rows(test, part).into_iter().enumerate() {
        if last_task != Some(task_idx) {
            last_task = Some(task_idx);
            if !lines.is_empty() {
                lines.push(Line::from(""));
            }
            task_header(app, test, part, task_idx, &mut lines);
        }
        if row == app.item_cursor {
            focus = lines.len();
        }
        question_lines(app, part, question, row == app.item_cursor, &mut lines);
    }
    (lines, focus)
}

fn task_header(
    app: &App,
    test: &FullTest,
    part: TestPart,
    task_idx: usize,
    lines: &mut Vec<Line<'static>>,
) {
    match part {
        TestPart::Reading => {
            let Some(task) = test.reading.get(task_idx) else {
                return;
            };
            lines.push(bold(format!("Tehtävä {}: {}", task_idx + 1, task.title)));
            lines.push(Line::from(task.text.clone()));
            lines.push(Line::from(""));
        }
        TestPart::Listening => {
            let Some(task) = test.listening.get(task_idx) else {
                return;
            };
            let here = app.playing_task == Some(task_idx);
            let state = if here {
                playback_label(&app.playback)
            } else {
                "Valmis".to_string()
            };
            let button = if here && app.playback.state == PlaybackState::Playing {
                "■ Pysäytä"
            } else {
                "▶ Toista"
            };
            lines.push(bold(format!("Ääniraita {}", task_idx + 1)));
            lines.push(Line::from(format!("[{button}]  {state}")));
            if app.session.is_submitted() {
                lines.push(Line::from(Span::styled(
                    format!("Litterointi: {}", task.transcript),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            lines.push(Line::from(""));
        }
        TestPart::Writing | TestPart::Speaking => {}
    }
}

fn question_lines(
    app: &App,
    part: TestPart,
    question: &Question,
    selected: bool,
    lines: &mut Vec<Line<'static>>,
) {
    let marker = if selected { "▶ " } else { "  " };
    lines.push(bold(format!("{marker}{}", question.text)));
    let chosen = app.session.answers().choice(part, &question.id);
    for (i, option) in question.options().iter().enumerate() {
        let letter = OPTION_LETTERS.get(i).copied().unwrap_or(' ');
        let picked = chosen == Some(option.as_str());
        let mut style = Style::default();
        if app.session.is_submitted() && *option == question.correct_answer {
            style = style.fg(Color::Green);
        } else if picked {
            style = style.fg(Color::Magenta);
        }
        let check = if picked { "x" } else { " " };
        lines.push(Line::from(Span::styled(
            format!("    [{check}] {letter}) {option}"),
            style,
        )));
    }
    if app.session.is_submitted() {
        let verdict = match app.session.review(part, question) {
            AnswerReview::Correct => Span::styled("    Oikein", Style::default().fg(Color::Green)),
            AnswerReview::Incorrect { correct, .. } => Span::styled(
                format!("    Väärin. Oikea vastaus: {correct}"),
                Style::default().fg(Color::Red),
            ),
            AnswerReview::Unanswered { correct } => Span::styled(
                format!("    Ei vastausta. Oikea vastaus: {correct}"),
                Style::default().fg(Color::Yellow),
            ),
        };
        lines.push(Line::from(verdict));
    }
}

fn writing_lines(app: &App, test: &FullTest) -> (Vec<Line<'static>>, usize) {
    let mut lines = Vec::new();
    let mut focus = 0;
    for (i, task) in test.writing.iter().enumerate() {
        let selected = i == app.item_cursor;
        if selected {
            focus = lines.len();
        }
        if i > 0 {
            lines.push(Line::from(""));
        }
        let marker = if selected { "▶ " } else { "  " };
        lines.push(bold(format!("{marker}Tehtävä {}: {}", i + 1, task.prompt)));
        lines.push(Line::from(Span::styled(
            task.context.clone(),
            Style::default().fg(Color::DarkGray),
        )));
        let text = app
            .session
            .answers()
            .writing
            .get(i)
            .cloned()
            .unwrap_or_default();
        let editing = selected && app.editing;
        let answer_lines: Vec<&str> = if text.is_empty() { vec![""] } else { text.split('\n').collect() };
        let last = answer_lines.len() - 1;
        for (n, line) in answer_lines.iter().enumerate() {
            let cursor = if editing && n == last { "█" } else { "" };
            lines.push(Line::from(format!("  │ {line}{cursor}")));
        }
        lines.push(Line::from(format!(
            "  {} merkkiä",
            app.session.character_count(i)
        )));
        if app.session.is_submitted() {
            lines.push(bold("  Mallivastaus:"));
            for line in task.sample_model_answer.lines() {
                lines.push(Line::from(Span::styled(
                    format!("  {line}"),
                    Style::default().fg(Color::Green),
                )));
            }
        }
    }
    (lines, focus)
}

fn speaking_lines(app: &App, test: &FullTest) -> (Vec<Line<'static>>, usize) {
    let mut lines = Vec::new();
    let mut focus = 0;
    for (i, task) in test.speaking.iter().enumerate() {
        let selected = i == app.item_cursor;
        if selected {
            focus = lines.len();
        }
        if i > 0 {
            lines.push(Line::from(""));
        }
        let marker = if selected { "▶ " } else { "  " };
        lines.push(bold(format!("{marker}Tehtävä {}: {}", i + 1, task.prompt)));
        lines.push(Line::from(format!("  Tilanne: {}", task.context)));
    }
    (lines, focus)
}

/// Short playback state for the status line.
pub(crate) fn playback_label(status: &PlaybackStatus) -> String {
    match status.state {
        PlaybackState::Idle => "Valmis".to_string(),
        PlaybackState::Loading => {
            "Ladataan... Äänen valmistelu voi kestää hetken...".to_string()
        }
        PlaybackState::Playing => match (status.elapsed_ms, status.duration_ms) {
            (Some(elapsed), Some(total)) if total > 0 => format!(
                "Toistetaan... {} / {}",
                format_duration_ms(elapsed.min(total)),
                format_duration_ms(total)
            ),
            _ => "Toistetaan...".to_string(),
        },
    }
}

fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
