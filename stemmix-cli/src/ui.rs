use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};

use crate::controls::StatusSnapshot;

const CONTROLS_HELP: &str = "space=play/pause  p=play  s=stop  ←/→=seek 5s  q=quit\n\
1-9=select stem  m=mute  -/= volume  e=effects  E=eq  r/R reverb  d/D delay  l/L k/K h/H eq bands";

pub fn draw_status(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    status: &StatusSnapshot,
    progress: f64,
    log_lines: &[String],
) {
    let _ = terminal.draw(|f| {
        let status_height = status.text.lines().count() as u16 + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(4),
                Constraint::Length(status_height),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(f.size());

        let title = Paragraph::new("stemmix").style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        f.render_widget(title, chunks[0]);

        let controls = Paragraph::new(CONTROLS_HELP)
            .style(Style::default().fg(Color::Blue))
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(controls, chunks[1]);

        let status_widget = Paragraph::new(status.text.as_str())
            .style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL).title("Playback"));
        f.render_widget(status_widget, chunks[2]);

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Position"))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(progress.clamp(0.0, 1.0));
        f.render_widget(gauge, chunks[3]);

        let log_height = chunks[4].height.saturating_sub(2) as usize;
        let start = log_lines.len().saturating_sub(log_height);
        let log_text = if log_lines.is_empty() {
            "No logs yet.".to_string()
        } else {
            log_lines[start..].join("\n")
        };

        let log_widget = Paragraph::new(log_text)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Logs"));
        f.render_widget(log_widget, chunks[4]);
    });
}
