use crate::ui::state::ControllerView;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
    Frame,
};
use std::collections::{HashMap, VecDeque};

const LABEL_WIDTH: u16 = 32;

/// One line per controller: host, total IOPS and a sparkline of its history.
pub fn render_iops_panel(
    frame: &mut Frame,
    area: Rect,
    controllers: &[ControllerView],
    iops_history: &HashMap<String, VecDeque<f64>>,
) {
    let block = Block::default()
        .title(" Controller IOPS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if controllers.is_empty() || inner.height == 0 {
        return;
    }

    let lines = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); controllers.len()])
        .split(inner);

    for (controller, line_area) in controllers.iter().zip(lines.iter()) {
        let label = Line::from(vec![
            Span::styled(
                format!("{:<20}", truncate_str(&controller.host, 20)),
                Style::default().fg(Color::White),
            ),
            Span::raw(format!("{:>10.1} ", controller.total_iops())),
        ]);
        let label_width = LABEL_WIDTH.min(line_area.width);
        let label_area = Rect {
            width: label_width,
            ..*line_area
        };
        frame.render_widget(Paragraph::new(label), label_area);

        let sparkline_width = line_area.width.saturating_sub(label_width) as usize;
        if sparkline_width == 0 {
            continue;
        }
        if let Some(history) = iops_history.get(&controller.host) {
            let start = history.len().saturating_sub(sparkline_width);
            let data: Vec<u64> = history.iter().skip(start).map(|&v| v as u64).collect();
            let sparkline = Sparkline::default()
                .data(&data)
                .style(Style::default().fg(Color::Cyan))
                .bar_set(ratatui::symbols::bar::NINE_LEVELS);
            frame.render_widget(
                sparkline,
                Rect {
                    x: line_area.x + label_width,
                    width: sparkline_width as u16,
                    ..*line_area
                },
            );
        }
    }
}

/// Truncate a string to max_len characters
fn truncate_str(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}
