use crate::ui::state::{ControllerView, LunRow};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

const HEADERS: [&str; 8] = [
    "Controller",
    "LUN",
    "R IOPS",
    "W IOPS",
    "Read MB/s",
    "Write MB/s",
    "Fwd IOPS",
    "Pool",
];

pub fn render_lun_table(frame: &mut Frame, area: Rect, controllers: &[ControllerView]) {
    let block = Block::default()
        .title(" LUN Statistics ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h).style(header_style)));

    let mut rows = Vec::new();
    for controller in controllers {
        if controller.rows.is_empty() {
            let status = if controller.ready { "no LUNs presented" } else { "starting" };
            rows.push(Row::new(vec![
                Cell::from(controller.host.clone()),
                Cell::from("-"),
                Cell::from(status).style(Style::default().fg(Color::DarkGray)),
            ]));
            continue;
        }
        for row in &controller.rows {
            rows.push(lun_row(&controller.host, row));
        }
    }

    let table = Table::new(
        rows,
        vec![
            Constraint::Length(20), // Controller
            Constraint::Length(5),  // LUN
            Constraint::Length(9),  // R IOPS
            Constraint::Length(9),  // W IOPS
            Constraint::Length(10), // Read MB/s
            Constraint::Length(10), // Write MB/s
            Constraint::Length(9),  // Fwd IOPS
            Constraint::Length(8),  // Pool
        ],
    )
    .header(header)
    .block(block)
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn lun_row<'a>(host: &str, row: &LunRow) -> Row<'a> {
    let pool = match row.pool_state {
        Some(state) if state.0 == 0 => Cell::from("OK").style(Style::default().fg(Color::Green)),
        Some(state) => Cell::from(state.to_string()).style(Style::default().fg(Color::Red)),
        None => Cell::from("?").style(Style::default().fg(Color::DarkGray)),
    };

    let mut cells = vec![Cell::from(host.to_string()), Cell::from(row.lun.to_string())];
    match &row.rates {
        Some(r) => {
            // Highlight LUNs serving forwarded I/O from the peer controller
            let fwd_color = if r.forwarded_iops > 0.1 { Color::Yellow } else { Color::Reset };
            cells.extend([
                Cell::from(format!("{:.1}", r.read_iops)),
                Cell::from(format!("{:.1}", r.write_iops)),
                Cell::from(format!("{:.2}", r.read_mbps)),
                Cell::from(format!("{:.2}", r.write_mbps)),
                Cell::from(format!("{:.1}", r.forwarded_iops))
                    .style(Style::default().fg(fwd_color)),
            ]);
        }
        None => cells.extend((0..5).map(|_| Cell::from("-"))),
    }
    cells.push(pool);
    Row::new(cells)
}
