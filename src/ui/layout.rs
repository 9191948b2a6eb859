use {
    super::{
        app::DashboardFrame,
        renderer::{bar_heights, format_amount, format_created_at, share_bar},
    },
    crate::{
        aggregation::{AddressBreakdown, AddressLabel, BlockShare},
        bridge::ConnectionStatus,
        store::StoreView,
    },
    ratatui::{
        layout::{Constraint, Direction, Layout as RatLayout, Rect},
        style::{Color, Modifier, Style},
        text::{Line, Span},
        widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Row, Table},
        Frame,
    },
};

/// Render the main UI layout
pub fn render_layout(f: &mut Frame, area: Rect, frame: &DashboardFrame, view: &StoreView) {
    let chunks = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Filter bar
            Constraint::Min(0),    // Table + charts
            Constraint::Length(3), // Status
        ])
        .split(area);

    render_header(f, chunks[0]);
    render_filter_bar(f, chunks[1], frame);

    let main = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);
    render_transfers_table(f, main[0], frame);

    let charts = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main[1]);
    render_block_totals(f, charts[0], frame);

    match (&frame.aggregates.address_breakdown, &frame.aggregates.block_shares) {
        (Some(breakdown), _) => render_address_breakdown(f, charts[1], breakdown),
        (None, Some(shares)) => render_block_shares(f, charts[1], shares),
        (None, None) => {
            let hint = Paragraph::new("Type a full block number to see its senders")
                .block(Block::default().borders(Borders::ALL).title("Senders"));
            f.render_widget(hint, charts[1]);
        }
    }

    render_footer(f, chunks[3], frame, view);
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Block::default()
        .borders(Borders::ALL)
        .title("RUTA Dashboard - ERC-20 Transfers");

    let text = vec![Line::from(vec![
        Span::styled("RUTA Dashboard", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("  q/Esc quit | s sort | 0-9 block | c clear | l live | r reload"),
    ])];

    f.render_widget(Paragraph::new(text).block(header), area);
}

fn render_filter_bar(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    let input = if frame.block_input.is_empty() {
        Span::styled("(all blocks)", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(frame.block_input.clone(), Style::default().fg(Color::Yellow))
    };

    let mut spans = vec![
        Span::styled("Block: ", Style::default().fg(Color::Cyan)),
        input,
        Span::raw(" | "),
        Span::styled("Sort: ", Style::default().fg(Color::Cyan)),
        Span::raw(frame.criteria.sort.as_str()),
    ];
    if let Some(error) = &frame.filter_error {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(error.to_string(), Style::default().fg(Color::Red)));
    }

    let bar = Block::default().borders(Borders::ALL).title("Filter");
    f.render_widget(Paragraph::new(Line::from(spans)).block(bar), area);
}

fn render_transfers_table(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    let header = Row::new(vec!["Block", "Time", "From", "To", "Amount"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let label = AddressLabel::DEFAULT;
    let rows: Vec<Row> = frame
        .rows
        .iter()
        .map(|transfer| {
            Row::new(vec![
                transfer.block_number.to_string(),
                format_created_at(transfer),
                label.apply(&transfer.from_address),
                label.apply(&transfer.to_address),
                transfer.amount.clone(),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(10), // Block
        Constraint::Length(9),  // Time
        Constraint::Length(16), // From
        Constraint::Length(16), // To
        Constraint::Min(10),    // Amount
    ];

    let title = format!("Transfers ({} of {})", frame.rows.len(), frame.matching);
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(table, area);
}

fn render_block_totals(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    let totals = &frame.aggregates.block_totals;
    let heights = bar_heights(totals);

    let bars: Vec<Bar> = totals
        .iter()
        .zip(heights)
        .map(|(total, height)| {
            Bar::default()
                .value(height)
                .label(Line::from(total.block_number.to_string()))
                .text_value(format_amount(&total.total))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Amount per Block"))
        .data(BarGroup::default().bars(&bars))
        .bar_width(12)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, area);
}

fn render_block_shares(f: &mut Frame, area: Rect, shares: &[BlockShare]) {
    let lines: Vec<Line> = shares
        .iter()
        .map(|share| {
            Line::from(vec![
                Span::styled(format!("{:>10} ", share.block_number), Style::default().fg(Color::Cyan)),
                Span::raw(share_bar(share.share, 20)),
                Span::raw(format!(" {:5.1}% ({})", share.share * 100.0, share.count)),
            ])
        })
        .collect();

    let block = Block::default().borders(Borders::ALL).title("Transfers per Block");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_address_breakdown(f: &mut Frame, area: Rect, breakdown: &AddressBreakdown) {
    let header = Row::new(vec!["Sender", "Total"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = breakdown
        .totals
        .iter()
        .map(|total| Row::new(vec![total.display_address(), format_amount(&total.total)]))
        .collect();

    let title = format!("Senders in Block {}", breakdown.block_number);
    let table = Table::new(rows, [Constraint::Length(16), Constraint::Min(10)])
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect, frame: &DashboardFrame, view: &StoreView) {
    let status_color = match view.connection {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Reconnecting => Color::Yellow,
        ConnectionStatus::Disconnected => Color::Red,
    };
    let live = if view.subscription.is_live() { "ON" } else { "OFF" };
    let last_block = view
        .last_block
        .map(|b| b.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut spans = vec![
        Span::styled("Status: ", Style::default().fg(status_color)),
        Span::raw(view.connection.as_str()),
        Span::raw(" | "),
        Span::styled("Live Updates ", Style::default().fg(Color::Cyan)),
        Span::raw(live),
        Span::raw(" | "),
        Span::styled("Last Block: ", Style::default().fg(Color::Cyan)),
        Span::raw(last_block),
        Span::raw(" | "),
        Span::styled("Transfers: ", Style::default().fg(Color::Cyan)),
        Span::raw(view.transfers.len().to_string()),
    ];

    let malformed = view.malformed_events + frame.aggregates.malformed_amounts as u64;
    if malformed > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("Malformed: {}", malformed),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(error) = &view.last_error {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(error.to_string(), Style::default().fg(Color::Red)));
    }

    let footer = Block::default().borders(Borders::ALL).title("Status");
    f.render_widget(Paragraph::new(Line::from(spans)).block(footer), area);
}
