use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use police_analysis::charts::display_city;
use police_analysis::{CitySummaryRecord, Indicator, PipelineOutput};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::BTreeMap;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Correlation,
    IncomeFatalities,
    CitySummary,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Correlation => Page::IncomeFatalities,
            Page::IncomeFatalities => Page::CitySummary,
            Page::CitySummary => Page::Correlation,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Correlation => Page::CitySummary,
            Page::IncomeFatalities => Page::Correlation,
            Page::CitySummary => Page::IncomeFatalities,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Correlation => "Correlation",
            Page::IncomeFatalities => "Income vs Fatalities",
            Page::CitySummary => "City Summary",
        }
    }
}

pub struct App {
    pub output: PipelineOutput,
    pub city_limit: usize,
    pub state: TableState,
    pub current_page: Page,
}

impl App {
    pub fn new(output: PipelineOutput, city_limit: usize) -> Self {
        let mut state = TableState::default();
        if !output.analysis.city_summary.is_empty() {
            state.select(Some(0));
        }

        Self {
            output,
            city_limit,
            state,
            current_page: Page::Correlation,
        }
    }

    pub fn cities(&self) -> &[CitySummaryRecord] {
        self.output.analysis.top_cities(self.city_limit)
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.cities().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.cities().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.cities().len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().unwrap_or(0);
        self.state.select(Some((i + 20).min(len - 1)));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().unwrap_or(0);
        self.state.select(Some(i.saturating_sub(20)));
    }

    /// Rows and income-bearing rows per encoded manner of death
    pub fn code_counts(&self) -> Vec<(i64, usize, usize)> {
        let mut counts: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
        for p in &self.output.analysis.income_fatalities {
            let entry = counts.entry(p.manner_of_death_encoded).or_insert((0, 0));
            entry.0 += 1;
            if p.median_income.is_some() {
                entry.1 += 1;
            }
        }
        counts.into_iter().map(|(code, (n, with))| (code, n, with)).collect()
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('1') => app.current_page = Page::Correlation,
                KeyCode::Char('2') => app.current_page = Page::IncomeFatalities,
                KeyCode::Char('3') => app.current_page = Page::CitySummary,
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.cities().is_empty() {
                        app.state.select(Some(app.cities().len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Correlation => render_correlation(f, chunks[1], app),
        Page::IncomeFatalities => render_income(f, chunks[1], app),
        Page::CitySummary => render_cities(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Correlation, Page::IncomeFatalities, Page::CitySummary];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    let stats = &app.output.merge_stats;
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Rows: {}", stats.final_rows),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Unmatched: {}", stats.unenriched_rows),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

/// Short column label for the matrix grid
fn abbreviate(name: &str) -> String {
    name.trim_end_matches("_share")
        .replace("high_school_completion", "hs_compl")
        .replace("manner_of_death_encoded", "manner")
        .replace("native_american", "native")
}

fn correlation_color(value: f64) -> Color {
    match value {
        v if v >= 0.5 => Color::Red,
        v if v >= 0.1 => Color::LightRed,
        v if v <= -0.5 => Color::Blue,
        v if v <= -0.1 => Color::LightBlue,
        _ => Color::White,
    }
}

fn render_correlation(f: &mut Frame, area: Rect, app: &App) {
    let matrix = &app.output.analysis.correlation;

    if matrix.is_empty() {
        let empty = Paragraph::new("Correlation matrix is empty - not enough data.")
            .block(Block::default().borders(Borders::ALL).title(" Correlation "));
        f.render_widget(empty, area);
        return;
    }

    let mut header_cells = vec![Cell::from("")];
    header_cells.extend(
        matrix
            .columns
            .iter()
            .map(|c| Cell::from(abbreviate(c)).style(header_style())),
    );
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = matrix.columns.iter().zip(&matrix.values).map(|(name, values)| {
        let mut cells = vec![Cell::from(abbreviate(name)).style(header_style())];
        cells.extend(values.iter().map(|v| match v {
            Some(r) => Cell::from(format!("{:>6.2}", r)).style(Style::default().fg(correlation_color(*r))),
            None => Cell::from("     -").style(Style::default().fg(Color::DarkGray)),
        }));
        Row::new(cells).height(1)
    });

    let mut widths = vec![Constraint::Length(12)];
    widths.extend(matrix.columns.iter().map(|_| Constraint::Length(9)));

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Pearson correlation (pairwise complete) "),
    );

    f.render_widget(table, area);
}

fn render_income(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let describe_rows = app.output.analysis.income_fatalities_summary.iter().map(|s| {
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string());
        Row::new(vec![
            Cell::from(s.column.clone()).style(header_style()),
            Cell::from(s.count.to_string()),
            Cell::from(fmt(s.mean)),
            Cell::from(fmt(s.std)),
            Cell::from(fmt(s.min)),
            Cell::from(fmt(s.median)),
            Cell::from(fmt(s.max)),
        ])
    });

    let describe = Table::new(
        describe_rows,
        [
            Constraint::Length(26),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(
        Row::new(["Column", "Count", "Mean", "Std", "Min", "Median", "Max"])
            .style(header_style().bg(Color::DarkGray)),
    )
    .block(Block::default().borders(Borders::ALL).title(" describe() "));

    f.render_widget(describe, chunks[0]);

    let encoding = &app.output.analysis.encoding;
    let code_rows = app.code_counts().into_iter().map(|(code, rows, with_income)| {
        Row::new(vec![
            Cell::from(code.to_string()),
            Cell::from(encoding.label(code).unwrap_or("?").to_string()),
            Cell::from(rows.to_string()),
            Cell::from(with_income.to_string()),
        ])
    });

    let codes = Table::new(
        code_rows,
        [
            Constraint::Length(6),
            Constraint::Length(32),
            Constraint::Length(10),
            Constraint::Length(14),
        ],
    )
    .header(
        Row::new(["Code", "Manner of death", "Rows", "With income"])
            .style(header_style().bg(Color::DarkGray)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Encoded manner of death "));

    f.render_widget(codes, chunks[1]);
}

fn render_cities(f: &mut Frame, area: Rect, app: &mut App) {
    let mut header_cells = vec![
        Cell::from("City").style(header_style()),
        Cell::from("Σ code").style(header_style()),
    ];
    header_cells.extend(
        Indicator::ALL
            .iter()
            .map(|i| Cell::from(abbreviate(i.name())).style(header_style())),
    );
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .cities()
        .iter()
        .map(|c| {
            let mut cells = vec![
                Cell::from(truncate(&display_city(&c.city), 24)),
                Cell::from(c.total_encoded_fatalities.to_string()),
            ];
            cells.extend(Indicator::ALL.iter().map(|i| match c.mean(*i) {
                Some(v) => Cell::from(format!("{:.1}", v)),
                None => Cell::from("-").style(Style::default().fg(Color::DarkGray)),
            }));
            Row::new(cells).height(1)
        })
        .collect();

    let mut widths = vec![Constraint::Length(26), Constraint::Length(8)];
    widths.extend(Indicator::ALL.iter().map(|_| Constraint::Length(10)));

    let title = format!(" Cities (first {} by name) ", app.cities().len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.cities().len();

    let mut status_spans = vec![Span::styled(
        format!(" City: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("1-3", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Jump | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Fast | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use police_analysis::{analyze, MergeStats, MergedRecord, Value};

    fn app(cities: usize) -> App {
        let records: Vec<MergedRecord> = (0..cities)
            .map(|i| {
                MergedRecord::new(&format!("city{:02}", i), if i % 2 == 0 { "shot" } else { "Unknown" })
                    .with(Indicator::MedianIncome, Value::Number(1000.0 * i as f64))
            })
            .collect();
        let analysis = analyze(&records);
        App::new(
            PipelineOutput {
                records,
                merge_stats: MergeStats::default(),
                analysis,
            },
            10,
        )
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Correlation.next(), Page::IncomeFatalities);
        assert_eq!(Page::CitySummary.next(), Page::Correlation);
        assert_eq!(Page::Correlation.previous(), Page::CitySummary);
    }

    #[test]
    fn test_navigation_wraps_within_limit() {
        let mut app = app(25);
        assert_eq!(app.cities().len(), 10);

        app.previous();
        assert_eq!(app.state.selected(), Some(9));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(9));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_code_counts() {
        let app = app(3);
        // "Unknown" sorts before "shot"
        assert_eq!(app.code_counts(), vec![(0, 1, 1), (1, 2, 2)]);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("cañon", 10), "cañon");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
