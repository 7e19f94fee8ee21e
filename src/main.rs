use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, stdout},
    time::{Duration, Instant},
};

use blockfall::game::{Game, PieceKind, Snapshot, TickInput};

// ============================================================================
// Visual Constants
// ============================================================================

const CELL_WIDTH: u16 = 2;
const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = "  ";
const FRAME_MS: u64 = 33;

// ============================================================================
// Color Mapping
// ============================================================================

fn piece_color(kind: PieceKind) -> Color {
    match kind {
        PieceKind::T => Color::Magenta,
        PieceKind::O => Color::Yellow,
        PieceKind::J => Color::Blue,
        PieceKind::L => Color::Rgb(255, 165, 0),
        PieceKind::I => Color::Cyan,
        PieceKind::Z => Color::Red,
        PieceKind::S => Color::Green,
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, snapshot: &Snapshot) {
    let area = frame.size();
    render_game(frame, snapshot, area);
    if snapshot.game_over {
        render_game_over(frame, snapshot, area);
    }
}

fn render_game(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let board_display_width = (snapshot.width as u16 * CELL_WIDTH) + 2;
    let board_display_height = snapshot.height as u16 + 2;
    let preview_width = 12;
    let info_width = 14;
    let total_width = board_display_width + preview_width + info_width + 4;
    let total_height = board_display_height + 3;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(board_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let game_row = vertical[0];

    // Layout: [Board][Next][Info]
    let horizontal = Layout::horizontal([
        Constraint::Length(board_display_width),
        Constraint::Length(preview_width),
        Constraint::Length(info_width),
    ])
    .split(game_row);

    render_board(frame, snapshot, horizontal[0]);
    render_preview(frame, snapshot, horizontal[1]);
    render_info(frame, snapshot, horizontal[2]);

    let controls_area = Rect {
        x: area.x,
        y: game_row.y + game_row.height,
        width: area.width,
        height: 2,
    };

    if controls_area.y + 1 < area.height {
        let controls = Paragraph::new(vec![Line::from(
            "←→/AD: Move | ↓/S: Soft Drop | ↑/W: Rotate | Space: Hard Drop | R: Restart | Q/ESC: Quit",
        )])
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(controls, controls_area);
    }
}

fn render_board(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Blockfall ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();

    for y in 0..snapshot.height {
        // Freshly cleared rows flash white for a moment.
        if snapshot.highlights.iter().any(|h| h.row == y) {
            lines.push(Line::from(Span::styled(
                BLOCK_CHAR.repeat(snapshot.width),
                Style::default().fg(Color::White),
            )));
            continue;
        }

        let mut spans: Vec<Span> = Vec::new();
        for x in 0..snapshot.width {
            let active = snapshot
                .active
                .iter()
                .find(|s| s.x == x as i32 && s.y == y as i32);
            let (symbol, style) = if let Some(square) = active {
                (BLOCK_CHAR, Style::default().fg(piece_color(square.kind)))
            } else {
                match snapshot.cells[y][x] {
                    None => (EMPTY_CHAR, Style::default()),
                    Some(kind) => (BLOCK_CHAR, Style::default().fg(piece_color(kind))),
                }
            };
            spans.push(Span::styled(symbol, style));
        }
        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    frame.render_widget(paragraph, inner);
}

fn render_preview(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Preview squares come in spawn coordinates; normalize to the panel.
    let min_x = snapshot.preview.iter().map(|s| s.x).min().unwrap_or(0);
    let min_y = snapshot.preview.iter().map(|s| s.y).min().unwrap_or(0);
    let max_y = snapshot.preview.iter().map(|s| s.y).max().unwrap_or(0);
    let color = piece_color(snapshot.preview[0].kind);

    let mut lines: Vec<Line> = vec![Line::from("")];
    for y in min_y..=max_y {
        let mut spans: Vec<Span> = Vec::new();
        spans.push(Span::raw(" "));
        for x in 0i32..4i32 {
            if snapshot
                .preview
                .iter()
                .any(|s| s.x - min_x == x && s.y == y)
            {
                spans.push(Span::styled(BLOCK_CHAR, Style::default().fg(color)));
            } else {
                spans.push(Span::raw(EMPTY_CHAR));
            }
        }
        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    frame.render_widget(paragraph, inner);
}

fn render_info(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(format!("{}", snapshot.score)),
        Line::from(""),
        Line::from(Span::styled("Lines", Style::default().fg(Color::Cyan))),
        Line::from(format!("{}", snapshot.lines)),
        Line::from(""),
        Line::from(Span::styled("Level", Style::default().fg(Color::Green))),
        Line::from(format!("{}", snapshot.level)),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_game_over(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Score: {}", snapshot.score)),
        Line::from(format!("Lines: {}", snapshot.lines)),
        Line::from(format!("Level: {}", snapshot.level)),
        Line::from(""),
        Line::from(Span::styled(
            "R: restart, ESC: quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    let popup_area = centered_rect(24, 12, area);
    frame.render_widget(paragraph, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Main Loop
// ============================================================================

fn main() -> io::Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut game = Game::new();
    let mut last_tick = Instant::now();

    loop {
        let snapshot = game.snapshot();
        terminal.draw(|frame| render(frame, &snapshot))?;

        // Drain pending key events into a single intent for this tick.
        // Held movement keys repeat through terminal auto-repeat.
        let mut input = TickInput::default();
        let mut quit = false;
        if event::poll(Duration::from_millis(FRAME_MS))? {
            loop {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => quit = true,
                            KeyCode::Char('r') | KeyCode::Char('R') => {
                                game = Game::new();
                                last_tick = Instant::now();
                                input = TickInput::default();
                            }
                            KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => {
                                input.move_x = -1;
                            }
                            KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => {
                                input.move_x = 1;
                            }
                            KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => {
                                input.move_y = 1;
                            }
                            KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => {
                                input.rotate = true;
                            }
                            KeyCode::Char(' ') => {
                                input.hard_drop = true;
                            }
                            _ => {}
                        }
                    }
                }
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }
        if quit {
            break;
        }

        let now = Instant::now();
        game.advance(input, now - last_tick);
        last_tick = now;
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
