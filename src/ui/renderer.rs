/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The game is drawn inside a bordered frame whose size follows the
/// configured resolution (see `frame_size`), centered and clipped to the
/// terminal. Modal screens (game over / complete) are boxes drawn over
/// the frozen stage underneath.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::settings::{Resolution, SettingsManager};
use crate::sim::level::{Cell as Tile, Level};
use crate::sim::overworld::{Overworld, LEVEL_NAMES};
use crate::sim::settings_menu::{SettingsMenu, OPTIONS};
use crate::sim::stage::{Progress, StageController, StageKind, StageView};
use crate::ui::hud::Heart;

// ── Palette ──

const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const GREEN: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const CYAN: Color = Color::Rgb { r: 100, g: 200, b: 255 };
const RED: Color = Color::Rgb { r: 255, g: 60, b: 60 };
const PINK: Color = Color::Rgb { r: 255, g: 140, b: 200 };
const BORDER: Color = Color::Rgb { r: 90, g: 90, b: 130 };
const CURSOR_BG: Color = Color::Rgb { r: 30, g: 60, b: 30 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const MODAL_BG: Color = Color::Rgb { r: 40, g: 40, b: 55 };

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Style {
    Plain,
    Bold,
    Dim,
    Struck,
}

impl Style {
    fn attribute(self) -> Option<Attribute> {
        match self {
            Style::Plain => None,
            Style::Bold => Some(Attribute::Bold),
            Style::Dim => Some(Attribute::Dim),
            Style::Struck => Some(Attribute::CrossedOut),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
    style: Style,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the gap
    /// between rows matches the cells on VTE-based terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG, style: Style::Plain };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta, style: Style::Plain };

    fn new(ch: char, fg: Color, bg: Color, style: Style) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg, style }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }
}

// ── Frame geometry ──

/// Frame size in terminal cells for a resolution (16x24 px per cell).
///
/// ┌─────────────┬─────────┐
/// │ Resolution  │ Cells   │
/// ├─────────────┼─────────┤
/// │ 800x600     │ 50x25   │
/// │ 1024x768    │ 64x32   │
/// │ 1280x720    │ 80x30   │
/// │ 1920x1080   │ 120x45  │
/// └─────────────┴─────────┘
pub fn frame_size(res: Resolution) -> (usize, usize) {
    ((res.width() / 16) as usize, (res.height() / 24) as usize)
}

/// The drawing area: a clipped rectangle of the front buffer.
#[derive(Clone, Copy, Debug)]
struct Frame {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Frame {
    /// Inner columns (inside the border).
    fn inner_w(&self) -> usize {
        self.w.saturating_sub(2)
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_state: Option<(StageKind, Resolution)>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_state: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            SetAttribute(Attribute::Reset),
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, ctl: &StageController) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Stage or resolution change → clear for a clean transition
        let state = (ctl.state(), ctl.settings().resolution());
        if self.last_state != Some(state) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_state = Some(state);
        }

        self.compose(ctl);
        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    /// Build the whole front buffer for the controller's current state.
    fn compose(&mut self, ctl: &StageController) {
        self.front.clear();
        let frame = self.frame_for(ctl.settings().resolution());
        self.compose_border(frame);
        self.compose_hud(frame, ctl.progress());

        match ctl.stage_view() {
            StageView::Overworld(ow) => self.compose_overworld(frame, ow, ctl.progress()),
            StageView::Level(level) => self.compose_level(frame, level),
            StageView::Settings(menu) => self.compose_settings(frame, menu, ctl.settings()),
        }

        match ctl.state() {
            StageKind::GameOver => self.compose_game_over(frame, ctl.progress()),
            StageKind::GameComplete => self.compose_game_complete(frame, ctl.progress()),
            _ => {
                if let Some(msg) = ctl.text().current() {
                    self.compose_message(frame, msg);
                }
            }
        }
    }

    fn frame_for(&self, res: Resolution) -> Frame {
        let (w, h) = frame_size(res);
        let w = w.min(self.term_w);
        let h = h.min(self.term_h);
        Frame {
            x: (self.term_w - w) / 2,
            y: (self.term_h - h) / 2,
            w,
            h,
        }
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut last_style = Style::Plain;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Set explicit base colors at start of frame.
        // Do NOT use ResetColor here: the terminal default may differ from BASE_BG.
        queue!(
            self.writer,
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                if cell.style != last_style {
                    // Attribute::Reset also resets colors; re-emit them.
                    queue!(
                        self.writer,
                        SetAttribute(Attribute::Reset),
                        SetForegroundColor(cell.fg),
                        SetBackgroundColor(cell.bg),
                    )?;
                    if let Some(attr) = cell.style.attribute() {
                        queue!(self.writer, SetAttribute(attr))?;
                    }
                    last_style = cell.style;
                    last_fg = cell.fg;
                    last_bg = cell.bg;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Drawing primitives (frame-relative, clipped to the frame) ──

    fn put(&mut self, f: Frame, col: usize, row: usize, cell: Cell) {
        if col < f.w && row < f.h {
            self.front.set(f.x + col, f.y + row, cell);
        }
    }

    fn put_str(&mut self, f: Frame, col: usize, row: usize, s: &str, fg: Color, bg: Color, style: Style) {
        for (i, ch) in s.chars().enumerate() {
            // Leave the right border alone.
            if col + i + 1 >= f.w {
                break;
            }
            self.put(f, col + i, row, Cell::new(ch, fg, bg, style));
        }
    }

    fn fill_row(&mut self, f: Frame, row: usize, from: usize, to: usize, bg: Color) {
        for col in from..to {
            self.put(f, col, row, Cell::new(' ', Color::White, bg, Style::Plain));
        }
    }

    fn compose_border(&mut self, f: Frame) {
        if f.w < 2 || f.h < 2 {
            return;
        }
        let c = |ch| Cell::new(ch, BORDER, Color::Reset, Style::Plain);
        for col in 1..f.w - 1 {
            self.put(f, col, 0, c('─'));
            self.put(f, col, f.h - 1, c('─'));
        }
        for row in 1..f.h - 1 {
            self.put(f, 0, row, c('│'));
            self.put(f, f.w - 1, row, c('│'));
        }
        self.put(f, 0, 0, c('┌'));
        self.put(f, f.w - 1, 0, c('┐'));
        self.put(f, 0, f.h - 1, c('└'));
        self.put(f, f.w - 1, f.h - 1, c('┘'));
    }

    // ── Compose: build front buffer content ──

    /// Title on the left, hearts and the coin counter on the right.
    fn compose_hud(&mut self, f: Frame, progress: &Progress) {
        self.put_str(f, 2, 1, "Lonely Kitten", GOLD, Color::Reset, Style::Bold);

        let hud = progress.sink();
        let hearts = hud.hearts();
        let extra = match hud.extra_hearts() {
            0 => String::new(),
            n => format!("+{}", n),
        };
        let coins = hud.visible_coins().map(|c| format!("  $ {}", c)).unwrap_or_default();
        let width = hearts.len() + extra.len() + coins.chars().count();
        let mut col = f.inner_w().saturating_sub(width);

        for heart in hearts {
            let cell = match heart {
                Heart::Full => Cell::new('♥', RED, Color::Reset, Style::Plain),
                Heart::Empty => Cell::new('♡', Color::DarkGrey, Color::Reset, Style::Plain),
                Heart::Bonus => Cell::new('♥', PINK, Color::Reset, Style::Bold),
            };
            self.put(f, col, 1, cell);
            col += 1;
        }
        self.put_str(f, col, 1, &extra, PINK, Color::Reset, Style::Bold);
        col += extra.len();
        self.put_str(f, col, 1, &coins, GOLD, Color::Reset, Style::Plain);
    }

    fn compose_overworld(&mut self, f: Frame, ow: &Overworld, progress: &Progress) {
        self.put_str(f, 4, 3, "LEVEL SELECT", GOLD, Color::Reset, Style::Bold);

        let unlocked = progress.unlocked_level();
        let top = 5;
        let rows = LEVEL_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let style = if i < unlocked {
                    Style::Struck
                } else if i > unlocked {
                    Style::Dim
                } else {
                    Style::Plain
                };
                let label = if i > unlocked {
                    format!("{}. {}  (locked)", i + 1, name)
                } else {
                    format!("{}. {}", i + 1, name)
                };
                (label, style)
            })
            .chain([
                ("Settings".to_string(), Style::Plain),
                ("Level Times".to_string(), Style::Plain),
            ]);

        for (i, (label, style)) in rows.enumerate() {
            let row = top + i;
            let selected = i == ow.selection();
            let (fg, bg) = if selected { (GREEN, CURSOR_BG) } else { (Color::White, Color::Reset) };
            if selected {
                self.fill_row(f, row, 2, f.inner_w(), CURSOR_BG);
                self.put_str(f, 3, row, "▸", GREEN, CURSOR_BG, Style::Bold);
            }
            let fg = if style == Style::Dim { Color::DarkGrey } else { fg };
            self.put_str(f, 5, row, &label, fg, bg, style);
        }

        let mut row = top + LEVEL_NAMES.len() + 3;
        if ow.search_active() {
            let field = format!("Search time: {}_", ow.search_input());
            self.put_str(f, 4, row, &field, CYAN, Color::Reset, Style::Plain);
            row += 1;
        }
        if let Some(line) = ow.leaderboard_line(progress.records()) {
            let width = f.inner_w().saturating_sub(6).max(1);
            for chunk in wrap(&line, width) {
                self.put_str(f, 4, row, &chunk, Color::White, Color::Reset, Style::Plain);
                row += 1;
            }
        }

        let help = if ow.search_active() {
            "0-9 . type   Enter search   Esc cancel"
        } else {
            "↑↓ select   Enter choose   F fastest   Q quit"
        };
        self.put_str(f, 2, f.h.saturating_sub(2), help, Color::DarkGrey, Color::Reset, Style::Plain);
    }

    fn compose_level(&mut self, f: Frame, level: &Level) {
        let name = LEVEL_NAMES.get(level.index()).copied().unwrap_or("?");
        let title = format!("Level {}: {}", level.index() + 1, name);
        self.put_str(f, 4, 3, &title, GOLD, Color::Reset, Style::Bold);
        let time = format!("Time {:.1}s", level.elapsed().as_secs_f64());
        self.put_str(f, 4, 4, &time, Color::White, Color::Reset, Style::Plain);

        // Camera: keep the kitten a third of the way in.
        let view = f.inner_w().saturating_sub(4);
        let course = level.course();
        let pos = level.position();
        let start = pos.saturating_sub(view / 3).min(course.len().saturating_sub(view));
        let ground = f.h / 2 + 1;

        for (i, tile) in course.iter().skip(start).take(view).enumerate() {
            let col = 3 + i;
            let cell = match tile {
                Tile::Floor => Cell::new('_', Color::DarkGrey, Color::Reset, Style::Plain),
                Tile::Coin => Cell::new('$', GOLD, Color::Reset, Style::Bold),
                Tile::Gem => Cell::new('◆', CYAN, Color::Reset, Style::Bold),
                Tile::Spike => Cell::new('▲', RED, Color::Reset, Style::Plain),
                Tile::Flag => Cell::new('⚑', GREEN, Color::Reset, Style::Bold),
            };
            self.put(f, col, ground, cell);
        }

        // The kitten blinks while invulnerable.
        let kitten_row = if level.is_airborne() { ground.saturating_sub(2) } else { ground - 1 };
        let kitten_fg = if level.is_invulnerable() { Color::DarkGrey } else { Color::White };
        self.put(f, 3 + pos - start, kitten_row, Cell::new('@', kitten_fg, Color::Reset, Style::Bold));

        let help = "←→ run   Space jump   Tab settings   Esc give up";
        self.put_str(f, 2, f.h.saturating_sub(2), help, Color::DarkGrey, Color::Reset, Style::Plain);
    }

    fn compose_settings(&mut self, f: Frame, menu: &SettingsMenu, settings: &SettingsManager) {
        self.put_str(f, 4, 3, "SETTINGS", GOLD, Color::Reset, Style::Bold);

        for (i, option) in OPTIONS.iter().enumerate() {
            let row = 5 + i;
            let label = option.display(settings);
            if i == menu.selection() {
                self.fill_row(f, row, 2, f.inner_w(), CURSOR_BG);
                self.put_str(f, 3, row, "▸", GREEN, CURSOR_BG, Style::Bold);
                self.put_str(f, 5, row, &label, GREEN, CURSOR_BG, Style::Bold);
            } else {
                self.put_str(f, 5, row, &label, Color::White, Color::Reset, Style::Plain);
            }
        }

        let help = "↑↓ select   ←→ adjust   Enter toggle   Esc back";
        self.put_str(f, 2, f.h.saturating_sub(2), help, Color::DarkGrey, Color::Reset, Style::Plain);
    }

    /// One-line banner above the help row.
    fn compose_message(&mut self, f: Frame, msg: &str) {
        let row = f.h.saturating_sub(3);
        self.fill_row(f, row, 1, f.w.saturating_sub(1), MSG_BG);
        self.put_str(f, 2, row, msg, Color::Black, MSG_BG, Style::Plain);
    }

    fn compose_modal(&mut self, f: Frame, lines: &[(String, Color)]) {
        let box_w = lines.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0) + 6;
        let box_h = lines.len() + 2;
        let bx = f.w.saturating_sub(box_w) / 2;
        let by = f.h.saturating_sub(box_h) / 2;

        for row in by..by + box_h {
            self.fill_row(f, row, bx, bx + box_w, MODAL_BG);
        }
        for (i, (line, fg)) in lines.iter().enumerate() {
            let style = if i == 0 { Style::Bold } else { Style::Plain };
            self.put_str(f, bx + 3, by + 1 + i, line, *fg, MODAL_BG, style);
        }
    }

    fn compose_game_over(&mut self, f: Frame, progress: &Progress) {
        let lines = [
            ("GAME OVER".to_string(), RED),
            (String::new(), Color::White),
            (format!("Levels cleared: {}", progress.unlocked_level()), Color::White),
            (String::new(), Color::White),
            ("Enter: start over   Q: quit".to_string(), GREEN),
        ];
        self.compose_modal(f, &lines);
    }

    fn compose_game_complete(&mut self, f: Frame, progress: &Progress) {
        let best = progress
            .records()
            .iter()
            .map(|r| r.time)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))));
        let best = best.map(|t| format!("Best time: {:.2}s", t)).unwrap_or_default();
        let lines = [
            ("YOU MADE IT HOME!".to_string(), GOLD),
            (String::new(), Color::White),
            (format!("All {} levels cleared", LEVEL_NAMES.len()), GREEN),
            (best, Color::White),
            (String::new(), Color::White),
            ("Enter: exit".to_string(), GREEN),
        ];
        self.compose_modal(f, &lines);
    }
}

/// Break `s` into chunks of at most `width` chars, at ", " where possible.
fn wrap(s: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    for (i, part) in s.split(", ").enumerate() {
        let piece = if i == 0 { part.to_string() } else { format!(", {}", part) };
        if !line.is_empty() && line.chars().count() + piece.chars().count() > width {
            out.push(std::mem::take(&mut line));
            line.push_str(piece.trim_start_matches(", "));
        } else {
            line.push_str(&piece);
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
    out.into_iter()
        .flat_map(|l| {
            let chars: Vec<char> = l.chars().collect();
            chars.chunks(width).map(|c| c.iter().collect::<String>()).collect::<Vec<_>>()
        })
        .collect()
}
