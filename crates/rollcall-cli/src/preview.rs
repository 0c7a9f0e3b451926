//! Live view for the capture loops.
//!
//! On a terminal, frames are drawn with Unicode half blocks (two pixel rows
//! per cell) on the alternate screen, with the located face outlined.
//! Otherwise a single status line is rewritten in place.

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;
use ratatui::Terminal;
use rollcall_core::{FaceRegion, FrameView};
use std::io::{self, Stdout, Write};

/// Outline colour for the located face.
const FACE_OUTLINE: Color = Color::Rgb(0, 220, 0);

/// Notices kept on screen under the picture.
const NOTICE_LINES: usize = 3;

/// Receives every frame a capture loop pulls.
pub trait LiveView {
    /// Show `view` with `status` under it.
    fn frame(&mut self, view: FrameView<'_>, status: &str) -> io::Result<()>;

    /// An event the operator should see, e.g. a student marked present.
    fn notice(&mut self, line: &str) -> io::Result<()>;

    /// The loop is over; hand the console back to the menu.
    fn close(&mut self) -> io::Result<()>;
}

/// Camera picture drawn in the terminal.
#[derive(Default)]
pub struct TerminalPreview {
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    notices: Vec<String>,
}

impl TerminalPreview {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LiveView for TerminalPreview {
    fn frame(&mut self, view: FrameView<'_>, status: &str) -> io::Result<()> {
        if self.terminal.is_none() {
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            self.terminal = Some(Terminal::new(CrosstermBackend::new(stdout))?);
        }
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };

        let notices = &self.notices;
        terminal.draw(|f| {
            let area = f.area();
            let footer = (notices.len() as u16 + 1).min(area.height);
            let picture = Rect {
                height: area.height - footer,
                ..area
            };
            f.render_widget(FrameWidget { view }, picture);

            let lines = notices.iter().map(String::as_str).chain([status]);
            let buf = f.buffer_mut();
            for (i, line) in lines.enumerate().take(footer as usize) {
                buf.set_string(
                    area.x,
                    area.y + picture.height + i as u16,
                    line,
                    Style::default().fg(Color::White),
                );
            }
        })?;
        Ok(())
    }

    fn notice(&mut self, line: &str) -> io::Result<()> {
        self.notices.push(line.to_string());
        if self.notices.len() > NOTICE_LINES {
            self.notices.remove(0);
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut terminal) = self.terminal.take() {
            execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
            terminal.show_cursor()?;
        }
        self.notices.clear();
        Ok(())
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Fallback when stdout is not a terminal or the preview is disabled.
pub struct ConsoleStatus<W: Write> {
    out: W,
    /// Width of the status line currently on screen, 0 if none.
    shown: usize,
}

impl<W: Write> ConsoleStatus<W> {
    pub fn new(out: W) -> Self {
        Self { out, shown: 0 }
    }
}

impl<W: Write> LiveView for ConsoleStatus<W> {
    fn frame(&mut self, _view: FrameView<'_>, status: &str) -> io::Result<()> {
        write!(self.out, "\r{status:<width$}", width = self.shown)?;
        self.shown = self.shown.max(status.len());
        self.out.flush()
    }

    fn notice(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "\r{line:<width$}", width = self.shown)?;
        self.shown = 0;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.shown > 0 {
            writeln!(self.out)?;
            self.shown = 0;
        }
        self.out.flush()
    }
}

/// Largest `(columns, rows)` that shows a `width` × `height` picture inside
/// `cols` × `rows` cells without distortion, at two pixel rows per cell.
fn fit(width: u32, height: u32, cols: u16, rows: u16) -> (u16, u16) {
    if width == 0 || height == 0 || cols == 0 || rows == 0 {
        return (0, 0);
    }
    let aspect = f64::from(width) / f64::from(height);
    let (avail_w, avail_h) = (f64::from(cols), f64::from(rows) * 2.0);
    let (w, h) = if avail_w / avail_h > aspect {
        (avail_h * aspect, avail_h)
    } else {
        (avail_w, avail_w / aspect)
    };
    ((w as u16).clamp(1, cols), ((h / 2.0) as u16).clamp(1, rows))
}

struct FrameWidget<'a> {
    view: FrameView<'a>,
}

impl FrameWidget<'_> {
    /// Colour of source pixel (`x`, `y`). Pixels within one cell of the face
    /// border are drawn as the outline.
    fn shade(&self, x: u32, y: u32, step_x: u32, step_y: u32) -> Color {
        if let Some(face) = self.view.face {
            if on_outline(face, x, y, step_x, step_y) {
                return FACE_OUTLINE;
            }
        }
        let image = self.view.image;
        let v = image
            .get_pixel(x.min(image.width() - 1), y.min(image.height() - 1))
            .0[0];
        Color::Rgb(v, v, v)
    }
}

fn on_outline(face: FaceRegion, x: u32, y: u32, step_x: u32, step_y: u32) -> bool {
    face.contains(x, y)
        && (x < face.x + step_x
            || x + step_x >= face.x + face.width
            || y < face.y + step_y
            || y + step_y >= face.y + face.height)
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let image = self.view.image;
        let (cols, rows) = fit(image.width(), image.height(), area.width, area.height);
        if cols == 0 || rows == 0 {
            return;
        }

        let left = area.x + (area.width - cols) / 2;
        let top = area.y + (area.height - rows) / 2;
        let scale_x = f64::from(image.width()) / f64::from(cols);
        let scale_y = f64::from(image.height()) / (f64::from(rows) * 2.0);
        let (step_x, step_y) = (scale_x.ceil() as u32, scale_y.ceil() as u32);

        for row in 0..rows {
            for col in 0..cols {
                let x = (f64::from(col) * scale_x) as u32;
                let upper = (f64::from(row) * 2.0 * scale_y) as u32;
                let lower = ((f64::from(row) * 2.0 + 1.0) * scale_y) as u32;

                let Some(cell) = buf.cell_mut((left + col, top + row)) else {
                    continue;
                };
                cell.set_char('▀');
                cell.set_fg(self.shade(x, upper, step_x, step_y));
                cell.set_bg(self.shade(x, lower, step_x, step_y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn render(image: &GrayImage, face: Option<FaceRegion>, cols: u16, rows: u16) -> Buffer {
        let area = Rect::new(0, 0, cols, rows);
        let mut buf = Buffer::empty(area);
        let view = FrameView {
            image,
            face,
            frames: 1,
        };
        FrameWidget { view }.render(area, &mut buf);
        buf
    }

    #[test]
    fn test_fit_keeps_aspect() {
        assert_eq!(fit(640, 480, 80, 24), (64, 24));
        assert_eq!(fit(100, 100, 10, 10), (10, 5));
        assert_eq!(fit(100, 100, 0, 10), (0, 0));
    }

    #[test]
    fn test_render_grayscale_half_blocks() {
        let image = GrayImage::from_fn(10, 10, |_, y| Luma([if y % 2 == 0 { 40 } else { 200 }]));
        let buf = render(&image, None, 10, 5);

        let cell = &buf[(3, 2)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(40, 40, 40));
        assert_eq!(cell.bg, Color::Rgb(200, 200, 200));
    }

    #[test]
    fn test_render_outlines_face() {
        let image = GrayImage::from_pixel(10, 10, Luma([90]));
        let face = FaceRegion { x: 0, y: 0, width: 10, height: 10 };
        let buf = render(&image, Some(face), 10, 5);

        assert_eq!(buf[(0, 0)].fg, FACE_OUTLINE);
        assert_eq!(buf[(9, 2)].fg, FACE_OUTLINE);
        assert_eq!(buf[(5, 2)].fg, Color::Rgb(90, 90, 90));
    }

    #[test]
    fn test_console_status_rewrites_line() {
        let image = GrayImage::new(2, 2);
        let view = FrameView {
            image: &image,
            face: None,
            frames: 1,
        };
        let mut out = Vec::new();
        {
            let mut status = ConsoleStatus::new(&mut out);
            status.frame(view, "Frames: 1").unwrap();
            status.frame(view, "Frames: 2").unwrap();
            status.notice("Alice is present.").unwrap();
            status.frame(view, "Frames: 3").unwrap();
            status.close().unwrap();
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\rFrames: 1\rFrames: 2\rAlice is present.\n\rFrames: 3\n"
        );
    }
}
