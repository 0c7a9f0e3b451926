//! Interactive numbered menu driving the registry and attendance sessions.

use crate::feed::FrameFeed;
use crate::interrupt::Interrupt;
use crate::preview::LiveView;
use image::GrayImage;
use rollcall_core::{
    validate_name, AttendanceSession, CaptureOutcome, FaceCapture, FaceLocator, Registry,
    RegistryError, SessionEvent, Upsert,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

const NO_STUDENTS: &str = "No students registered. Please register students first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Register,
    MarkAttendance,
    Update,
    Delete,
    View,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::Register),
            "2" => Ok(Self::MarkAttendance),
            "3" => Ok(Self::Update),
            "4" => Ok(Self::Delete),
            "5" => Ok(Self::View),
            "6" => Ok(Self::Exit),
            _ => Err(()),
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Result of one face capture from the operator's point of view.
enum Grab {
    Face(GrayImage),
    Cancelled,
    Failed,
}

struct Console<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// Print `text` and read one trimmed line; `None` at end of input.
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.out, "{text}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

/// Everything the menu operates on: the registry plus camera, detector and
/// session settings.
pub struct Station<F, L> {
    registry: Registry,
    feed: F,
    locator: L,
    live: Box<dyn LiveView>,
    interrupt: Interrupt,
    log_path: PathBuf,
    threshold: f64,
}

impl<F: FrameFeed, L: FaceLocator> Station<F, L> {
    pub fn new(
        registry: Registry,
        feed: F,
        locator: L,
        live: Box<dyn LiveView>,
        interrupt: Interrupt,
        log_path: PathBuf,
        threshold: f64,
    ) -> Self {
        Self {
            registry,
            feed,
            locator,
            live,
            interrupt,
            log_path,
            threshold,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the menu until "Exit" is chosen or input ends.
    pub fn run_menu<R: BufRead, W: Write>(&mut self, input: R, out: W) -> io::Result<()> {
        let mut console = Console { input, out };
        loop {
            writeln!(console.out)?;
            writeln!(console.out, "--- Face Attendance ---")?;
            writeln!(console.out, "1. Register Students")?;
            writeln!(console.out, "2. Mark Attendance")?;
            writeln!(console.out, "3. Update Student Face")?;
            writeln!(console.out, "4. Delete Student Face")?;
            writeln!(console.out, "5. View Registered Students")?;
            writeln!(console.out, "6. Exit")?;

            let Some(line) = console.prompt("Enter your choice: ")? else {
                writeln!(console.out)?;
                return Ok(());
            };
            let Ok(choice) = line.parse::<MenuChoice>() else {
                writeln!(console.out, "Invalid choice. Try again.")?;
                continue;
            };
            tracing::debug!(?choice, "menu choice");

            let flow = match choice {
                MenuChoice::Register => self.register(&mut console)?,
                MenuChoice::MarkAttendance => self.mark_attendance(&mut console)?,
                MenuChoice::Update => self.update(&mut console)?,
                MenuChoice::Delete => self.delete(&mut console)?,
                MenuChoice::View => self.view(&mut console)?,
                MenuChoice::Exit => {
                    writeln!(console.out, "Exiting...")?;
                    Flow::Exit
                }
            };
            if let Flow::Exit = flow {
                return Ok(());
            }
        }
    }

    fn register<R: BufRead, W: Write>(&mut self, console: &mut Console<R, W>) -> io::Result<Flow> {
        let Some(line) = console.prompt("Enter number of students to register: ")? else {
            return Ok(Flow::Exit);
        };
        let Ok(count) = line.parse::<usize>() else {
            writeln!(console.out, "Invalid number.")?;
            return Ok(Flow::Continue);
        };

        for i in 0..count {
            let Some(raw) = console.prompt(&format!("Enter name of student {}: ", i + 1))? else {
                return Ok(Flow::Exit);
            };
            let name = match validate_name(&raw) {
                Ok(name) => name.to_string(),
                Err(e) => {
                    writeln!(console.out, "{e}")?;
                    continue;
                }
            };

            writeln!(console.out, "Look at the camera, {name}. Press Ctrl+C to cancel.")?;
            match self.capture_face()? {
                Grab::Face(face) => match self.registry.register(&name, &face) {
                    Ok(Upsert::Added) => {
                        writeln!(console.out, "Captured and saved face for {name}.")?
                    }
                    Ok(Upsert::Replaced) => {
                        writeln!(console.out, "Captured and replaced face for {name}.")?
                    }
                    Err(e) => report(&e),
                },
                Grab::Cancelled => {
                    writeln!(console.out, "Registration cancelled for {name}.")?;
                    break;
                }
                Grab::Failed => break,
            }
        }
        Ok(Flow::Continue)
    }

    fn mark_attendance<R: BufRead, W: Write>(
        &mut self,
        console: &mut Console<R, W>,
    ) -> io::Result<Flow> {
        if self.registry.is_empty() {
            writeln!(console.out, "{NO_STUDENTS}")?;
            return Ok(Flow::Continue);
        }

        let guard = self.interrupt.arm();
        // Open the camera before the previous log gets truncated.
        let mut source = match self.feed.open() {
            Ok(source) => source,
            Err(e) => {
                report(&e);
                return Ok(Flow::Continue);
            }
        };
        let session = match AttendanceSession::start(&self.registry, &self.log_path, self.threshold)
        {
            Ok(session) => session,
            Err(e) => {
                report(&e);
                return Ok(Flow::Continue);
            }
        };

        writeln!(console.out, "Marking attendance. Press Ctrl+C to stop.")?;
        let live = &mut self.live;
        let result = session.run(
            source.as_mut(),
            &mut self.locator,
            guard.token(),
            |event| match event {
                SessionEvent::Present(hit) => {
                    shown(live.notice(&format!("{} is present.", hit.name)));
                }
                SessionEvent::Frame { view, present } => {
                    let status = format!(
                        "Frames: {}  Present: {present}  (Ctrl+C to stop)",
                        view.frames
                    );
                    shown(live.frame(view, &status));
                }
            },
        );
        self.live.close()?;

        match result {
            Ok(summary) => {
                for entry in &summary.present {
                    tracing::debug!(name = %entry.name, at = %entry.marked_at, "present");
                }
                writeln!(
                    console.out,
                    "Attendance saved to {} ({} present).",
                    summary.log_path.display(),
                    summary.present.len()
                )?;
            }
            Err(e) => report(&e),
        }
        Ok(Flow::Continue)
    }

    fn update<R: BufRead, W: Write>(&mut self, console: &mut Console<R, W>) -> io::Result<Flow> {
        if self.registry.is_empty() {
            writeln!(console.out, "{NO_STUDENTS}")?;
            return Ok(Flow::Continue);
        }
        let Some(name) = console.prompt("Enter the name of the student to update face: ")? else {
            return Ok(Flow::Exit);
        };
        if !self.registry.contains(&name) {
            writeln!(console.out, "Student not found.")?;
            return Ok(Flow::Continue);
        }

        writeln!(console.out, "Look at the camera, {name}. Press Ctrl+C to cancel.")?;
        match self.capture_face()? {
            Grab::Face(face) => match self.registry.update(&name, &face) {
                Ok(()) => writeln!(console.out, "Updated face for {name}.")?,
                Err(e) => report(&e),
            },
            Grab::Cancelled => writeln!(console.out, "Update cancelled for {name}.")?,
            Grab::Failed => {}
        }
        Ok(Flow::Continue)
    }

    fn delete<R: BufRead, W: Write>(&mut self, console: &mut Console<R, W>) -> io::Result<Flow> {
        if self.registry.is_empty() {
            writeln!(console.out, "{NO_STUDENTS}")?;
            return Ok(Flow::Continue);
        }
        let Some(name) = console.prompt("Enter the name of the student to delete face: ")? else {
            return Ok(Flow::Exit);
        };

        match self.registry.remove(&name) {
            Ok(_) => writeln!(console.out, "Deleted face for {name}.")?,
            Err(RegistryError::NotFound(_)) => writeln!(console.out, "Student not found.")?,
            Err(e) => report(&e),
        }
        Ok(Flow::Continue)
    }

    fn view<R: BufRead, W: Write>(&mut self, console: &mut Console<R, W>) -> io::Result<Flow> {
        if self.registry.is_empty() {
            writeln!(console.out, "No students registered yet.")?;
            return Ok(Flow::Continue);
        }
        writeln!(console.out, "Registered Students:")?;
        for name in self.registry.names() {
            writeln!(console.out, "{name}")?;
        }
        Ok(Flow::Continue)
    }

    /// Pull frames until a face shows up or Ctrl+C is pressed.
    fn capture_face(&mut self) -> io::Result<Grab> {
        let guard = self.interrupt.arm();
        let mut source = match self.feed.open() {
            Ok(source) => source,
            Err(e) => {
                report(&e);
                return Ok(Grab::Failed);
            }
        };

        let live = &mut self.live;
        let result = FaceCapture::new().run(
            source.as_mut(),
            &mut self.locator,
            guard.token(),
            |view| {
                let status = format!(
                    "Searching for a face... {} frames  (Ctrl+C to cancel)",
                    view.frames
                );
                shown(live.frame(view, &status));
            },
        );
        self.live.close()?;

        Ok(match result {
            Ok(CaptureOutcome::Captured(face)) => Grab::Face(face),
            Ok(CaptureOutcome::Cancelled) => Grab::Cancelled,
            Err(e) => {
                report(&e);
                Grab::Failed
            }
        })
    }
}

/// A failed redraw is not worth stopping the loop for.
fn shown(result: io::Result<()>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "live view update failed");
    }
}

/// Report an operation failure on the error stream; the menu carries on.
fn report(err: &dyn std::error::Error) {
    tracing::error!(error = %err, "operation failed");
    eprintln!("Error: {err}");
}
