//! Interactive test in the terminal

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::*;

use earcheck::procedure::{CalibrationStep, TestPhase};
use earcheck_app::app::{ControllerHandle, ControllerOptions, Stage, TestCommand, TestSnapshot};
use earcheck_app::config::messages::INACTIVITY_NUDGE;

use crate::report_view::report_lines;

/// Frontend-only state
struct App {
    /// Quit was pressed once while leaving would lose progress
    confirm_exit: bool,
    running: bool,
}

/// Map a key press to a controller command for the current stage
fn command_for(stage: Stage, code: KeyCode) -> Option<TestCommand> {
    match (stage, code) {
        (Stage::Welcome, KeyCode::Enter) => Some(TestCommand::Start),
        (Stage::ResumePrompt, KeyCode::Char('r')) => Some(TestCommand::Resume),
        (Stage::ResumePrompt, KeyCode::Char('n')) => Some(TestCommand::StartFresh),
        (Stage::Calibrating, KeyCode::Char(' ')) => Some(TestCommand::ToggleCalibrationTone),
        (Stage::Calibrating, KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('=')) => {
            Some(TestCommand::RaiseLevel)
        }
        (Stage::Calibrating, KeyCode::Down | KeyCode::Char('-')) => Some(TestCommand::LowerLevel),
        (Stage::Calibrating, KeyCode::Enter) => Some(TestCommand::ConfirmLevel),
        (Stage::Testing, KeyCode::Char(' ') | KeyCode::Char('p')) => Some(TestCommand::PlayTone),
        (Stage::Testing, KeyCode::Char('y') | KeyCode::Right) => {
            Some(TestCommand::Respond { heard: true })
        }
        (Stage::Testing, KeyCode::Char('n') | KeyCode::Left) => {
            Some(TestCommand::Respond { heard: false })
        }
        (Stage::Results, KeyCode::Char('r')) => Some(TestCommand::Restart),
        _ => None,
    }
}

/// Raw mode and the alternate screen, undone on drop
struct TerminalGuard {
    #[cfg(unix)]
    _stderr: StderrSilencer,
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        // Audio backends write diagnostics to stderr, which would corrupt the display
        #[cfg(unix)]
        let stderr = StderrSilencer::new()?;
        terminal::enable_raw_mode()?;
        let guard = Self {
            #[cfg(unix)]
            _stderr: stderr,
        };
        io::stdout().execute(EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

/// Points fd 2 at /dev/null until dropped
#[cfg(unix)]
struct StderrSilencer {
    saved: i32,
}

#[cfg(unix)]
impl StderrSilencer {
    fn new() -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let devnull = std::fs::File::open("/dev/null")?;
        let saved = unsafe { libc::dup(2) };
        if saved < 0 {
            return Err(io::Error::last_os_error());
        }
        unsafe { libc::dup2(devnull.as_raw_fd(), 2) };
        Ok(Self { saved })
    }
}

#[cfg(unix)]
impl Drop for StderrSilencer {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved, 2);
            libc::close(self.saved);
        }
    }
}

pub fn run(options: ControllerOptions) -> Result<(), Box<dyn std::error::Error>> {
    // Declared first so it drops last, after the controller has released the device
    let guard = TerminalGuard::enter()?;
    let controller = ControllerHandle::spawn(options)?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(33);
    let mut app = App {
        confirm_exit: false,
        running: true,
    };

    while app.running {
        let snapshot = controller.snapshot();
        terminal.draw(|f| draw_ui(f, &snapshot, &app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        if snapshot.exit_warning.is_some() && !app.confirm_exit {
                            app.confirm_exit = true;
                        } else {
                            app.running = false;
                        }
                    }
                    code => {
                        app.confirm_exit = false;
                        if let Some(cmd) = command_for(snapshot.stage, code) {
                            controller.send(cmd);
                        }
                    }
                }
            }
        }
    }

    controller.shutdown();
    drop(guard);
    Ok(())
}

fn label(text: &str) -> Span<'_> {
    Span::styled(text, Style::default().fg(Color::DarkGray))
}

fn boxed(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray))
}

fn draw_ui(f: &mut Frame, snapshot: &TestSnapshot, app: &App) {
    let area = f.area();

    let outer = Block::default()
        .title(format!(" Earcheck v{} ", env!("CARGO_PKG_VERSION")))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::vertical([
        Constraint::Min(8),    // stage body
        Constraint::Length(3), // messages
        Constraint::Length(1), // help bar
    ])
    .split(inner);

    match snapshot.stage {
        Stage::Welcome => draw_welcome(f, snapshot, chunks[0]),
        Stage::ResumePrompt => draw_resume(f, snapshot, chunks[0]),
        Stage::Calibrating => draw_calibration(f, snapshot, chunks[0]),
        Stage::Preparing => draw_waiting(f, "Preparing your test...", chunks[0]),
        Stage::Testing => draw_testing(f, snapshot, chunks[0]),
        Stage::Processing => draw_waiting(f, "Analysing your responses...", chunks[0]),
        Stage::Results => draw_results(f, snapshot, chunks[0]),
    }
    draw_messages(f, snapshot, app, chunks[1]);
    draw_help(f, snapshot.stage, chunks[2]);
}

fn draw_welcome(f: &mut Frame, snapshot: &TestSnapshot, area: Rect) {
    let mut text = vec![
        Line::from(Span::styled(
            "  Hearing screening",
            Style::default().fg(Color::White).bold(),
        )),
        Line::raw(""),
        Line::raw("  Put on headphones and find a quiet room."),
        Line::raw("  First you set a comfortable reference level for each ear,"),
        Line::raw("  then you answer whether you heard a series of short beeps."),
        Line::raw(""),
        Line::raw("  This is a screening, not a medical diagnosis."),
    ];
    if let Some(err) = &snapshot.last_error {
        text.push(Line::raw(""));
        text.push(Line::from(Span::styled(
            format!("  {}", err),
            Style::default().fg(Color::Red),
        )));
    }
    f.render_widget(Paragraph::new(text).block(boxed("Welcome")), area);
}

fn draw_resume(f: &mut Frame, snapshot: &TestSnapshot, area: Rect) {
    let progress = snapshot
        .resume_offer
        .map(|o| format!("  {} of {} tones completed.", o.progress_index, o.total))
        .unwrap_or_default();
    let text = vec![
        Line::raw("  You have an unfinished assessment."),
        Line::raw(progress),
        Line::raw(""),
        Line::raw("  Press 'r' to resume or 'n' to start over."),
    ];
    f.render_widget(Paragraph::new(text).block(boxed("Welcome back")), area);
}

fn draw_calibration(f: &mut Frame, snapshot: &TestSnapshot, area: Rect) {
    let Some(view) = snapshot.calibration else {
        return;
    };
    let ear = match view.step {
        CalibrationStep::LeftEar => "Left ear",
        CalibrationStep::RightEar => "Right ear",
        _ => "",
    };
    let tone = if view.tone_playing { "playing" } else { "off" };
    let text = vec![
        Line::from(vec![
            label("  Ear: "),
            Span::styled(ear, Style::default().fg(Color::White).bold()),
        ]),
        Line::from(vec![
            label("  Reference tone: "),
            Span::styled(
                tone,
                Style::default().fg(if view.tone_playing {
                    Color::Green
                } else {
                    Color::DarkGray
                }),
            ),
        ]),
        Line::from(vec![
            label("  Level: "),
            Span::styled(
                format!("{} dB HL", view.level_db),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::raw(""),
        Line::raw("  Adjust until the tone is clearly audible but comfortable."),
    ];
    f.render_widget(Paragraph::new(text).block(boxed("Calibration")), area);
}

fn draw_waiting(f: &mut Frame, message: &str, area: Rect) {
    let text = Line::from(Span::styled(
        format!("  {}", message),
        Style::default().fg(Color::Yellow),
    ));
    f.render_widget(Paragraph::new(text).block(boxed("Please wait")), area);
}

fn draw_testing(f: &mut Frame, snapshot: &TestSnapshot, area: Rect) {
    let Some(engine) = &snapshot.engine else {
        return;
    };
    let rows = Layout::vertical([Constraint::Length(3), Constraint::Min(4)]).split(area);

    let progress = engine.progress;
    let gauge = Gauge::default()
        .block(boxed("Progress"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(u16::from(progress.percent()))
        .label(format!(
            "{}/{}  about {}s left",
            progress.completed, progress.total, progress.estimated_secs_remaining
        ));
    f.render_widget(gauge, rows[0]);

    let stimulus = engine
        .stimulus
        .map(|s| s.to_string())
        .unwrap_or_default();
    let state = if let Some(n) = snapshot.countdown {
        format!("Get ready... {}", n)
    } else if snapshot.tone_playing {
        "Listen...".to_string()
    } else if snapshot.transitioning {
        String::new()
    } else {
        match engine.phase {
            TestPhase::AwaitingResponse => "Did you hear the tone?".to_string(),
            TestPhase::Idle if !engine.tone_played => "Press play when ready".to_string(),
            _ => String::new(),
        }
    };
    let text = vec![
        Line::from(vec![
            label("  Now testing: "),
            Span::styled(stimulus, Style::default().fg(Color::White).bold()),
        ]),
        Line::raw(""),
        Line::from(Span::styled(
            format!("  {}", state),
            Style::default().fg(Color::Yellow),
        )),
    ];
    f.render_widget(Paragraph::new(text).block(boxed("Test")), rows[1]);
}

fn draw_results(f: &mut Frame, snapshot: &TestSnapshot, area: Rect) {
    let lines: Vec<Line> = snapshot
        .report
        .as_ref()
        .map(|r| report_lines(r).into_iter().map(Line::raw).collect())
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(lines)
            .block(boxed("Your results"))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_messages(f: &mut Frame, snapshot: &TestSnapshot, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if app.confirm_exit {
        if let Some(text) = snapshot.exit_warning {
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", text), Style::default().fg(Color::Red)),
                Span::styled("Press 'q' again to quit.", Style::default().fg(Color::Red).bold()),
            ]));
        }
    }
    if let Some(text) = &snapshot.warning {
        lines.push(Line::from(Span::styled(
            format!("  {}", text),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(text) = &snapshot.milestone {
        lines.push(Line::from(Span::styled(
            format!("  {}", text),
            Style::default().fg(Color::Green),
        )));
    }
    if snapshot.inactivity_nudge {
        lines.push(Line::from(Span::styled(
            format!("  {}", INACTIVITY_NUDGE),
            Style::default().fg(Color::Yellow),
        )));
    }
    if !snapshot.audio_available {
        lines.push(Line::from(Span::styled(
            "  Audio output unavailable; press any key to retry.",
            Style::default().fg(Color::Red),
        )));
    }
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_help(f: &mut Frame, stage: Stage, area: Rect) {
    let keys: &[(&str, &str)] = match stage {
        Stage::Welcome => &[("Enter", "start")],
        Stage::ResumePrompt => &[("r", "resume"), ("n", "start over")],
        Stage::Calibrating => &[
            ("Space", "tone on/off"),
            ("Up/Down", "level"),
            ("Enter", "confirm"),
        ],
        Stage::Testing => &[("Space", "play"), ("y", "heard"), ("n", "not heard")],
        Stage::Results => &[("r", "restart")],
        Stage::Preparing | Stage::Processing => &[],
    };
    let mut spans = Vec::new();
    for (key, action) in keys.iter().chain(&[("q", "quit")]) {
        spans.push(Span::styled(
            format!("  '{}' ", key),
            Style::default().fg(Color::Yellow),
        ));
        spans.push(Span::raw(format!("{}  |", action)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
