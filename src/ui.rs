use anyhow::Result;
use barcode_attendance::{AttendanceSystem, BarcodeDecoder, BarcodeRenderer};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::path::Path;

/// How many past marks to show when the form opens
const RECENT_MARKS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Matric,
    Code,
    ImagePath,
}

impl Field {
    const ALL: [Field; 4] = [Field::Name, Field::Matric, Field::Code, Field::ImagePath];

    pub fn next(&self) -> Self {
        match self {
            Field::Name => Field::Matric,
            Field::Matric => Field::Code,
            Field::Code => Field::ImagePath,
            Field::ImagePath => Field::Name,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Field::Name => Field::ImagePath,
            Field::Matric => Field::Name,
            Field::Code => Field::Matric,
            Field::ImagePath => Field::Code,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Field::Name => "Student Name",
            Field::Matric => "Matric Number",
            Field::Code => "Barcode (12 digits)",
            Field::ImagePath => "Barcode Image",
        }
    }

    fn index(&self) -> usize {
        match self {
            Field::Name => 0,
            Field::Matric => 1,
            Field::Code => 2,
            Field::ImagePath => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Success(String),
    Error(String),
}

/// What the event loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Register,
    Scan,
    Quit,
}

pub struct App {
    pub inputs: [String; 4],
    pub focus: Field,
    pub status: Status,
    /// Attendance log, newest first
    pub marks: Vec<String>,
    session_marks: usize,
}

impl App {
    pub fn new() -> Self {
        Self {
            inputs: Default::default(),
            focus: Field::Name,
            status: Status::Info("Fill in the form and press Enter on the barcode field".to_string()),
            marks: Vec::new(),
            session_marks: 0,
        }
    }

    pub fn input(&self, field: Field) -> &str {
        &self.inputs[field.index()]
    }

    fn input_mut(&mut self, field: Field) -> &mut String {
        &mut self.inputs[field.index()]
    }

    pub fn session_marks(&self) -> usize {
        self.session_marks
    }

    pub fn load_recent<R: BarcodeRenderer, D: BarcodeDecoder>(&mut self, system: &AttendanceSystem<R, D>) {
        match system.recent_marks(RECENT_MARKS) {
            Ok(marks) => self.marks = marks,
            Err(e) => self.status = Status::Error(format!("Could not load attendance log: {}", e)),
        }
    }

    /// Update form state for a key; returns the work the loop should run
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                Action::Continue
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.previous();
                Action::Continue
            }
            KeyCode::Enter => match self.focus {
                Field::Code => Action::Register,
                Field::ImagePath => Action::Scan,
                _ => {
                    self.focus = self.focus.next();
                    Action::Continue
                }
            },
            KeyCode::Backspace => {
                self.input_mut(self.focus).pop();
                Action::Continue
            }
            KeyCode::Char(c) => {
                self.input_mut(self.focus).push(c);
                Action::Continue
            }
            _ => Action::Continue,
        }
    }

    pub fn register<R: BarcodeRenderer, D: BarcodeDecoder>(&mut self, system: &AttendanceSystem<R, D>) {
        let result = system.register(
            self.input(Field::Name),
            self.input(Field::Matric),
            self.input(Field::Code),
        );

        self.status = match result {
            Ok(artifact) => {
                for field in [Field::Name, Field::Matric, Field::Code] {
                    self.input_mut(field).clear();
                }
                self.focus = Field::Name;
                Status::Success(format!(
                    "Barcode {} for {} generated and saved as {}",
                    artifact.full_code,
                    artifact.student.name,
                    artifact.path.display()
                ))
            }
            Err(e) => Status::Error(e.to_string()),
        };
    }

    pub fn scan<R: BarcodeRenderer, D: BarcodeDecoder>(&mut self, system: &AttendanceSystem<R, D>) {
        let path = self.input(Field::ImagePath).trim().to_string();
        if path.is_empty() {
            self.status = Status::Error("Barcode image path is required".to_string());
            return;
        }

        self.status = match system.scan(Path::new(&path)) {
            Ok(result) => {
                self.marks.insert(0, result.summary());
                self.session_marks += 1;
                self.input_mut(Field::ImagePath).clear();
                Status::Success(format!(
                    "Attendance marked for {} ({})",
                    result.name, result.matric_number
                ))
            }
            Err(e) => Status::Error(e.to_string()),
        };
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

pub fn run_ui<R: BarcodeRenderer, D: BarcodeDecoder>(
    app: &mut App,
    system: &AttendanceSystem<R, D>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app, system);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend, R: BarcodeRenderer, D: BarcodeDecoder>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    system: &AttendanceSystem<R, D>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            // Windows reports releases too
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match app.handle_key(key) {
                Action::Quit => return Ok(()),
                Action::Register => app.register(system),
                Action::Scan => app.scan(system),
                Action::Continue => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(6), // Form
            Constraint::Length(3), // Status line
            Constraint::Min(0),    // Attendance log
            Constraint::Length(3), // Key help
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_form(f, chunks[1], app);
    render_status(f, chunks[2], app);
    render_marks(f, chunks[3], app);
    render_help(f, chunks[4]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Barcode Attendance System",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Marked this session: {}", app.session_marks),
            Style::default().fg(Color::Green),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    const LABEL_WIDTH: u16 = 22;

    let lines: Vec<Line> = Field::ALL
        .iter()
        .map(|field| {
            let focused = *field == app.focus;
            let label_style = if focused {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };

            Line::from(vec![
                Span::styled(format!("{:<width$}", field.label(), width = LABEL_WIDTH as usize), label_style),
                Span::raw(app.input(*field).to_string()),
            ])
        })
        .collect();

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Student "),
    );
    f.render_widget(form, area);

    // Cursor at the end of the focused input
    let row = app.focus.index() as u16;
    let col = app.input(app.focus).chars().count() as u16;
    f.set_cursor(area.x + 1 + LABEL_WIDTH + col, area.y + 1 + row);
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let (text, color) = match &app.status {
        Status::Info(msg) => (msg.as_str(), Color::White),
        Status::Success(msg) => (msg.as_str(), Color::Green),
        Status::Error(msg) => (msg.as_str(), Color::Red),
    };

    let status = Paragraph::new(Span::styled(text.to_string(), Style::default().fg(color)))
        .block(Block::default().borders(Borders::ALL).title(" Status "));

    f.render_widget(status, area);
}

fn render_marks(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .marks
        .iter()
        .map(|m| ListItem::new(m.as_str()))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Attendance "),
    );

    f.render_widget(list, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let help = Paragraph::new(Line::from(vec![
        Span::styled("Tab/↑↓", key),
        Span::raw(" Field | "),
        Span::styled("Enter", key),
        Span::raw(" on barcode: Generate, on image: Scan | "),
        Span::styled("Esc", key),
        Span::raw(" Quit"),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, area);
}
