use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::{cursor, execute, terminal};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use groovebox::app::{App, Command, Config, Outcome};
use groovebox::engine::Engine;
use groovebox::host::Host;
use groovebox::params::ParamTarget;
use groovebox::state::Store;
use groovebox::pattern::{Track, NUM_STEPS};
use groovebox::state;

#[cfg(debug_assertions)]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

const LOG_FILE: &str = "groovebox.log";
const TICK: Duration = Duration::from_millis(30);
const STEP_KEYS: [char; NUM_STEPS] = [
    'q', 'w', 'e', 'r', 't', 'y', 'u', 'i', 'a', 's', 'd', 'f', 'g', 'h', 'j', 'k',
];

enum Action {
    Run(Command),
    Save,
    Load,
    Select(Track),
    SelectParam(isize),
    Quit,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Logs go to a file, the terminal is in raw mode.
    let log = File::create(LOG_FILE)?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log))
        .with_ansi(false)
        .init();

    let (app_control, engine_control) = state::controls();
    let host = Host::new(Engine::new(engine_control))?;
    let mut app = App::new(app_control, Box::new(host), Config::default());

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;

    let targets = app.store().targets();
    let mut selected = Track::Kick;
    let mut param = 0;
    let mut message =
        String::from("space: play  1-4: track  q..k: steps  R C S L E  [ ]: param  +/-: nudge  esc: quit");
    loop {
        draw(&mut stdout, &app, selected, &targets, param, &message)?;
        app.take(Command::Tick)?;
        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let result = match handle_key(key.code, selected, &targets[param]) {
            Some(Action::Quit) => break,
            Some(Action::Select(track)) => {
                selected = track;
                Ok(Outcome::None)
            }
            Some(Action::SelectParam(offset)) => {
                param = (param as isize + offset).rem_euclid(targets.len() as isize) as usize;
                Ok(Outcome::None)
            }
            Some(Action::Save) => {
                let path = app.config().state_file.clone();
                app.save_to(&path).map(|_| Outcome::Saved(path.to_string()))
            }
            Some(Action::Load) => {
                let path = app.config().state_file.clone();
                app.load_from(&path).map(|_| Outcome::None)
            }
            Some(Action::Run(command)) => app.take(command),
            None => continue,
        };
        message = match result {
            Ok(Outcome::Saved(path)) => format!("saved {}", path),
            Ok(Outcome::Recording(path)) => format!("recording to {}", path),
            Ok(Outcome::Exported(path)) => format!("exported {}", path),
            Ok(Outcome::None) => message,
            Err(e) => format!("error: {:#}", e),
        };
    }

    execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen)?;
    Ok(())
}

fn handle_key(code: KeyCode, selected: Track, param: &ParamTarget) -> Option<Action> {
    let nudge = |amount| Some(Action::Run(Command::NudgeParam(param.clone(), amount)));
    match code {
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(' ') => Some(Action::Run(Command::TogglePlay)),
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            Some(Action::Select(Track::ALL[index]))
        }
        KeyCode::Char('R') => Some(Action::Run(Command::Randomize)),
        KeyCode::Char('C') => Some(Action::Run(Command::Clear)),
        KeyCode::Char('S') => Some(Action::Save),
        KeyCode::Char('L') => Some(Action::Load),
        KeyCode::Char('E') => Some(Action::Run(Command::ExportAudio)),
        KeyCode::Char('[') => Some(Action::SelectParam(-1)),
        KeyCode::Char(']') => Some(Action::SelectParam(1)),
        KeyCode::Char('+') | KeyCode::Char('=') => nudge(0.1),
        KeyCode::Char('-') => nudge(-0.1),
        KeyCode::Char(c) => STEP_KEYS
            .iter()
            .position(|&k| k == c)
            .map(|step| Action::Run(Command::ToggleStep(selected, step))),
        _ => None,
    }
}

fn draw(
    out: &mut impl Write,
    app: &App,
    selected: Track,
    targets: &[ParamTarget],
    param: usize,
    message: &str,
) -> Result<()> {
    let store = app.store();
    execute!(
        out,
        cursor::MoveTo(0, 0),
        terminal::Clear(terminal::ClearType::All)
    )?;

    let state = if store.is_playing() { "playing" } else { "stopped" };
    let rec = if app.is_recording() { " REC" } else { "" };
    write!(
        out,
        "groovebox  {:.0} bpm  swing {:.2}  {}{}\r\n\r\n",
        store.bpm(),
        store.swing(),
        state,
        rec
    )?;

    let playing = store.playing_step();
    for track in Track::ALL {
        let marker = if track == selected { '>' } else { ' ' };
        write!(out, "{} {:<6}", marker, track)?;
        for (step, active) in store.pattern.row(track).iter().enumerate() {
            let cell = match (*active, playing == Some(step)) {
                (true, true) => '#',
                (true, false) => 'x',
                (false, true) => '|',
                (false, false) => '.',
            };
            let gap = if step % 4 == 0 { " " } else { "" };
            write!(out, "{}{}", gap, cell)?;
        }
        write!(out, "\r\n")?;
    }
    write!(out, "\r\n")?;
    draw_params(out, store, targets, param)?;
    write!(out, "\r\n{}\r\n", message)?;
    out.flush()?;
    Ok(())
}

fn draw_params(out: &mut impl Write, store: &Store, targets: &[ParamTarget], selected: usize) -> Result<()> {
    for (i, target) in targets.iter().enumerate() {
        let param = store.param(target)?;
        let marker = if i == selected { '>' } else { ' ' };
        write!(out, "{} {:<16}{:>10}\r\n", marker, param.label(), param.value_as_string())?;
    }
    Ok(())
}

struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
