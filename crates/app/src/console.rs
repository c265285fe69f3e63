//! Line-oriented console
//!
//! Participants are addressed by their 1-based position in `show`, which
//! lists them in join order.

use std::io::{self, BufRead, Write};

use chrono::{Local, Utc};
use nightcap_core::{export, CooldownState, Error, Participant, Storage};
use tracing::debug;

use crate::state::AppState;

const HELP: &str = "\
commands:
  login <username>                 log in with an existing account
  register <username> <name...>    create an account and log in
  logout                           forget the account on this device
  join                             add yourself to the session
  add <name...>                    add a guest by name
  drink <n> [delta]                change a tally, delta defaults to +1 (e.g. +0.5, -1)
  remove <n>                       remove a participant
  roll                             roll the dice (leader only, every 15 minutes)
  end                              archive the current session
  new                              archive whatever is current and start over
  history                          list past sessions
  export [n]                       write the current session (or history entry n) as CSV
  stats                            your totals across sessions
  show                             the current session
  status                           login, leader and dice cooldown
  help                             this list
  quit                             leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login(String),
    Register { username: String, display_name: String },
    Logout,
    Join,
    Add(String),
    Drink { index: usize, delta: f64 },
    Remove(usize),
    Roll,
    End,
    New,
    History,
    Export(Option<usize>),
    Stats,
    Show,
    Status,
    Help,
    Quit,
}

fn position(arg: Option<&str>) -> std::result::Result<usize, String> {
    let arg = arg.ok_or("which participant? give their number from `show`")?;
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("not a participant number: {}", arg)),
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> std::result::Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest = words.clone().collect::<Vec<_>>().join(" ");

    let command = match head.to_ascii_lowercase().as_str() {
        "login" => match words.next() {
            Some(username) => Command::Login(username.to_string()),
            None => return Err("usage: login <username>".into()),
        },
        "register" => {
            let username = words.next().ok_or("usage: register <username> <name...>")?;
            let display_name = words.collect::<Vec<_>>().join(" ");
            Command::Register {
                username: username.to_string(),
                display_name,
            }
        }
        "logout" => Command::Logout,
        "join" => Command::Join,
        "add" => Command::Add(rest),
        "drink" => {
            let index = position(words.next())?;
            let delta = match words.next() {
                None => 1.0,
                Some(d) => d
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite())
                    .ok_or_else(|| format!("not a drink amount: {}", d))?,
            };
            Command::Drink { index, delta }
        }
        "remove" | "rm" => Command::Remove(position(words.next())?),
        "roll" => Command::Roll,
        "end" => Command::End,
        "new" => Command::New,
        "history" => Command::History,
        "export" => match words.next() {
            None => Command::Export(None),
            n => Command::Export(Some(position(n)?)),
        },
        "stats" => Command::Stats,
        "show" | "ls" => Command::Show,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command {}, try help", other)),
    };
    Ok(Some(command))
}

/// Read commands until `quit` or end of input
pub fn run<R, I, O>(state: &mut AppState<R>, input: I, mut out: O) -> io::Result<()>
where
    R: Storage,
    I: BufRead,
    O: Write,
{
    writeln!(out, "nightcap: type help for commands")?;
    show(state, &mut out)?;

    for line in input.lines() {
        let line = line?;
        match parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                debug!(?command, "Console command");
                if let Err(e) = execute(state, command, &mut out) {
                    report(&e, &mut out)?;
                }
            }
            Ok(None) => {}
            Err(message) => writeln!(out, "{}", message)?,
        }
        out.flush()?;
    }
    Ok(())
}

fn report<O: Write>(e: &Error, out: &mut O) -> io::Result<()> {
    if e.is_repository_failure() {
        writeln!(out, "Failed to sync data, please try again ({})", e)
    } else {
        writeln!(out, "{}", e)
    }
}

fn participant_at<R: Storage>(
    state: &AppState<R>,
    index: usize,
) -> nightcap_core::Result<Participant> {
    state
        .tracker
        .people()
        .into_iter()
        .nth(index - 1)
        .ok_or_else(|| Error::NotFound(format!("participant {}", index)))
}

fn execute<R: Storage, O: Write>(
    state: &mut AppState<R>,
    command: Command,
    out: &mut O,
) -> nightcap_core::Result<()> {
    match command {
        Command::Login(username) => {
            let user = state.login(&username)?;
            writeln!(out, "Welcome back, {}!", user.display_name)?;
        }
        Command::Register {
            username,
            display_name,
        } => {
            let user = state.register(&username, &display_name)?;
            writeln!(out, "Account {} created, logged in", user.username)?;
        }
        Command::Logout => {
            state.logout()?;
            writeln!(out, "Logged out")?;
        }
        Command::Join => {
            state.tracker.join()?;
            show(state, out)?;
        }
        Command::Add(name) => {
            state.tracker.add_person(&name)?;
            show(state, out)?;
        }
        Command::Drink { index, delta } => {
            let person = participant_at(state, index)?;
            state.tracker.adjust_drinks(person.id, delta)?;
            show(state, out)?;
        }
        Command::Remove(index) => {
            let person = participant_at(state, index)?;
            state.tracker.remove_person(person.id)?;
            writeln!(out, "Removed {}", person.name)?;
        }
        Command::Roll => roll(state, out)?,
        Command::End => {
            state.tracker.end_session()?;
            writeln!(out, "Session ended and archived")?;
        }
        Command::New => {
            state.tracker.start_new_session()?;
            writeln!(out, "Started a new session")?;
        }
        Command::History => {
            state.history = state.tracker.history(state.history_limit)?;
            print_history(state, out)?;
        }
        Command::Export(entry) => {
            let session = match entry {
                None => state
                    .tracker
                    .mirror()
                    .snapshot()
                    .ok_or_else(|| Error::Precondition("nothing to export".into()))?,
                Some(n) => state.history.get(n - 1).cloned().ok_or_else(|| {
                    Error::NotFound(format!("history entry {} (run history first)", n))
                })?,
            };
            let path = export::write_session(&state.export_dir, &session, Utc::now())?;
            writeln!(out, "Wrote {}", path.display())?;
        }
        Command::Stats => {
            let username = state
                .identity()
                .map(|u| u.username.clone())
                .ok_or_else(|| Error::Precondition("log in to view your stats".into()))?;
            let stats = state.tracker.stats(&username)?;
            writeln!(out, "{}", stats)?;
        }
        Command::Show => show(state, out)?,
        Command::Status => status(state, out)?,
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit => {}
    }
    Ok(())
}

fn roll<R: Storage, O: Write>(state: &AppState<R>, out: &mut O) -> nightcap_core::Result<()> {
    let interval = state.frame_interval;
    let mut rng = rand::thread_rng();
    let (roll, _) = state.tracker.roll(&mut rng, |face| {
        let _ = write!(out, "\rrolling... {}", face);
        let _ = out.flush();
        std::thread::sleep(interval);
    })?;
    writeln!(out, "\rRolled a {}!     ", roll.face)?;
    Ok(())
}

fn show<R: Storage, O: Write>(state: &AppState<R>, out: &mut O) -> io::Result<()> {
    let people = state.tracker.people();
    if people.is_empty() {
        return writeln!(out, "No active session. join or add someone to start one.");
    }

    let leader = state.tracker.leader().map(|p| p.id);
    for (i, person) in people.iter().enumerate() {
        let marker = if Some(person.id) == leader { "  (leader)" } else { "" };
        writeln!(
            out,
            "{:>3}. {:<20} {:>5}{}",
            i + 1,
            person.name,
            person.drinks.to_string(),
            marker
        )?;
    }
    Ok(())
}

fn status<R: Storage, O: Write>(state: &AppState<R>, out: &mut O) -> io::Result<()> {
    match state.identity() {
        Some(user) => writeln!(out, "Logged in as {} ({})", user.display_name, user.username)?,
        None => writeln!(out, "Not logged in")?,
    }

    if let Some(leader) = state.tracker.leader() {
        writeln!(out, "Leader: {} with {}", leader.name, leader.drinks)?;
    }

    let cooldown = state.cooldown();
    match cooldown.state {
        CooldownState::Idle => writeln!(out, "Dice: ready"),
        CooldownState::Cooling => {
            let secs = cooldown.remaining.as_secs();
            writeln!(out, "Dice: next roll in {}:{:02}", secs / 60, secs % 60)
        }
    }
}

fn print_history<R, O: Write>(state: &AppState<R>, out: &mut O) -> io::Result<()> {
    if state.history.is_empty() {
        return writeln!(out, "No past sessions");
    }

    for (i, session) in state.history.iter().enumerate() {
        let when = session
            .archived_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let tally = session
            .people
            .iter()
            .map(|p| format!("{} {}", p.name, p.drinks))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "{:>3}. {}  {}", i + 1, when, tally)?;
    }
    Ok(())
}
