use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Utc;
use colored::Colorize;
use hr_core::core::{Candidate, CandidateId, InterviewSession};

use crate::commands::{
    build_weights, export_session, parse_weight, write_ranking, write_session, ExportFormat,
};
use crate::context::AppContext;

const HELP: &str = "\
Commands (fields separated by '|'):
  new <name> | <interviewer> [| metric, metric...]   start a session
  open <name>                                        load a saved session
  add <name> | <position> [| years] [| email]        add a candidate
  score <candidate> | <metric> | <value>             set a metric score
  overall <candidate> | <score or -> [| feedback]    set overall score and feedback
  remove <candidate>                                 drop a candidate
  list                                               show the roster
  rank [metric=weight, ...]                          rank the roster
  save                                               persist the session
  export <csv|json> <path>                           export the session
  close                                              close without saving
  delete                                             delete the session
  help                                               this text
  quit                                               leave the shell
<candidate> is an id, an id prefix or an exact name.";

#[derive(Clone, Debug, PartialEq)]
pub enum ShellCommand {
    Help,
    New {
        name: String,
        interviewer: String,
        metrics: Vec<String>,
    },
    Open(String),
    Add {
        name: String,
        position: String,
        experience: Option<f64>,
        email: Option<String>,
    },
    Score {
        candidate: String,
        metric: String,
        value: f64,
    },
    Overall {
        candidate: String,
        score: Option<f64>,
        feedback: Option<String>,
    },
    Remove(String),
    List,
    Rank(Vec<(String, f64)>),
    Save,
    Export {
        format: ExportFormat,
        path: PathBuf,
    },
    Close,
    Delete,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn fields(rest: &str) -> Vec<&str> {
    rest.split('|')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

fn number(raw: &str, what: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{what} must be a number, got '{raw}'"))
}

/// Parses one input line. Blank lines are `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let f = fields(rest);

    let command = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        "list" | "ls" => ShellCommand::List,
        "save" => ShellCommand::Save,
        "close" => ShellCommand::Close,
        "delete" => ShellCommand::Delete,
        "new" => match f.as_slice() {
            [name, interviewer, rest @ ..] => ShellCommand::New {
                name: (*name).to_owned(),
                interviewer: (*interviewer).to_owned(),
                metrics: rest
                    .iter()
                    .flat_map(|m| m.split(','))
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_owned)
                    .collect(),
            },
            _ => return Err("usage: new <name> | <interviewer> [| metric, ...]".into()),
        },
        "open" if !rest.is_empty() => ShellCommand::Open(rest.to_owned()),
        "open" => return Err("usage: open <name>".into()),
        "add" => match f.as_slice() {
            [name, position, extra @ ..] if extra.len() <= 2 => ShellCommand::Add {
                name: (*name).to_owned(),
                position: (*position).to_owned(),
                experience: extra
                    .first()
                    .map(|raw| number(raw, "years of experience"))
                    .transpose()?,
                email: extra.get(1).map(|e| (*e).to_owned()),
            },
            _ => return Err("usage: add <name> | <position> [| years] [| email]".into()),
        },
        "score" => match f.as_slice() {
            [candidate, metric, value] => ShellCommand::Score {
                candidate: (*candidate).to_owned(),
                metric: (*metric).to_owned(),
                value: number(value, "score")?,
            },
            _ => return Err("usage: score <candidate> | <metric> | <value>".into()),
        },
        "overall" => match f.as_slice() {
            [candidate, score, feedback @ ..] if feedback.len() <= 1 => ShellCommand::Overall {
                candidate: (*candidate).to_owned(),
                score: if *score == "-" {
                    None
                } else {
                    Some(number(score, "score")?)
                },
                feedback: feedback.first().map(|f| (*f).to_owned()),
            },
            _ => return Err("usage: overall <candidate> | <score or -> [| feedback]".into()),
        },
        "remove" | "rm" if !rest.is_empty() => ShellCommand::Remove(rest.to_owned()),
        "remove" | "rm" => return Err("usage: remove <candidate>".into()),
        "rank" => ShellCommand::Rank(
            rest.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(parse_weight)
                .collect::<Result<_, _>>()?,
        ),
        "export" => {
            let (format, path) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: export <csv|json> <path>")?;
            let format = match format.to_ascii_lowercase().as_str() {
                "csv" => ExportFormat::Csv,
                "json" => ExportFormat::Json,
                other => return Err(format!("unknown export format '{other}'")),
            };
            ShellCommand::Export {
                format,
                path: PathBuf::from(path.trim()),
            }
        }
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

/// Finds a candidate by exact id, exact name, or unique id prefix.
pub fn resolve_candidate(session: &InterviewSession, reference: &str) -> Result<CandidateId, String> {
    if let Some(c) = session
        .candidates
        .iter()
        .find(|c| c.id.as_str() == reference || c.name == reference)
    {
        return Ok(c.id.clone());
    }
    let matches: Vec<&Candidate> = session
        .candidates
        .iter()
        .filter(|c| c.id.as_str().starts_with(reference))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => Err(format!("no candidate matches '{reference}'")),
        _ => Err(format!("'{reference}' matches several candidates")),
    }
}

fn candidate_id(ctx: &AppContext, reference: &str) -> Result<CandidateId, anyhow::Error> {
    let session = ctx.session().active()?;
    resolve_candidate(session, reference).map_err(anyhow::Error::msg)
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

pub fn execute(
    ctx: &mut AppContext,
    command: ShellCommand,
    out: &mut impl Write,
) -> Result<Flow, anyhow::Error> {
    match command {
        ShellCommand::Help => writeln!(out, "{HELP}")?,
        ShellCommand::Quit => return Ok(Flow::Quit),
        ShellCommand::New {
            name,
            interviewer,
            metrics,
        } => {
            ctx.create_session(&name, Utc::now().date_naive(), &interviewer, metrics);
            writeln!(out, "Started session '{name}' (unsaved)")?;
        }
        ShellCommand::Open(name) => {
            if ctx.open_session(&name)? {
                write_session(ctx.session().active()?, out)?;
            } else {
                writeln!(out, "{}", format!("No session named '{name}'").yellow())?;
            }
        }
        ShellCommand::Add {
            name,
            position,
            experience,
            email,
        } => {
            let mut candidate = Candidate::new(&name, position);
            if let Some(years) = experience {
                candidate = candidate.with_experience(years);
            }
            candidate.email = email;
            let id = candidate.id.clone();
            ctx.session_mut().active_mut()?.add_candidate(candidate)?;
            writeln!(out, "Added {name} ({id})")?;
        }
        ShellCommand::Score {
            candidate,
            metric,
            value,
        } => {
            let id = candidate_id(ctx, &candidate)?;
            ctx.session_mut()
                .active_mut()?
                .update_score(&id, metric.as_str(), value)?;
            writeln!(out, "{metric} = {value} for {id}")?;
        }
        ShellCommand::Overall {
            candidate,
            score,
            feedback,
        } => {
            let id = candidate_id(ctx, &candidate)?;
            ctx.session_mut()
                .active_mut()?
                .set_overall(&id, score, feedback)?;
            writeln!(out, "Updated overall assessment for {id}")?;
        }
        ShellCommand::Remove(candidate) => {
            let id = candidate_id(ctx, &candidate)?;
            let removed = ctx.session_mut().active_mut()?.remove_candidate(&id)?;
            writeln!(out, "Removed {}", removed.name)?;
        }
        ShellCommand::List => write_session(ctx.session().active()?, out)?,
        ShellCommand::Rank(pairs) => {
            let weights = build_weights(&pairs)?;
            let ranked = ctx.session().active()?.rank(weights.as_ref());
            write_ranking(&ranked, out)?;
        }
        ShellCommand::Save => {
            let saved = ctx.save_session()?;
            writeln!(
                out,
                "{}",
                format!(
                    "Saved '{}' with {} candidate(s)",
                    saved.name,
                    saved.candidates.len()
                )
                .bright_green()
            )?;
        }
        ShellCommand::Export { format, path } => {
            export_session(ctx.session().active()?, format, &path, out)?;
        }
        ShellCommand::Close => match ctx.close_session() {
            Some(session) => writeln!(out, "Closed '{}'", session.name)?,
            None => writeln!(out, "No active session")?,
        },
        ShellCommand::Delete => {
            let session = ctx.delete_session()?;
            writeln!(out, "Deleted '{}'", session.name)?;
        }
    }
    Ok(Flow::Continue)
}

// ---------------------------------------------------------------------------
// REPL
// ---------------------------------------------------------------------------

fn prompt_line(
    input: &mut impl BufRead,
    out: &mut impl Write,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(line.trim().to_owned())),
        Err(err) => Err(err),
    }
}

/// Reads commands until `quit` or end of input. Command failures are printed
/// and the shell keeps going.
pub fn run_shell(
    ctx: &mut AppContext,
    mut input: impl BufRead,
    mut out: impl Write,
) -> Result<(), anyhow::Error> {
    writeln!(out, "{}", "Interview shell. Type 'help' for commands.".bold())?;
    loop {
        let prompt = match ctx.session().active() {
            Ok(session) => format!("{} > ", session.name.cyan()),
            Err(_) => "hr > ".to_owned(),
        };
        let Some(line) = prompt_line(&mut input, &mut out, &prompt)? else {
            writeln!(out)?;
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                writeln!(out, "{}", message.yellow())?;
                continue;
            }
        };
        match execute(ctx, command, &mut out) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => writeln!(out, "{}", format!("Error: {err}").red())?,
        }
    }
    Ok(())
}
