use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use quiz_core::model::{Answer, Course, CourseError, IdError, QuestionId, Username};
use quiz_core::{InMemoryCatalog, QuestionCatalog};
use serde_json::{Map, Value, json};
use services::{SessionMode, SessionRequest, SessionService, StarAction, StudyService};
use storage::{ProgressStore, Storage};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidUser(IdError),
    InvalidCourse(CourseError),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidBool { flag: &'static str, raw: String },
    InvalidFlag { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidUser(err) => write!(f, "invalid --user value: {err}"),
            ArgsError::InvalidCourse(err) => write!(f, "invalid --course value: {err}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidBool { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidFlag { raw } => write!(f, "expected key=value for --set, got {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number(raw: String, flag: &'static str) -> Result<usize, ArgsError> {
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn parse_bool(raw: String, flag: &'static str) -> Result<bool, ArgsError> {
    match raw.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ArgsError::InvalidBool { flag, raw }),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> --user <name> [--course maogai|mayuan] [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  start      [--mode sequential|tag|random] [--unit <unit>] [--tag wrong|star]");
    eprintln!("             [--count <n>] [--reveal true|false]");
    eprintln!("  resume     seed a first-unit session if none exists, then print the current one");
    eprintln!("  answer     --id <question> [--selected <label>]...");
    eprintln!("  question   --id <question>");
    eprintln!("  star       --id <question> [--action toggle|query]");
    eprintln!("  clear-unit --unit <unit>");
    eprintln!("  flags      [--set <key>=<json>]...");
    eprintln!("  save-pos   --key <progress key> [--pos <n>]");
    eprintln!("  show       print the course section");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --data-dir user_data");
    eprintln!("  --course maogai");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DATA_DIR, QUIZ_CATALOG, QUIZ_USER, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Resume,
    Answer,
    Question,
    Star,
    ClearUnit,
    Flags,
    SavePos,
    Show,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "start" => Some(Self::Start),
            "resume" => Some(Self::Resume),
            "answer" => Some(Self::Answer),
            "question" => Some(Self::Question),
            "star" => Some(Self::Star),
            "clear-unit" => Some(Self::ClearUnit),
            "flags" => Some(Self::Flags),
            "save-pos" => Some(Self::SavePos),
            "show" => Some(Self::Show),
            _ => None,
        }
    }

    fn needs_catalog(self) -> bool {
        matches!(
            self,
            Self::Start
                | Self::Resume
                | Self::Answer
                | Self::Question
                | Self::Star
                | Self::ClearUnit
        )
    }
}

struct Args {
    command: Command,
    data_dir: PathBuf,
    catalog: Option<PathBuf>,
    user: Username,
    course: Course,
    mode: Option<String>,
    unit: Option<String>,
    tag: Option<String>,
    count: Option<usize>,
    reveal: Option<bool>,
    id: Option<String>,
    selected: Vec<String>,
    action: String,
    key: Option<String>,
    pos: usize,
    flag_patch: Map<String, Value>,
}

impl Args {
    fn parse(command: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut data_dir = std::env::var("QUIZ_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from("user_data"), PathBuf::from);
        let mut catalog = std::env::var("QUIZ_CATALOG").ok().map(PathBuf::from);
        let mut user = std::env::var("QUIZ_USER").ok();
        let mut course = Course::Maogai;
        let mut mode = None;
        let mut unit = None;
        let mut tag = None;
        let mut count = None;
        let mut reveal = None;
        let mut id = None;
        let mut selected = Vec::new();
        let mut action = "toggle".to_string();
        let mut key = None;
        let mut pos = 0;
        let mut flag_patch = Map::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data-dir" => data_dir = PathBuf::from(require_value(args, "--data-dir")?),
                "--catalog" => catalog = Some(PathBuf::from(require_value(args, "--catalog")?)),
                "--user" => user = Some(require_value(args, "--user")?),
                "--course" => {
                    course = require_value(args, "--course")?
                        .parse()
                        .map_err(ArgsError::InvalidCourse)?;
                }
                "--mode" => mode = Some(require_value(args, "--mode")?),
                "--unit" => unit = Some(require_value(args, "--unit")?),
                "--tag" => tag = Some(require_value(args, "--tag")?),
                "--count" => count = Some(parse_number(require_value(args, "--count")?, "--count")?),
                "--reveal" => reveal = Some(parse_bool(require_value(args, "--reveal")?, "--reveal")?),
                "--id" => id = Some(require_value(args, "--id")?),
                "--selected" => selected.push(require_value(args, "--selected")?),
                "--action" => action = require_value(args, "--action")?,
                "--key" => key = Some(require_value(args, "--key")?),
                "--pos" => pos = parse_number(require_value(args, "--pos")?, "--pos")?,
                "--set" => {
                    let raw = require_value(args, "--set")?;
                    let Some((name, value)) = raw.split_once('=') else {
                        return Err(ArgsError::InvalidFlag { raw });
                    };
                    // Bare words that are not JSON are taken as strings.
                    let value = serde_json::from_str(value)
                        .unwrap_or_else(|_| Value::String(value.to_string()));
                    flag_patch.insert(name.to_string(), value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let user = user.ok_or(ArgsError::MissingArg { flag: "--user" })?;
        let user = Username::new(user).map_err(ArgsError::InvalidUser)?;
        if command.needs_catalog() && catalog.is_none() {
            return Err(ArgsError::MissingArg { flag: "--catalog" });
        }

        Ok(Self {
            command,
            data_dir,
            catalog,
            user,
            course,
            mode,
            unit,
            tag,
            count,
            reveal,
            id,
            selected,
            action,
            key,
            pos,
            flag_patch,
        })
    }

    fn question_id(&self) -> Result<QuestionId, ArgsError> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(QuestionId::new)
            .ok_or(ArgsError::MissingArg { flag: "--id" })
    }

    fn selection(&self) -> Option<Answer> {
        match self.selected.as_slice() {
            [] => None,
            [one] => Some(Answer::single(one.as_str())),
            many => Some(Answer::multiple(many.iter().map(String::as_str))),
        }
    }
}

fn load_catalog(path: Option<&PathBuf>) -> Result<InMemoryCatalog, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(InMemoryCatalog::new());
    };
    let raw = std::fs::read_to_string(path)?;
    let catalog = InMemoryCatalog::from_json_str(&raw)?;
    tracing::debug!(
        path = %path.display(),
        maogai = catalog.question_count(Course::Maogai),
        mayuan = catalog.question_count(Course::Mayuan),
        "catalog loaded"
    );
    Ok(catalog)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let command = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            print_usage();
            ArgsError::UnknownCommand(first)
        })?,
    };

    let args = Args::parse(command, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog: Arc<dyn QuestionCatalog> = Arc::new(load_catalog(args.catalog.as_ref())?);
    let storage = Storage::json_dir(&args.data_dir)?;
    let store = ProgressStore::new(storage.documents);
    let sessions = SessionService::new(Arc::clone(&catalog), store.clone());
    let study = StudyService::new(catalog, store);
    let (user, course) = (&args.user, args.course);

    let output = match args.command {
        Command::Start => {
            let mode = SessionMode::from_params(
                args.mode.as_deref(),
                args.unit.as_deref(),
                args.tag.as_deref(),
                args.count,
            )?;
            let mut request = SessionRequest::new(mode);
            request.reveal = args.reveal;
            let started = sessions.start(user, course, &request)?;
            json!({ "session": started, "progress": started.progress() })
        }
        Command::Resume => {
            let seeded = sessions.ensure_default_session(user, course)?;
            let current = sessions.resume_current(user, course)?;
            let progress = current.as_ref().map(services::SessionState::progress);
            json!({ "seeded": seeded, "session": current, "progress": progress })
        }
        Command::Answer => {
            let id = args.question_id()?;
            let outcome = study.record_answer(user, course, &id, args.selection())?;
            serde_json::to_value(outcome)?
        }
        Command::Question => {
            let id = args.question_id()?;
            serde_json::to_value(study.question_view(user, course, &id)?)?
        }
        Command::Star => {
            let id = args.question_id()?;
            let action: StarAction = args.action.parse()?;
            let starred = study.star(user, course, &id, action)?;
            json!({ "id": id, "starred": starred })
        }
        Command::ClearUnit => {
            let unit = args
                .unit
                .as_deref()
                .ok_or(ArgsError::MissingArg { flag: "--unit" })?;
            study.clear_unit(user, course, unit)?;
            json!({ "ok": true, "unit": unit })
        }
        Command::Flags => {
            let flags = if args.flag_patch.is_empty() {
                study.flags(user, course)?
            } else {
                study.set_flags(user, course, &args.flag_patch)?
            };
            serde_json::to_value(flags)?
        }
        Command::SavePos => {
            let key = sessions.save_position(user, course, args.key.as_deref(), args.pos)?;
            json!({ "ok": true, "key": key })
        }
        Command::Show => serde_json::to_value(study.course_snapshot(user, course)?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
