use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{ChapterId, OptionId, SrsSettings};
use services::{Clock, Outcome, QuestionView, QuizLoopService, SessionController, SessionMode};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingChapter,
    InvalidSeconds { flag: &'static str, raw: String },
    InvalidModulePath { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingChapter => write!(f, "this command requires --chapter <id>"),
            ArgsError::InvalidSeconds { flag, raw } => {
                write!(f, "invalid {flag} value: {raw} (expected a positive integer)")
            }
            ArgsError::InvalidModulePath { raw } => write!(f, "invalid --module value: {raw}"),
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

fn parse_seconds(raw: String, flag: &'static str) -> Result<u32, ArgsError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or(ArgsError::InvalidSeconds { flag, raw })
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|value| matches!(value.trim(), "1" | "true" | "yes"))
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz-srs stats  [--module <path>]");
    eprintln!("  quiz-srs quiz   --chapter <id> [--module <path>] [--shuffle]");
    eprintln!("  quiz-srs review [--module <path>] [--shuffle]");
    eprintln!("  quiz-srs reset  --chapter <id> [--module <path>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --retry-delay-secs <n>        delay before a wrong answer is due again (30)");
    eprintln!("  --learning-interval-secs <n>  interval after a first correct answer (600)");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --module module.json");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_MODULE_PATH, QUIZ_CHAPTER, QUIZ_SHUFFLE_OPTIONS, RUST_LOG");
    eprintln!();
    eprintln!("While answering: a number picks an option, Enter moves on,");
    eprintln!("p/n browse answered questions, g <n> jumps to a question, q quits.");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Stats,
    Quiz,
    Review,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "stats" => Some(Self::Stats),
            "quiz" => Some(Self::Quiz),
            "review" => Some(Self::Review),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }

    fn needs_chapter(self) -> bool {
        matches!(self, Self::Quiz | Self::Reset)
    }
}

struct Args {
    module_path: PathBuf,
    chapter: Option<ChapterId>,
    shuffle: bool,
    settings: SrsSettings,
}

impl Args {
    fn parse(
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut module_path = std::env::var("QUIZ_MODULE_PATH")
            .ok()
            .map_or_else(|| PathBuf::from("module.json"), PathBuf::from);
        let mut chapter = std::env::var("QUIZ_CHAPTER").ok().map(ChapterId::new);
        let mut shuffle = env_flag("QUIZ_SHUFFLE_OPTIONS");
        let defaults = SrsSettings::default();
        let mut retry_delay = defaults.retry_delay_secs();
        let mut learning_interval = defaults.learning_interval_secs();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--module" => {
                    let value = require_value(args, "--module")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidModulePath { raw: value }.into());
                    }
                    module_path = PathBuf::from(value);
                }
                "--chapter" => {
                    chapter = Some(ChapterId::new(require_value(args, "--chapter")?));
                }
                "--shuffle" => shuffle = true,
                "--retry-delay-secs" => {
                    let value = require_value(args, "--retry-delay-secs")?;
                    retry_delay = parse_seconds(value, "--retry-delay-secs")?;
                }
                "--learning-interval-secs" => {
                    let value = require_value(args, "--learning-interval-secs")?;
                    learning_interval = parse_seconds(value, "--learning-interval-secs")?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg).into()),
            }
        }

        if cmd.needs_chapter() && chapter.is_none() {
            return Err(ArgsError::MissingChapter.into());
        }

        let settings = SrsSettings::new(
            learning_interval,
            retry_delay,
            defaults.recent_failure_window_secs(),
            defaults.sticky_queue_threshold(),
        )?;

        Ok(Self {
            module_path,
            chapter,
            shuffle,
            settings,
        })
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn print_dashboard(session: &SessionController) {
    let dashboard = session.dashboard();
    println!("{}", dashboard.module_name);
    println!(
        "  mastered {}/{}  due for review: {}",
        dashboard.mastered_questions, dashboard.total_questions, dashboard.review_queue_count
    );
    for chapter in &dashboard.chapters {
        let marker = if chapter.stats.is_completed { "x" } else { " " };
        println!(
            "  [{marker}] {:<16} {:<24} answered {}/{}  correct {}  remaining {}",
            chapter.chapter_id,
            chapter.name,
            chapter.stats.answered_questions,
            chapter.stats.total_questions,
            chapter.stats.correct_answers,
            chapter.remaining,
        );
    }
}

fn print_question(view: &QuestionView, session: &SessionController) {
    println!();
    let origin = if view.is_history_view { " (history)" } else { "" };
    println!(
        "[{}/{}] {}{origin}",
        view.position + 1,
        view.total,
        view.question_text
    );
    for (i, option) in view.options.iter().enumerate() {
        let picked = view.selected_option_id.as_ref() == Some(&option.option_id);
        let correct = view
            .correct_option_ids
            .as_ref()
            .is_some_and(|ids| ids.contains(&option.option_id));
        let mark = match (view.submitted, picked, correct) {
            (true, _, true) => "+",
            (true, true, false) => "-",
            (false, true, _) => ">",
            _ => " ",
        };
        println!("  {mark} {}. {}", i + 1, option.option_text);
    }
    if view.submitted {
        match view.is_correct {
            Some(true) => println!("Correct."),
            Some(false) => println!("Incorrect."),
            None => {}
        }
        if let Some(explanation) = &view.explanation {
            println!("{explanation}");
        }
    }
    if session.mode().is_review() {
        let counts = session.srs_progress_counts();
        println!(
            "  due now: {}  learning: {}  left to master: {}",
            counts.new_or_lapsing_due, counts.learning_review_due, counts.total_non_mastered
        );
    }
}

//
// ─── INTERACTIVE LOOP ──────────────────────────────────────────────────────────
//

async fn run_session(
    service: &QuizLoopService,
    session: &mut SessionController,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let Some(view) = session.current_view() else {
            break;
        };
        print_question(&view, session);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        let outcome = match input {
            "q" => break,
            "p" => session.view_previous()?,
            "n" => session.view_next()?,
            "" => session.advance()?,
            other => {
                if let Some(target) = other.strip_prefix('g') {
                    match target.trim().parse::<usize>() {
                        Ok(n) if n > 0 => session.navigate_to_question(n - 1)?,
                        _ => {
                            println!("usage: g <question number>");
                            continue;
                        }
                    }
                } else {
                    let Some(option) = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| view.options.get(i))
                    else {
                        println!("pick an option between 1 and {}", view.options.len());
                        continue;
                    };
                    let option_id: OptionId = option.option_id.clone();
                    let displayed: Vec<OptionId> =
                        view.options.iter().map(|o| o.option_id.clone()).collect();
                    let _ = session.select_option(&option_id)?;
                    service.submit_and_persist(session, &displayed).await?
                }
            }
        };

        match outcome {
            Outcome::Ignored(reason) => println!("({})", reason.as_str()),
            Outcome::ChapterFinished => {
                println!("Chapter complete.");
                break;
            }
            Outcome::ReviewFinished => {
                println!("Nothing left to review right now.");
                break;
            }
            Outcome::Updated | Outcome::Answered { .. } | Outcome::NothingDue => {}
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Stats,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Stats,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    info!(path = %parsed.module_path.display(), "opening module");
    let storage = Storage::json_file(&parsed.module_path);
    let service = QuizLoopService::new(Clock::system(), storage.modules)
        .with_settings(parsed.settings)
        .with_shuffle_options(parsed.shuffle);
    let mut session = service.start().await?;
    let _ = session.show_dashboard()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match cmd {
        Command::Stats => print_dashboard(&session),
        Command::Quiz => {
            let chapter = parsed.chapter.ok_or(ArgsError::MissingChapter)?;
            let outcome = session.start_quiz(&chapter)?;
            if let Outcome::Ignored(reason) = outcome {
                println!("cannot start quiz: {}", reason.as_str());
                return Ok(());
            }
            run_session(&service, &mut session, &mut lines).await?;
            print_dashboard(&session);
        }
        Command::Review => {
            if session.start_review_session()? == Outcome::NothingDue {
                println!("Nothing is due for review.");
                return Ok(());
            }
            run_session(&service, &mut session, &mut lines).await?;
            if session.mode() != SessionMode::Dashboard {
                let _ = session.show_dashboard()?;
            }
            print_dashboard(&session);
        }
        Command::Reset => {
            let chapter = parsed.chapter.ok_or(ArgsError::MissingChapter)?;
            let _ = service.retry_and_persist(&mut session, &chapter).await?;
            println!("Reset chapter {chapter}.");
            print_dashboard(&session);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
