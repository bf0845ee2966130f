use crate::{
    config::Config,
    controller::{ModeController, Reply, Request},
    error::AssistantError,
    gateway::{Gateway, InferenceBackend, python::PythonBackend},
    render::{Format, render},
    session::{Mode, Session},
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "research-assistant")]
#[command(about = "Summarize a PDF, answer questions about it, or quiz yourself on it")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./research-assistant.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print replies as JSON lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the Python worker environment.
    Doctor {},
    Summarize {
        #[arg(long)]
        input: PathBuf,
    },
    Ask {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        question: String,
    },
    Challenge {
        #[arg(long)]
        input: PathBuf,
    },
    /// Interactive loop on stdin.
    Session {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;
    let format = if args.json { Format::Json } else { Format::Text };

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Summarize { input } => {
            let controller = controller(&cfg)?;
            one_shot(&cfg, &controller, input, None, &mut std::io::stdout().lock(), format)
        }
        Command::Ask { input, question } => {
            let controller = controller(&cfg)?;
            let req = Request::Ask {
                question: question.clone(),
            };
            one_shot(&cfg, &controller, input, Some(req), &mut std::io::stdout().lock(), format)
        }
        Command::Challenge { input } => {
            let controller = controller(&cfg)?;
            let req = Some(Request::Challenge);
            one_shot(&cfg, &controller, input, req, &mut std::io::stdout().lock(), format)
        }
        Command::Session { input } => {
            let controller = controller(&cfg)?;
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            run_session(
                &cfg,
                &controller,
                input.as_deref(),
                stdin.lock(),
                &mut stdout.lock(),
                format,
            )
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("research-assistant.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries replies; logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn controller(cfg: &Config) -> Result<ModeController<PythonBackend>> {
    let backend = PythonBackend::new(cfg)?;
    Ok(ModeController::new(cfg, Arc::new(Gateway::new(backend))))
}

fn doctor(cfg: &Config) -> Result<()> {
    let backend = PythonBackend::new(cfg)?;
    let diag = backend.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

/// Uploads `input`, then runs `request` (or stops at the summary). Errors when
/// the step the subcommand exists for fails.
pub fn one_shot<B: InferenceBackend, W: Write>(
    cfg: &Config,
    controller: &ModeController<B>,
    input: &Path,
    request: Option<Request>,
    out: &mut W,
    format: Format,
) -> Result<()> {
    validate_input(cfg, input)?;
    let mut session = Session::new();

    let reply = controller.upload_path(&mut session, input);
    render(out, format, &reply)?;
    if matches!(reply, Reply::Error { .. }) {
        return Err(anyhow!("could not load {}", input.display()));
    }

    let Some(req) = request else {
        if reply.is_failure() {
            return Err(anyhow!("no summary for {}", input.display()));
        }
        return Ok(());
    };
    let what = match &req {
        Request::Ask { .. } => "ask",
        Request::Challenge => "challenge",
    };
    let reply = controller.dispatch(&mut session, req);
    render(out, format, &reply)?;
    if reply.is_failure() {
        return Err(anyhow!("{what} failed for {}", input.display()));
    }
    Ok(())
}

const SESSION_HELP: &str = "\
commands:
  :open <pdf>       upload a document (recomputes the summary)
  :mode ask|challenge
  :challenge        generate challenge questions
  :summary          show the current summary
  :help
  :quit
anything else is asked as a question in ask mode
";

const CHALLENGE_MODE_HINT: &str = "challenge mode: use :challenge, or :mode ask to ask questions";

/// Reads commands until EOF or `:quit`. Step failures are printed and the
/// loop keeps going.
pub fn run_session<B: InferenceBackend, R: BufRead, W: Write>(
    cfg: &Config,
    controller: &ModeController<B>,
    initial: Option<&Path>,
    input: R,
    out: &mut W,
    format: Format,
) -> Result<()> {
    let mut session = Session::new();
    if let Some(path) = initial {
        open(cfg, controller, &mut session, path, out, format)?;
    }

    for line in input.lines() {
        let line = line.with_context(|| "reading stdin")?;
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match cmd {
            "" => {}
            ":quit" | ":q" => break,
            ":help" => notice(out, format, SESSION_HELP.trim_end())?,
            ":open" => open(cfg, controller, &mut session, Path::new(rest), out, format)?,
            ":mode" => match rest.parse::<Mode>() {
                Ok(mode) => {
                    session.select_mode(mode);
                    render(out, format, &Reply::ModeSelected { mode })?;
                }
                Err(e) => notice(out, format, &format!("error: {e}"))?,
            },
            ":summary" => match session.summary().cloned() {
                Some(summary) => render(out, format, &Reply::Summary { summary })?,
                None => {
                    let reply = controller.summarize(&mut session);
                    render(out, format, &reply)?;
                }
            },
            ":challenge" => {
                let reply = controller.dispatch(&mut session, Request::Challenge);
                render(out, format, &reply)?;
            }
            c if c.starts_with(':') => {
                notice(out, format, &format!("unknown command: {c} (try :help)"))?;
            }
            _ if session.mode() == Mode::AskAnything => {
                let req = Request::Ask {
                    question: line.to_string(),
                };
                let reply = controller.dispatch(&mut session, req);
                render(out, format, &reply)?;
            }
            _ => notice(out, format, CHALLENGE_MODE_HINT)?,
        }
    }
    Ok(())
}

fn open<B: InferenceBackend, W: Write>(
    cfg: &Config,
    controller: &ModeController<B>,
    session: &mut Session,
    path: &Path,
    out: &mut W,
    format: Format,
) -> Result<()> {
    if let Err(err) = validate_input(cfg, path) {
        warn!("{err:#}");
        session.clear();
        return render(out, format, &Reply::error(&AssistantError::extraction(err)));
    }
    let reply = controller.upload_path(session, path);
    render(out, format, &reply)?;
    info!("session state={:?} mode={}", session.state(), session.mode());
    Ok(())
}

fn notice<W: Write>(out: &mut W, format: Format, message: &str) -> Result<()> {
    let reply = Reply::Notice {
        message: message.to_string(),
    };
    render(out, format, &reply)
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        if !ext.eq_ignore_ascii_case("pdf") {
            return Err(anyhow!("input is not a PDF: {}", input.display()));
        }
    } else {
        warn!("input has no extension; assuming PDF: {}", input.display());
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
