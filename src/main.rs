use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::{bail, Context};
use crossbeam::channel::{unbounded, RecvTimeoutError};
use crossterm::{
    cursor::MoveTo,
    execute,
    style::Stylize,
    terminal::{Clear, ClearType},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netshell::{
    app::CliApp,
    config::Config,
    output::{Line, LineKind},
    saves::{FileStore, MemoryStore, Store},
    world::World,
};

/// How long to wait for input when nothing is scheduled.
const IDLE_POLL: Duration = Duration::from_millis(250);

const USAGE: &str = "usage: netshell [--config <path>] [--no-save]

  --config <path>  read configuration from <path> instead of ~/.netshell/config.toml
  --no-save        don't restore or persist the session";

struct Options {
    config: Option<PathBuf>,
    no_save: bool,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut opts = Options {
        config: None,
        no_save: false,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                opts.config = Some(path.into());
            }
            "--no-save" => opts.no_save = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown argument: {}\n{}", other, USAGE),
        }
    }
    Ok(opts)
}

/// Log to a file, since stdout belongs to the shell. `RUST_LOG` overrides the configured level.
fn init_logging(config: &Config) {
    if let Some(parent) = config.log_file.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&config.log_file) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_lines(out: &mut impl Write, lines: &[Line]) -> io::Result<()> {
    for line in lines {
        match line.kind {
            LineKind::Output => writeln!(out, "{}", line.text)?,
            LineKind::Error => writeln!(out, "{}", line.text.as_str().red())?,
            LineKind::Info => writeln!(out, "{}", line.text.as_str().dark_grey())?,
        }
    }
    Ok(())
}

/// Show what a step produced, then the prompt if the shell is ready for more.
fn show(app: &mut CliApp, out: &mut impl Write, lines: &[Line], prompt: bool) -> io::Result<()> {
    if app.take_clear() {
        execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    }
    print_lines(out, lines)?;
    if prompt && !app.is_running() {
        write!(out, "{}", app.prompt())?;
    }
    out.flush()
}

fn main() -> anyhow::Result<()> {
    let opts = parse_args()?;
    let config = match &opts.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;
    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "netshell starting");

    let world = match &config.world {
        Some(path) => World::load(path).with_context(|| format!("loading world from {}", path.display()))?,
        None => World::builtin().context("loading built-in world")?,
    };
    let store: Box<dyn Store> = if opts.no_save {
        Box::new(MemoryStore::new())
    } else {
        match FileStore::open(&config.save_dir) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!(error = %e, dir = %config.save_dir.display(), "can't open save directory; not persisting");
                Box::new(MemoryStore::new())
            }
        }
    };
    let mut app = CliApp::new(Arc::new(world), store, config.latency);

    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                return;
            }
        }
    });

    let mut out = io::stdout();
    writeln!(out, "{}", "netshell: type `help` for commands, Ctrl-D to quit.".dark_grey())?;
    show(&mut app, &mut out, &[], true)?;
    loop {
        let wait = app.next_wakeup().unwrap_or(IDLE_POLL);
        match rx.recv_timeout(wait) {
            Ok(line) => {
                let lines = if app.is_running() && matches!(line.trim(), "" | "^C") {
                    app.interrupt()
                } else {
                    app.submit(&line)
                };
                show(&mut app, &mut out, &lines, true)?;
            }
            Err(RecvTimeoutError::Timeout) => {
                let was_running = app.is_running();
                let lines = app.poll();
                let finished = was_running && !app.is_running();
                if !lines.is_empty() || finished {
                    show(&mut app, &mut out, &lines, finished)?;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    writeln!(out)?;
    info!("netshell exiting");
    Ok(())
}
