use std::{mem, sync::Arc, time::Duration};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::{
    agents::{AsyncOutput, Followup, Running, Scheduler},
    config::Latency,
    error::ShellError,
    machine::{resolve_path, Vfs},
    network::HostRegistry,
    output::Line,
    saves::{self, Store},
    session::{FtpSession, Identity, Mode, SessionState, SubSession},
    tools::{self, Outcome, Signal, Toolbox},
    world::World,
};

use super::parse::{parse, Invocation};

/// The high-level state of the CLI, for passing to commands.
///
/// Note this is not updated live; it's the state of the CLI as of whenever the command was run. Anything that needs
/// to see later changes (e.g. an async command reading a file after a delay) goes through `world`.
#[derive(Clone)]
pub struct CliState {
    pub world: Arc<World>,
    pub sched: Scheduler,
    pub latency: Latency,
    /// Who commands run as, and where
    pub identity: Identity,
    /// Both ends of the FTP connection, if there is one
    pub ftp: Option<FtpSession>,
    pub mode: Mode,
    /// The commands available right now
    pub tools: &'static Toolbox,
}

impl CliState {
    pub fn new(world: Arc<World>, sched: Scheduler, latency: Latency, session: &SessionState) -> Self {
        let mode = session.mode();
        Self {
            world,
            sched,
            latency,
            identity: session.identity(),
            ftp: session.ftp().cloned(),
            mode,
            tools: tools::toolbox(mode),
        }
    }

    pub fn vfs(&self) -> &Vfs {
        &self.world.vfs
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.world.registry
    }

    /// Resolve a path argument against the working directory, expanding `~` to the home directory.
    pub fn resolve(&self, input: &str) -> String {
        resolve_from(input, &self.identity.cwd, &self.identity.home)
    }

    /// Resolve a path on the local side of the FTP connection. No `~` here: the FTP client doesn't know about it.
    pub fn resolve_local(&self, input: &str) -> Option<String> {
        let ftp = self.ftp.as_ref()?;
        Some(resolve_path(input, &ftp.origin_cwd))
    }

    pub fn spawn(&self, agent: impl crate::agents::Agent + 'static) -> Outcome {
        Outcome::Async(AsyncOutput::new(&self.sched, agent))
    }
}

fn resolve_from(input: &str, cwd: &str, home: &str) -> String {
    if input == "~" {
        return resolve_path(home, "/");
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return resolve_path(rest, home);
    }
    resolve_path(input, cwd)
}

enum AsyncEvent {
    Line(Line),
    Done(Option<Followup>),
}

/// The interactive shell: takes lines of input, produces lines of output.
///
/// Async commands run on the shared [`Scheduler`]; the owner calls [`Self::poll`] (ideally around
/// [`Self::next_wakeup`]) to let them progress.
pub struct CliApp {
    world: Arc<World>,
    sched: Scheduler,
    latency: Latency,
    session: SessionState,
    store: Box<dyn Store>,
    /// the command currently in flight, if any
    running: Option<Running>,
    events: (Sender<AsyncEvent>, Receiver<AsyncEvent>),
    clear: bool,
}

impl CliApp {
    /// Start a shell, restoring the saved session from `store` if there's a usable one.
    pub fn new(world: Arc<World>, store: Box<dyn Store>, latency: Latency) -> Self {
        let session = saves::load_state(store.as_ref(), &world.registry, &world.start);
        Self {
            world,
            sched: Scheduler::new(),
            latency,
            session,
            store,
            running: None,
            events: unbounded(),
            clear: false,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn prompt(&self) -> String {
        self.session.prompt(&self.world.registry)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Whether the next line is a password, so shouldn't be echoed or kept in history.
    pub fn wants_secret(&self) -> bool {
        self.session.mode() == Mode::Password
    }

    /// How long until [`Self::poll`] will have something to do.
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.sched.next_wakeup()
    }

    /// Whether a command asked for the screen to be cleared since the last call.
    pub fn take_clear(&mut self) -> bool {
        mem::replace(&mut self.clear, false)
    }

    fn state(&self) -> CliState {
        CliState::new(self.world.clone(), self.sched.clone(), self.latency, &self.session)
    }

    /// Handle one line of input, returning whatever output is ready right away.
    pub fn submit(&mut self, line: &str) -> Vec<Line> {
        if self.running.is_some() {
            return vec![Line::info("a command is still running; interrupt it first")];
        }
        let before = self.session.clone();
        let mut out = vec![];
        if self.session.mode() == Mode::Password {
            self.password(line, &mut out);
        } else {
            match parse(line) {
                Ok(Some(inv)) => self.dispatch(inv, &mut out),
                Ok(None) => (),
                Err(e) => out.push(Line::error(e.to_string())),
            }
        }
        self.drain(&mut out);
        self.persist(&before);
        out
    }

    /// Fire due timers and collect what they produced.
    pub fn poll(&mut self) -> Vec<Line> {
        let before = self.session.clone();
        self.sched.run_due();
        let mut out = vec![];
        self.drain(&mut out);
        self.persist(&before);
        out
    }

    /// Cancel the running command, or back out of a password prompt. Cancellation is silent: nothing the command
    /// had scheduled will show up afterwards.
    pub fn interrupt(&mut self) -> Vec<Line> {
        let mut out = vec![];
        if let Some(running) = self.running.take() {
            running.cancel();
            debug!("command interrupted");
            self.drain(&mut out);
        } else if self.session.mode() == Mode::Password {
            let before = self.session.clone();
            self.session.leave();
            self.persist(&before);
        }
        out
    }

    fn dispatch(&mut self, inv: Invocation, out: &mut Vec<Line>) {
        let state = self.state();
        let Some(tool) = state.tools.get(&inv.name) else {
            debug!(cmd = %inv.name, "unknown command");
            out.push(Line::error(ShellError::CommandNotFound(inv.name).to_string()));
            return;
        };
        let res = tool.run(&inv.args, &state);
        debug!(cmd = %inv.name, args = inv.args.len(), ok = res.is_ok(), "command run");
        self.apply(res, out);
    }

    fn password(&mut self, secret: &str, out: &mut Vec<Line>) {
        let Some(SubSession::PasswordPrompt {
            target_username,
            purpose,
        }) = self.session.leave()
        else {
            return;
        };
        let state = self.state();
        let res = tools::login(&state, &target_username, &purpose, secret);
        self.apply(res, out);
    }

    /// Interpret the shape of a command's result. The single place command errors turn into output.
    fn apply(&mut self, res: Result<Outcome, ShellError>, out: &mut Vec<Line>) {
        match res {
            Err(e) => out.push(Line::error(e.to_string())),
            Ok(Outcome::Nothing) => (),
            Ok(Outcome::Text(text)) => out.extend(Line::block(&text)),
            Ok(Outcome::Signal(sig)) => self.signal(sig, out),
            Ok(Outcome::TextThen(text, sig)) => {
                out.extend(Line::block(&text));
                self.signal(sig, out);
            }
            Ok(Outcome::Async(output)) => {
                let (lines, done) = (self.events.0.clone(), self.events.0.clone());
                let running = output.start(
                    move |l| {
                        let _ = lines.send(AsyncEvent::Line(l));
                    },
                    move |f| {
                        let _ = done.send(AsyncEvent::Done(f));
                    },
                );
                self.running = Some(running);
            }
        }
    }

    fn signal(&mut self, sig: Signal, out: &mut Vec<Line>) {
        debug!(?sig, "signal");
        match sig {
            Signal::Clear => self.clear = true,
            Signal::ChangeDir(path) => self.session.change_dir(path),
            Signal::ChangeLocalDir(path) => self.session.change_local_dir(path),
            Signal::PasswordPrompt { user } => self.session.enter(SubSession::PasswordPrompt {
                target_username: user,
                purpose: crate::session::PromptPurpose::Su,
            }),
            Signal::SwitchUser(next) => self.session.push(next),
            Signal::EnterShell(prompt) => self.session.enter(SubSession::Interactive(prompt)),
            Signal::Exit => {
                if self.session.leave().is_none() && self.session.pop().is_none() {
                    out.push(Line::info("exit: there is no session to leave"));
                }
            }
        }
    }

    /// Deliver everything the running command has produced so far.
    fn drain(&mut self, out: &mut Vec<Line>) {
        while let Ok(ev) = self.events.1.try_recv() {
            match ev {
                AsyncEvent::Line(line) => out.push(line),
                AsyncEvent::Done(followup) => {
                    self.running = None;
                    if let Some(followup) = followup {
                        let state = self.state();
                        if let Some(sub) = tools::followup_session(followup, &state) {
                            self.session.enter(sub);
                        }
                    }
                }
            }
        }
    }

    fn persist(&self, before: &SessionState) {
        if &self.session == before {
            return;
        }
        if let Err(e) = saves::save_state(self.store.as_ref(), &self.session) {
            warn!(error = %e, "failed to save session");
        }
    }
}
