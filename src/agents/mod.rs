//! Time-delayed commands.
//!
//! Anything that simulates network latency is written as an [`Agent`]: a little state machine which is started once,
//! then woken up after whatever delay it asks for, queueing output lines each time, until it finishes. The dispatcher
//! drives it through an [`AsyncOutput`], which owns the cancellation discipline so individual agents don't have to.

mod cf;
pub use cf::{ControlFlow, Followup};

mod sched;
pub use sched::{CancelToken, Scheduler, TimerId};

use std::{
    mem,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::output::Line;

/// Lines an agent wants shown, collected during one step.
#[derive(Default, Debug)]
pub struct Replies(Vec<Line>);

impl Replies {
    pub fn push(&mut self, line: Line) {
        self.0.push(line);
    }

    pub fn output(&mut self, text: impl Into<String>) {
        self.push(Line::output(text));
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(Line::error(text));
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(Line::info(text));
    }

    /// Queue several lines of output at once, split on newlines.
    pub fn block(&mut self, text: &str) {
        self.0.extend(Line::block(text));
    }

    fn take(&mut self) -> Vec<Line> {
        mem::take(&mut self.0)
    }
}

/// One time-delayed command.
pub trait Agent: Send {
    /// Called once, synchronously, when the command starts. By default does nothing and asks for [`Self::react`] to
    /// be called as soon as possible.
    fn start(&mut self, _replies: &mut Replies) -> ControlFlow {
        ControlFlow::Sleep(Duration::ZERO)
    }

    /// Called each time the delay from the previous step runs out.
    fn react(&mut self, replies: &mut Replies) -> ControlFlow;
}

type LineSink = Box<dyn FnMut(Line) + Send>;
type CompletionSink = Box<dyn FnOnce(Option<Followup>) + Send>;

struct Driver {
    agent: Box<dyn Agent>,
    on_line: LineSink,
    on_complete: Option<CompletionSink>,
    token: CancelToken,
}

fn step(driver: &Arc<Mutex<Driver>>, first: bool) {
    let mut d = driver.lock().unwrap_or_else(|e| e.into_inner());
    if d.token.is_cancelled() {
        return;
    }
    let mut replies = Replies::default();
    let cf = if first {
        d.agent.start(&mut replies)
    } else {
        d.agent.react(&mut replies)
    };
    for line in replies.take() {
        (d.on_line)(line);
    }
    let followup = match cf {
        ControlFlow::Sleep(delay) => {
            let next = driver.clone();
            d.token.schedule(delay, move || step(&next, false));
            return;
        }
        ControlFlow::Kill => None,
        ControlFlow::Resolve(f) => Some(f),
    };
    if let Some(complete) = d.on_complete.take() {
        complete(followup);
    }
}

/// Handle to a time-delayed command which hasn't been started yet.
///
/// [`Self::start`] consumes the handle, so a command can only ever be started once.
pub struct AsyncOutput {
    agent: Box<dyn Agent>,
    token: CancelToken,
}

impl AsyncOutput {
    pub fn new(sched: &Scheduler, agent: impl Agent + 'static) -> Self {
        Self {
            agent: Box::new(agent),
            token: CancelToken::new(sched),
        }
    }

    /// Cancel before starting. Starting afterwards does nothing at all.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Run the agent's first step now and schedule the rest.
    ///
    /// `on_line` gets every line in order; `on_complete` is called once, after the last line, unless the command is
    /// cancelled first. After cancellation neither is ever called again.
    pub fn start(
        self,
        on_line: impl FnMut(Line) + Send + 'static,
        on_complete: impl FnOnce(Option<Followup>) + Send + 'static,
    ) -> Running {
        let token = self.token.clone();
        let driver = Arc::new(Mutex::new(Driver {
            agent: self.agent,
            on_line: Box::new(on_line),
            on_complete: Some(Box::new(on_complete)),
            token: self.token,
        }));
        step(&driver, true);
        Running(token)
    }
}

/// A started [`AsyncOutput`].
#[derive(Clone)]
pub struct Running(CancelToken);

impl Running {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}
