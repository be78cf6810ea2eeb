/*!
 * Scripted commands for exercising the queue
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use subtrans::commands::{Command, CommandContext, CommandState};
use subtrans::errors::{CommandError, UndoError};

/// Shared record of what probe commands did
#[derive(Debug, Default)]
pub struct ProbeStats {
    running: AtomicUsize,
    peak: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl ProbeStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Most probes seen running at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn push(&self, entry: String) {
        self.log.lock().push(entry);
    }

    /// Position of an entry in the log
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log.lock().iter().position(|e| e == entry)
    }
}

/// A command that sleeps, logging when it starts and ends.
///
/// The sleep is taken in short steps so an abort is noticed promptly.
#[derive(Debug)]
pub struct ProbeCommand {
    label: &'static str,
    stats: Arc<ProbeStats>,
    delay_ms: u64,
    honor_abort: bool,
    panics: bool,
    state: CommandState,
}

impl ProbeCommand {
    /// A blocking probe
    pub fn blocking(label: &'static str, stats: &Arc<ProbeStats>) -> Self {
        Self {
            label,
            stats: Arc::clone(stats),
            delay_ms: 0,
            honor_abort: true,
            panics: false,
            state: CommandState::new(),
        }
    }

    /// A probe that may run alongside others
    pub fn concurrent(label: &'static str, stats: &Arc<ProbeStats>) -> Self {
        Self {
            state: CommandState::non_blocking(),
            ..Self::blocking(label, stats)
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Keep sleeping after an abort request
    pub fn ignoring_abort(mut self) -> Self {
        self.honor_abort = false;
        self
    }

    /// Panic after logging the start
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    async fn sleep(&self) -> Result<(), CommandError> {
        let mut remaining = self.delay_ms;
        while remaining > 0 {
            if self.honor_abort {
                self.check_aborted()?;
            }
            let step = remaining.min(5);
            tokio::time::sleep(Duration::from_millis(step)).await;
            remaining -= step;
        }
        if self.honor_abort {
            self.check_aborted()?;
        }
        Ok(())
    }
}

#[async_trait]
impl Command for ProbeCommand {
    fn name(&self) -> &'static str {
        self.label
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, _context: &CommandContext) -> Result<(), CommandError> {
        let running = self.stats.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(running, Ordering::SeqCst);
        self.stats.push(format!("start {}", self.label));
        if self.panics {
            let empty: Vec<usize> = Vec::new();
            let _ = empty[self.delay_ms as usize];
        }

        let result = self.sleep().await;

        self.stats.running.fetch_sub(1, Ordering::SeqCst);
        self.stats.push(format!("end {}", self.label));
        result
    }

    fn undo(&mut self, _context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        self.stats.push(format!("undo {}", self.label));
        Ok(())
    }
}
