use crate::command::ScriptInvocation;
use crate::error::{Result, ViewerError};
use crate::status::{StatusHub, StatusMessage};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const REAP_INTERVAL: Duration = Duration::from_millis(50);

/// The child of one run, tagged so a reaper never touches a later run.
type Slot = Arc<Mutex<Option<(u64, Child)>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<(u64, Child)>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the scraper and relays its output to a `StatusHub`.
pub struct ScriptLauncher {
    hub: StatusHub,
    child: Slot,
    next_run: AtomicU64,
}

fn relay<R: Read + Send + 'static>(stream: R, hub: StatusHub) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) => hub.broadcast(StatusMessage::Line(line)),
                Err(e) => {
                    warn!(error = %e, "stopped reading script output");
                    break;
                }
            }
        }
    })
}

impl ScriptLauncher {
    pub fn new(hub: StatusHub) -> Self {
        Self {
            hub,
            child: Arc::new(Mutex::new(None)),
            next_run: AtomicU64::new(0),
        }
    }

    /// True until the current run has been reaped or stopped.
    pub fn is_running(&self) -> bool {
        lock(&self.child).is_some()
    }

    pub fn launch(&self, invocation: &ScriptInvocation) -> Result<()> {
        let mut slot = lock(&self.child);
        if slot.is_some() {
            return Err(ViewerError::Launch("script is already running".to_string()));
        }

        let mut child = Command::new(&invocation.program)
            .args(invocation.argv())
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ViewerError::Launch(format!("{}: {e}", invocation.program)))?;
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        info!(run, pid = child.id(), command = %invocation, "script started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        *slot = Some((run, child));
        drop(slot);

        let hub = self.hub.clone();
        let slot = Arc::clone(&self.child);
        thread::spawn(move || {
            let readers: Vec<_> = [
                stdout.map(|s| relay(s, hub.clone())),
                stderr.map(|s| relay(s, hub.clone())),
            ]
            .into_iter()
            .flatten()
            .collect();
            for reader in readers {
                let _ = reader.join();
            }

            // Poll instead of blocking in wait() so stop() can take the lock.
            let status = loop {
                let mut guard = lock(&slot);
                let status = match guard.as_mut() {
                    Some((id, child)) if *id == run => child.try_wait(),
                    // Stopped, and maybe already replaced by a later run.
                    _ => break None,
                };
                match status {
                    Ok(None) => {}
                    Ok(Some(exit)) => {
                        *guard = None;
                        break Some(Ok(exit));
                    }
                    Err(e) => {
                        *guard = None;
                        break Some(Err(e));
                    }
                }
                drop(guard);
                thread::sleep(REAP_INTERVAL);
            };
            match status {
                Some(Ok(status)) => info!(run, %status, "script exited"),
                Some(Err(e)) => warn!(run, error = %e, "could not reap script"),
                None => {
                    info!(run, "script was stopped");
                    return;
                }
            }
            hub.broadcast(StatusMessage::Finished);
        });
        Ok(())
    }

    /// Kills the running script, if any, and reports the finish itself so
    /// the reaper of that run stays silent.
    pub fn stop(&self) -> Result<bool> {
        let mut slot = lock(&self.child);
        let Some((run, mut child)) = slot.take() else {
            return Ok(false);
        };
        // It may have exited on its own since the last poll.
        if let Err(e) = child.kill() {
            warn!(run, error = %e, "kill failed");
        }
        let _ = child.wait();
        info!(run, "script stopped");
        self.hub.broadcast(StatusMessage::Finished);
        Ok(true)
    }
}
