//! Per-profile periodic task runner.
//!
//! One named thread per profile, driven by a command channel. The thread
//! starts paused; while running it invokes the job every `period`. Job
//! errors and panics are logged and never stop the thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};

use crate::domain::error::QuorumError;

enum Command {
    Resume,
    Pause,
    Stop,
}

pub struct Scheduler {
    name: String,
    commands: Sender<Command>,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn spawn<F>(name: &str, period: Duration, job: F) -> Result<Self, QuorumError>
    where
        F: Fn() -> Result<(), QuorumError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("sched-{}", name))
            .spawn(move || {
                let mut active = false;
                loop {
                    let command = if active {
                        match rx.recv_timeout(period) {
                            Ok(command) => Some(command),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    } else {
                        match rx.recv() {
                            Ok(command) => Some(command),
                            Err(_) => break,
                        }
                    };
                    match command {
                        Some(Command::Resume) => active = true,
                        Some(Command::Pause) => active = false,
                        Some(Command::Stop) => break,
                        None => run_job(&thread_name, &job),
                    }
                }
                debug!("scheduler for {} exited", thread_name);
            })?;

        Ok(Self {
            name: name.to_string(),
            commands: tx,
            running: AtomicBool::new(false),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn resume(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.send(Command::Resume);
    }

    /// Stop ticking. Safe to call when already paused.
    pub fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Pause);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Stop);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once the worker thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Join the worker if it has already finished.
    pub fn reap(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(JoinHandle::is_finished) {
            if let Some(h) = handle.take() {
                if h.join().is_err() {
                    error!("scheduler thread for {} panicked", self.name);
                }
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            self.running.store(false, Ordering::SeqCst);
            warn!("scheduler for {} has exited; command dropped", self.name);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
    }
}

fn run_job<F>(name: &str, job: &F)
where
    F: Fn() -> Result<(), QuorumError>,
{
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("scheduled evaluation of {} failed: {}", name, e),
        Err(_) => error!("scheduled evaluation of {} panicked", name),
    }
}
