//! Time-of-day job scheduler.
//!
//! Jobs are registered under a unique id with a [`Trigger`]. A single ticker
//! task, started once, checks every tick which jobs are due and runs each in
//! its own task so a slow job never delays the others.

pub mod announcer;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, ScheduleError};

pub use announcer::Announcement;

/// When a job fires, in local time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Every day at `hour:minute`.
    Daily { hour: u32, minute: u32 },
    /// Six or seven field cron expression (seconds first).
    Cron(String),
}

impl Trigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self::Daily { hour, minute }
    }

    /// Cron expression equivalent of this trigger.
    pub fn expression(&self) -> String {
        match self {
            Self::Daily { hour, minute } => format!("0 {minute} {hour} * * *"),
            Self::Cron(expr) => expr.clone(),
        }
    }

    fn compile(&self) -> Result<cron::Schedule, ScheduleError> {
        if let Self::Daily { hour, minute } = self
            && (*hour > 23 || *minute > 59)
        {
            return Err(ScheduleError::InvalidTrigger {
                trigger: format!("{hour:02}:{minute:02}"),
                reason: "hour must be 0-23 and minute 0-59".to_string(),
            });
        }
        let expr = self.expression();
        cron::Schedule::from_str(&expr).map_err(|e| ScheduleError::InvalidTrigger {
            trigger: expr,
            reason: e.to_string(),
        })
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Local>) -> Result<Option<DateTime<Local>>, ScheduleError> {
        Ok(self.compile()?.after(after).next())
    }
}

/// Work run when a job fires.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self) -> Result<(), Error>;
}

/// Snapshot of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub trigger: Trigger,
    pub next_fire: Option<DateTime<Local>>,
}

struct Job {
    trigger: Trigger,
    schedule: cron::Schedule,
    task: Arc<dyn ScheduledTask>,
    next_fire: Option<DateTime<Local>>,
}

impl Job {
    fn handle(&self, id: &str) -> JobHandle {
        JobHandle {
            id: id.to_string(),
            trigger: self.trigger.clone(),
            next_fire: self.next_fire,
        }
    }
}

enum State {
    Idle,
    Running {
        shutdown_tx: watch::Sender<bool>,
        ticker: JoinHandle<()>,
    },
    Stopped,
}

/// Recurring job scheduler backed by one ticker task.
pub struct Scheduler {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    tick: Duration,
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tick,
            state: Mutex::new(State::Idle),
        }
    }

    /// Register `task` under `id`. An existing job with the same id is replaced.
    pub async fn register(
        &self,
        id: impl Into<String>,
        trigger: Trigger,
        task: Arc<dyn ScheduledTask>,
    ) -> Result<JobHandle, ScheduleError> {
        if self.is_stopped() {
            return Err(ScheduleError::Stopped);
        }

        let id = id.into();
        let schedule = trigger.compile()?;
        let next_fire = schedule.after(&Local::now()).next();
        let job = Job {
            trigger,
            schedule,
            task,
            next_fire,
        };
        let handle = job.handle(&id);

        if self.jobs.write().await.insert(id.clone(), job).is_some() {
            tracing::info!(job = %id, "Replaced scheduled job");
        } else {
            tracing::info!(job = %id, next_fire = ?handle.next_fire, "Registered scheduled job");
        }

        Ok(handle)
    }

    /// Remove a job. Returns whether it existed.
    pub async fn unregister(&self, id: &str) -> bool {
        self.jobs.write().await.remove(id).is_some()
    }

    /// All registered jobs, ordered by id.
    pub async fn jobs(&self) -> Vec<JobHandle> {
        let jobs = self.jobs.read().await;
        let mut handles: Vec<JobHandle> = jobs.iter().map(|(id, job)| job.handle(id)).collect();
        handles.sort_by(|a, b| a.id.cmp(&b.id));
        handles
    }

    /// Run a job immediately, outside its schedule. `None` if the id is unknown.
    pub async fn fire_now(&self, id: &str) -> Option<Result<(), Error>> {
        let task = self.jobs.read().await.get(id).map(|job| Arc::clone(&job.task))?;
        Some(task.run().await)
    }

    /// Spawn the ticker. Only valid once per scheduler.
    pub fn start(&self) -> Result<(), ScheduleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            State::Running { .. } => return Err(ScheduleError::AlreadyStarted),
            State::Stopped => return Err(ScheduleError::Stopped),
            State::Idle => {}
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = spawn_ticker(Arc::clone(&self.jobs), self.tick, shutdown_rx);
        *state = State::Running {
            shutdown_tx,
            ticker,
        };
        tracing::info!(tick = ?self.tick, "Scheduler started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            State::Running { .. }
        )
    }

    fn is_stopped(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            State::Stopped
        )
    }

    /// Stop the ticker and wait for it to exit. Jobs already running finish
    /// on their own. Safe to call more than once.
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *state, State::Stopped)
        };

        if let State::Running {
            shutdown_tx,
            ticker,
        } = previous
        {
            let _ = shutdown_tx.send(true);
            if let Err(e) = ticker.await {
                tracing::warn!(error = %e, "Scheduler ticker ended abnormally");
            }
            tracing::info!("Scheduler stopped");
        }
    }
}

fn spawn_ticker(
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    tick: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => fire_due(&jobs).await,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

async fn fire_due(jobs: &RwLock<HashMap<String, Job>>) {
    let now = Local::now();
    let mut jobs = jobs.write().await;

    for (id, job) in jobs.iter_mut() {
        let Some(due) = job.next_fire else {
            continue;
        };
        if due > now {
            continue;
        }

        job.next_fire = job.schedule.after(&now).next();

        let id = id.clone();
        let task = Arc::clone(&job.task);
        tracing::debug!(job = %id, scheduled_for = %due, "Firing scheduled job");
        tokio::spawn(async move {
            match task.run().await {
                Ok(()) => tracing::info!(job = %id, "Scheduled job completed"),
                Err(e) => tracing::error!(job = %id, error = %e, "Scheduled job failed"),
            }
        });
    }
}
