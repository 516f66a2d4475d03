//! Periodic health supervision.
//!
//! The [`HealthManager`] probes every registered [`HealthMonitorable`] on its
//! own fixed-delay schedule: the next probe is scheduled one interval after
//! the previous probe (and any recovery it triggered) completed, so a slow
//! probe never overlaps itself. Schedules of different monitorables are
//! independent of each other.

use crate::component::{Component, ComponentContext};
use crate::config::HealthConfig;
use crate::error::{KeelError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A unit exposing a liveness probe and a recovery action
#[async_trait]
pub trait HealthMonitorable: Send + Sync + 'static {
    /// Name used in logs and reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn is_healthy(&self) -> bool;

    /// Bring the unit back to a healthy state after a failed probe
    async fn recover(&self) -> anyhow::Result<()>;
}

/// Counters kept for each supervised monitorable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub probes: u64,
    pub unhealthy_probes: u64,
    pub recoveries: u64,
    pub recovery_failures: u64,
    pub last_probe: Option<DateTime<Utc>>,
    /// False once the schedule ended (recovery failure or manager stop)
    pub active: bool,
}

/// Point-in-time view of one schedule
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub name: String,
    pub interval: Duration,
    pub metrics: HealthMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Idle,
    Running,
    Stopped,
}

struct Schedule {
    name: String,
    interval: Duration,
    metrics: Arc<Mutex<HealthMetrics>>,
    handle: JoinHandle<()>,
}

enum ProbeOutcome {
    Healthy,
    Recovered,
    RecoveryFailed(anyhow::Error),
}

/// Supervisor that schedules health probes and drives recovery.
///
/// The manager is itself a [`Component`]: register it with the container
/// after the components it will supervise, so it starts after them and is
/// stopped before them. Monitorables are added once they are running. A
/// stopped manager cannot be started again.
pub struct HealthManager {
    config: HealthConfig,
    state: Mutex<ManagerState>,
    token: CancellationToken,
    schedules: Arc<Mutex<Vec<Schedule>>>,
    report_task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthManager {
    /// Create a new health manager
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ManagerState::Idle),
            token: CancellationToken::new(),
            schedules: Arc::new(Mutex::new(Vec::new())),
            report_task: Mutex::new(None),
        }
    }

    /// Start the health monitoring system
    pub fn start_monitoring(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            ManagerState::Running => return Ok(()),
            ManagerState::Stopped => return Err(KeelError::HealthManagerStopped),
            ManagerState::Idle => *state = ManagerState::Running,
        }
        drop(state);

        info!("Starting system health monitoring");

        if let Some(period) = self.config.report_interval() {
            let handle = tokio::spawn(report_loop(
                period,
                self.token.child_token(),
                Arc::clone(&self.schedules),
            ));
            *self.report_task.lock() = Some(handle);
        }

        Ok(())
    }

    /// Cancel every schedule. In-flight probes are dropped, not awaited.
    pub fn stop_monitoring(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), ManagerState::Stopped);
        if previous == ManagerState::Stopped {
            return;
        }

        self.token.cancel();
        if let Some(handle) = self.report_task.lock().take() {
            handle.abort();
        }

        let schedules = self.schedules.lock();
        for schedule in schedules.iter() {
            schedule.handle.abort();
            schedule.metrics.lock().active = false;
        }

        info!(
            "Health monitoring stopped, {} schedule(s) cancelled",
            schedules.len()
        );
    }

    pub fn is_running(&self) -> bool {
        *self.state.lock() == ManagerState::Running
    }

    /// Probe `monitorable` every `interval` (fixed delay) until the manager
    /// stops or a recovery fails.
    ///
    /// Only add a monitorable that is already started and healthy; the
    /// manager does not check this.
    pub fn add_health_monitorable(
        &self,
        monitorable: Arc<dyn HealthMonitorable>,
        interval: Duration,
    ) -> Result<()> {
        match *self.state.lock() {
            ManagerState::Idle => return Err(KeelError::HealthManagerNotRunning),
            ManagerState::Stopped => return Err(KeelError::HealthManagerStopped),
            ManagerState::Running => {}
        }

        if interval.is_zero() {
            return Err(KeelError::system(format!(
                "Health check interval for {} must be greater than zero",
                monitorable.name()
            )));
        }

        let name = monitorable.name().to_string();
        let metrics = Arc::new(Mutex::new(HealthMetrics {
            active: true,
            ..HealthMetrics::default()
        }));

        let handle = tokio::spawn(supervise(
            monitorable,
            interval,
            Arc::clone(&metrics),
            self.token.child_token(),
        ));

        info!("Monitoring {} every {:?}", name, interval);
        self.schedules.lock().push(Schedule {
            name,
            interval,
            metrics,
            handle,
        });

        Ok(())
    }

    /// [`add_health_monitorable`](Self::add_health_monitorable) with the configured default interval
    pub fn add_health_monitorable_default(
        &self,
        monitorable: Arc<dyn HealthMonitorable>,
    ) -> Result<()> {
        self.add_health_monitorable(monitorable, self.config.default_interval())
    }

    /// Snapshot of every schedule
    pub fn report(&self) -> Vec<MonitorReport> {
        collect_report(&self.schedules)
    }
}

impl Drop for HealthManager {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[async_trait]
impl Component for HealthManager {
    fn name(&self) -> &str {
        "health_manager"
    }

    async fn start(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        self.start_monitoring()?;
        Ok(())
    }

    async fn stop(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        self.stop_monitoring();
        Ok(())
    }
}

/// Clears `active` however the schedule's task ends, panics and aborts included
struct ActiveGuard(Arc<Mutex<HealthMetrics>>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.lock().active = false;
    }
}

/// One monitorable's fixed-delay loop
async fn supervise(
    monitorable: Arc<dyn HealthMonitorable>,
    interval: Duration,
    metrics: Arc<Mutex<HealthMetrics>>,
    token: CancellationToken,
) {
    let _active = ActiveGuard(Arc::clone(&metrics));

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep(interval) => {}
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = probe(monitorable.as_ref(), &metrics) => outcome,
        };

        match outcome {
            ProbeOutcome::Healthy => {}
            ProbeOutcome::Recovered => {
                metrics.lock().recoveries += 1;
                info!("{} recovered", monitorable.name());
            }
            ProbeOutcome::RecoveryFailed(e) => {
                metrics.lock().recovery_failures += 1;
                error!(
                    "Recovery of {} failed, ending its health checks: {:#}",
                    monitorable.name(),
                    e
                );
                break;
            }
        }
    }

    debug!("Health schedule for {} ended", monitorable.name());
}

async fn probe(monitorable: &dyn HealthMonitorable, metrics: &Mutex<HealthMetrics>) -> ProbeOutcome {
    let healthy = monitorable.is_healthy().await;
    {
        let mut metrics = metrics.lock();
        metrics.probes += 1;
        metrics.last_probe = Some(Utc::now());
        if !healthy {
            metrics.unhealthy_probes += 1;
        }
    }

    if healthy {
        return ProbeOutcome::Healthy;
    }

    warn!("{} is unhealthy, attempting recovery", monitorable.name());
    match monitorable.recover().await {
        Ok(()) => ProbeOutcome::Recovered,
        Err(e) => ProbeOutcome::RecoveryFailed(e),
    }
}

async fn report_loop(
    period: Duration,
    token: CancellationToken,
    schedules: Arc<Mutex<Vec<Schedule>>>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => log_report(&collect_report(&schedules)),
        }
    }
}

fn collect_report(schedules: &Mutex<Vec<Schedule>>) -> Vec<MonitorReport> {
    schedules
        .lock()
        .iter()
        .map(|schedule| MonitorReport {
            name: schedule.name.clone(),
            interval: schedule.interval,
            metrics: schedule.metrics.lock().clone(),
        })
        .collect()
}

/// Generate periodic health report
fn log_report(report: &[MonitorReport]) {
    info!("=== System Health Report ===");

    for entry in report {
        let metrics = &entry.metrics;
        if !metrics.active {
            warn!(
                "{}: schedule ended after {} probe(s), {} recovery failure(s)",
                entry.name, metrics.probes, metrics.recovery_failures
            );
        } else if metrics.unhealthy_probes > 0 {
            warn!(
                "{}: {} probe(s), {} unhealthy, {} recovered",
                entry.name, metrics.probes, metrics.unhealthy_probes, metrics.recoveries
            );
        } else {
            debug!("{}: {} probe(s), healthy", entry.name, metrics.probes);
        }
    }

    info!("=== End Health Report ===");
}
