//! Fixed-interval driver for a [`Monitor`].
//!
//! A current-thread tokio runtime selects over the command channel and an
//! interval timer. Ticks and connection work run on the blocking pool and are
//! awaited before the next command is read, so ticks never overlap and
//! commands are handled between ticks.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::connection::Connection;
use super::orchestrator::Monitor;
use crate::error::{OramonError, Result};

/// Opens a fresh connection on `Reconnect`
pub type Connector = Box<dyn FnMut() -> Result<Box<dyn Connection>> + Send>;

/// Requests accepted by the runtime loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    Start,
    Stop,
    /// Open a new connection through the connector, then start
    Reconnect,
    /// Extra tick; does not move the interval schedule
    CollectNow,
    SetInterval(Duration),
    Shutdown,
}

pub struct MonitorRuntime {
    monitor: Monitor,
    connector: Option<Connector>,
    commands_tx: UnboundedSender<MonitorCommand>,
    commands_rx: UnboundedReceiver<MonitorCommand>,
}

/// Interval whose first tick fires at `first`
fn schedule(first: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Run blocking monitor work off the runtime thread and hand the monitor back
async fn on_blocking_pool<T, F>(mut monitor: Monitor, work: F) -> Result<(Monitor, T)>
where
    F: FnOnce(&mut Monitor) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let out = work(&mut monitor);
        (monitor, out)
    })
    .await
    .map_err(|e| OramonError::other(format!("Monitor task failed: {}", e)))
}

impl MonitorRuntime {
    pub fn new(monitor: Monitor) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            monitor,
            connector: None,
            commands_tx,
            commands_rx,
        }
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Handle for sending commands from other threads (stdin reader, Ctrl-C)
    pub fn sender(&self) -> UnboundedSender<MonitorCommand> {
        self.commands_tx.clone()
    }

    /// Block the calling thread on a current-thread runtime until `Shutdown`
    /// arrives or every sender is gone, then hand the monitor back.
    pub fn run(self) -> Result<Monitor> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .thread_name("oramon-monitor")
            .build()?;
        runtime.block_on(self.run_async())
    }

    /// The command loop. Must be awaited inside a tokio runtime with time enabled.
    pub async fn run_async(self) -> Result<Monitor> {
        let MonitorRuntime {
            mut monitor,
            connector,
            commands_tx,
            mut commands_rx,
        } = self;
        // Only external senders keep the loop alive
        drop(commands_tx);

        let connector = connector.map(|c| Arc::new(Mutex::new(c)));
        let mut ticker = schedule(Instant::now(), monitor.interval());
        let mut last_tick: Option<Instant> = None;

        loop {
            let active = monitor.is_active();
            tokio::select! {
                command = commands_rx.recv() => {
                    let Some(command) = command else {
                        log::debug!("All command senders dropped");
                        break;
                    };
                    match command {
                        MonitorCommand::Shutdown => {
                            log::info!("Shutting down monitor");
                            break;
                        }
                        MonitorCommand::Start => {
                            let (m, started) = on_blocking_pool(monitor, |m| m.start()).await?;
                            monitor = m;
                            match started {
                                Ok(()) => ticker = schedule(Instant::now(), monitor.interval()),
                                Err(e) => log::error!("Cannot start monitoring: {}", e),
                            }
                        }
                        MonitorCommand::Stop => monitor.stop(),
                        MonitorCommand::Reconnect => {
                            let Some(connect) = connector.clone() else {
                                log::warn!("Reconnect requested but no connector is configured");
                                continue;
                            };
                            let (m, outcome) = on_blocking_pool(monitor, move |m| -> Result<()> {
                                let mut open = connect.lock();
                                let conn = (*open)()?;
                                m.disconnect();
                                m.attach(conn);
                                m.start()
                            })
                            .await?;
                            monitor = m;
                            match outcome {
                                Ok(()) => ticker = schedule(Instant::now(), monitor.interval()),
                                Err(e) => log::error!("Reconnect failed: {}", e),
                            }
                        }
                        MonitorCommand::CollectNow => {
                            let (m, collected) = on_blocking_pool(monitor, |m| m.collect_now()).await?;
                            monitor = m;
                            if let Err(e) = collected {
                                log::error!("Manual collection failed: {}", e);
                            }
                        }
                        MonitorCommand::SetInterval(interval) => match monitor.set_interval(interval) {
                            Ok(()) => {
                                let first = last_tick.map(|at| at + interval).unwrap_or_else(Instant::now);
                                ticker = schedule(first, interval);
                            }
                            Err(e) => log::error!("{}", e),
                        },
                    }
                }
                _ = ticker.tick(), if active => {
                    last_tick = Some(Instant::now());
                    let (m, ticked) = on_blocking_pool(monitor, |m| m.tick()).await?;
                    monitor = m;
                    if let Err(e) = ticked {
                        log::error!("Tick failed: {}", e);
                    }
                }
            }
        }

        monitor.close();
        Ok(monitor)
    }
}
