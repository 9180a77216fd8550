//! Simulator supervisor: one acceptor task and one broadcaster task per
//! sensor, with independent lifecycles across sensors.

use crate::acceptor::{Acceptor, AcceptorError};
use crate::broadcaster::{BroadcastStats, Broadcaster};
use crate::config::{ConfigError, NetworkConfig};
use crate::registry::ReceiverRegistry;
use sensim_core::{ReadingGenerator, Sensor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Where one sensor will listen and how often it will broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSensor {
    pub sensor_id: u16,
    pub sensor_type: String,
    pub addr: SocketAddr,
    pub interval: Duration,
}

/// Whether a sensor's acceptor came up.
#[derive(Debug)]
pub enum ListenerStatus {
    Listening(SocketAddr),
    Failed(AcceptorError),
}

/// Handles the supervisor keeps for one running sensor.
pub struct SensorHandle {
    sensor: Arc<Sensor>,
    registry: ReceiverRegistry,
    listener: ListenerStatus,
    stats: Arc<BroadcastStats>,
}

impl SensorHandle {
    pub fn sensor(&self) -> &Sensor {
        &self.sensor
    }

    pub fn listener(&self) -> &ListenerStatus {
        &self.listener
    }

    /// Bound address, or `None` if the acceptor failed to start.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.listener {
            ListenerStatus::Listening(addr) => Some(addr),
            ListenerStatus::Failed(_) => None,
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &ReceiverRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Acceptor,
    Broadcaster,
}

/// Builds and starts the fleet from validated sensor definitions.
pub struct Supervisor {
    sensors: Vec<Sensor>,
    network: NetworkConfig,
    seed: u64,
}

impl Supervisor {
    /// Fails if any sensor's port would fall outside the TCP port range.
    pub fn new(sensors: Vec<Sensor>, network: NetworkConfig, seed: u64) -> Result<Self, ConfigError> {
        network.validate()?;
        for sensor in &sensors {
            network.listen_addr(sensor)?;
        }
        Ok(Self {
            sensors,
            network,
            seed,
        })
    }

    pub fn plan(&self) -> Vec<PlannedSensor> {
        self.sensors
            .iter()
            .filter_map(|sensor| {
                let addr = self.network.listen_addr(sensor).ok()?;
                Some(PlannedSensor {
                    sensor_id: sensor.id(),
                    sensor_type: sensor.sensor_type().to_string(),
                    addr,
                    interval: sensor.sleep_interval(),
                })
            })
            .collect()
    }

    /// Bind every listener and spawn all tasks. Must run inside a tokio runtime.
    ///
    /// A sensor whose listener cannot bind keeps its broadcaster; only the
    /// failure is logged and recorded in its [`ListenerStatus`].
    pub fn start(self) -> RunningFleet {
        info!(
            sensors = self.sensors.len(),
            base_port = self.network.base_port,
            seed = self.seed,
            "Starting sensor fleet"
        );

        let mut tasks = JoinSet::new();
        let mut handles = Vec::with_capacity(self.sensors.len());

        for sensor in self.sensors {
            let sensor = Arc::new(sensor);
            let sensor_id = sensor.id();
            let registry = ReceiverRegistry::new();

            let listener = match self.network.listen_addr(&sensor) {
                Ok(addr) => bind_acceptor(&sensor, addr, &self.network, &registry, &mut tasks),
                Err(e) => {
                    error!(sensor_id, error = %e, "Sensor skipped");
                    continue;
                }
            };

            let broadcaster = Broadcaster::new(
                Arc::clone(&sensor),
                ReadingGenerator::for_sensor(self.seed, &sensor),
                registry.clone(),
                self.network.write_timeout(),
            );
            let stats = broadcaster.stats();
            tasks.spawn(async move {
                broadcaster.run().await;
                (sensor_id, TaskKind::Broadcaster)
            });

            handles.push(SensorHandle {
                sensor,
                registry,
                listener,
                stats,
            });
        }

        RunningFleet { handles, tasks }
    }
}

fn bind_acceptor(
    sensor: &Sensor,
    addr: SocketAddr,
    network: &NetworkConfig,
    registry: &ReceiverRegistry,
    tasks: &mut JoinSet<(u16, TaskKind)>,
) -> ListenerStatus {
    let sensor_id = sensor.id();
    let acceptor = Acceptor::bind(
        sensor_id,
        addr,
        network.backlog,
        registry.clone(),
        network.accept_retry(),
    );

    match acceptor {
        Ok(acceptor) => {
            let bound = acceptor.local_addr().unwrap_or(addr);
            tasks.spawn(async move {
                acceptor.run().await;
                (sensor_id, TaskKind::Acceptor)
            });
            ListenerStatus::Listening(bound)
        }
        Err(e) => {
            error!(
                sensor_id,
                error = %e,
                "Acceptor failed to start; sensor keeps broadcasting to no new receivers"
            );
            ListenerStatus::Failed(e)
        }
    }
}

/// The running fleet: per-sensor handles plus every spawned task.
pub struct RunningFleet {
    handles: Vec<SensorHandle>,
    tasks: JoinSet<(u16, TaskKind)>,
}

impl RunningFleet {
    pub fn sensors(&self) -> &[SensorHandle] {
        &self.handles
    }

    pub fn sensor(&self, sensor_id: u16) -> Option<&SensorHandle> {
        self.handles
            .iter()
            .find(|handle| handle.sensor.id() == sensor_id)
    }

    /// Wait until every task has ended, which in normal operation is never.
    /// A task ending or panicking is logged and does not disturb the others.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((sensor_id, kind)) => {
                    warn!(sensor_id, task = ?kind, "Sensor task exited");
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    error!(error = %e, "Sensor task panicked");
                }
            }
        }
    }

    /// Abort every task and close every receiver connection.
    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;

        let closed: usize = self
            .handles
            .iter()
            .map(|handle| handle.registry.close())
            .sum();
        info!(
            sensors = self.handles.len(),
            receivers_closed = closed,
            "Sensor fleet stopped"
        );
    }
}
