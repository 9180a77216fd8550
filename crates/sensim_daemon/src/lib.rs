//! Sensor fleet simulator runtime.
//!
//! For every configured sensor an [`Acceptor`] admits TCP receivers into a
//! [`ReceiverRegistry`] while a [`Broadcaster`] writes one `$FIX` reading per
//! cycle to everything in it. The [`Supervisor`] wires the pairs together and
//! owns the running fleet.

pub mod acceptor;
pub mod broadcaster;
pub mod config;
pub mod logging;
pub mod receiver;
pub mod registry;
pub mod supervisor;

pub use acceptor::{Acceptor, AcceptorError};
pub use broadcaster::{BroadcastStats, Broadcaster, CycleReport};
pub use config::{ConfigError, DaemonConfig, LoggingConfig, NetworkConfig};
pub use receiver::{Receiver, ReceiverId, SendError};
pub use registry::ReceiverRegistry;
pub use supervisor::{ListenerStatus, PlannedSensor, RunningFleet, SensorHandle, Supervisor};
