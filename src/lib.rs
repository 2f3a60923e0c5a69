//! litefs-adapter - cluster coordination for LiteFS-backed applications
//!
//! The runtime layer that lets a pool of application processes, each
//! mounting a replicated SQLite database, behave as one highly-available
//! system:
//!
//! - role determination under static or consensus leader election
//! - a guarded failover state machine with health and quorum checks
//! - split-brain detection and marker fencing
//! - a write-path guard that rejects writes on replicas
//! - HTTP forwarding of mutating requests to the primary
//! - liveness and readiness probes for external schedulers
//!
//! Consensus itself, the replication daemon and its binary distribution
//! live behind ports; the core only reads the daemon's mount-point
//! artifacts and forwards HTTP through its proxy.

pub mod cluster;
pub mod config;
pub mod events;
pub mod failover;
pub mod forward;
pub mod guard;
pub mod health;
pub mod http_server;
pub mod metrics;
pub mod mount;
pub mod ports;
pub mod role;
pub mod sql;
