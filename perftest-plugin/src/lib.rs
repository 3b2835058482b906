//! Lifecycle engine for IPA performance tests
//!
//! A [`TestPlugin`] describes one kind of test through a handful of hooks.
//! The [`Lifecycle`] drives it through the fixed [`Stage`] sequence:
//! provisioning, configuration, the workload, log collection and result
//! checks. The [`Dispatcher`] resolves test names through the
//! [`TestRegistry`], converts a failed stage into a CRITICAL result and
//! renders what was recorded.
//!
//! Hosts are reached through two seams, [`RemoteExecutor`] for single
//! commands and [`ProcedureRunner`] for Ansible playbooks, so the whole
//! pipeline can run against in-memory collaborators.

pub mod archive;
pub mod catalog;
pub mod concurrency;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod procedure;
pub mod registry;
pub mod remote;
pub mod stage;
pub mod templates;
pub mod threshold;
pub mod tiers;
pub mod transport;
pub mod wait;
pub mod workspace;

pub use archive::{create_archive, timestamp};
pub use catalog::{ProviderCatalog, ProviderFactory};
pub use concurrency::{fan_out, run_sequentially, FanOut, JobOutcome, RemoteJob, SyncPoint};
pub use crate::core::{Measurement, StageContext, TestPlugin};
pub use dispatch::{Dispatcher, RunReport};
pub use error::{failure_trace, PluginError, PluginResult};
pub use inventory::{Inventory, ADMIN_PASSWORD};
pub use lifecycle::{Lifecycle, RunSummary, DOMAIN};
pub use procedure::{AnsibleRunner, Procedure, ProcedureKind, ProcedureOutcome, ProcedureRunner};
pub use registry::{TestFactory, TestRegistry};
pub use remote::{RemoteAccess, RemoteExecutor, RemoteOutput, RemoteTarget, SshExecutor};
pub use stage::Stage;
pub use threshold::evaluate_threshold;
pub use tiers::{Parent, ReplicaNode, ReplicaTree};
pub use transport::{SystemTransport, Transport};
pub use wait::poll_until;
pub use workspace::{reset_dir, WorkspaceLayout};
