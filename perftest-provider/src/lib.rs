//! Topology provisioning for IPA performance tests
//!
//! A [`Provider`] turns a role manifest into running hosts and reports
//! their addresses as a [`HostTopology`]. Two backends are available: a
//! local Vagrant/libvirt one and the pooled IdM-CI reservation system.
//! Every external program goes through the [`CommandRunner`] seam.

pub mod command;
pub mod error;
pub mod idmci;
pub mod ip;
pub mod settings;
pub mod templates;
pub mod topology;
pub mod traits;
pub mod vagrant;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use error::{ProviderError, ProviderResult};
pub use idmci::IdmciProvider;
pub use ip::PrivateIpAllocator;
pub use settings::ProviderSettings;
pub use templates::TemplateEngine;
pub use topology::{HostRole, HostTopology, ProvisioningPlan, RoleDescriptor, RoleKind};
pub use traits::Provider;
pub use vagrant::VagrantProvider;
