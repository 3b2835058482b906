//! Hosts, roles and the provisioned topology

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{ProviderError, ProviderResult};

/// What a provider is asked to create for one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Server,
    Client,
    Ad,
}

/// One entry of the role manifest handed to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Fully qualified host name
    pub hostname: String,
    #[serde(rename = "type")]
    pub kind: RoleKind,
}

impl RoleDescriptor {
    pub fn new(name: &str, domain: &str, kind: RoleKind) -> Self {
        Self {
            hostname: format!("{}.{}", name, domain).to_lowercase(),
            kind,
        }
    }

    pub fn server(domain: &str) -> Self {
        Self::new("server", domain, RoleKind::Server)
    }

    /// Replicas are sized and imaged like the server
    pub fn replica(index: u32, domain: &str) -> Self {
        Self::new(&format!("replica{}", index), domain, RoleKind::Server)
    }

    pub fn client(name: &str, domain: &str) -> Self {
        Self::new(name, domain, RoleKind::Client)
    }

    /// The trust peer is always named `ad`
    pub fn ad(domain: &str) -> Self {
        Self::new("ad", domain, RoleKind::Ad)
    }

    /// Host name without the domain
    pub fn short_name(&self) -> &str {
        self.hostname
            .split_once('.')
            .map_or(self.hostname.as_str(), |(name, _)| name)
    }
}

/// Role of a provisioned host, derived from its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostRole {
    Server,
    Replica,
    Client,
    Ad,
    Other,
}

impl HostRole {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("server") {
            HostRole::Server
        } else if name.starts_with("replica") {
            HostRole::Replica
        } else if name.starts_with("client") {
            HostRole::Client
        } else if name.starts_with("ad") || name.starts_with("windows") {
            HostRole::Ad
        } else {
            HostRole::Other
        }
    }
}

/// Host name to address mapping produced once by a provider.
///
/// There are no mutating methods; later stages only read it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTopology {
    hosts: BTreeMap<String, String>,
}

impl HostTopology {
    /// Build from discovered pairs, rejecting a name seen twice
    pub fn from_pairs<I, N, A>(pairs: I) -> ProviderResult<Self>
    where
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: Into<String>,
    {
        let mut hosts = BTreeMap::new();
        for (name, address) in pairs {
            let name = name.into();
            if hosts.contains_key(&name) {
                return Err(ProviderError::DuplicateHost(name));
            }
            hosts.insert(name, address.into());
        }
        Ok(Self { hosts })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn address(&self, name: &str) -> Option<&str> {
        self.hosts.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    /// `(name, address)` pairs ordered by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.hosts.iter().map(|(n, a)| (n.as_str(), a.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.hosts.keys().map(String::as_str)
    }

    /// Hosts whose name classifies as `role`
    pub fn with_role(&self, role: HostRole) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.iter()
            .filter(move |(name, _)| HostRole::from_name(name) == role)
    }

    pub fn count(&self, role: HostRole) -> usize {
        self.with_role(role).count()
    }

    pub fn clients(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.with_role(HostRole::Client)
    }

    pub fn server_address(&self) -> Option<&str> {
        self.address("server")
    }
}

impl fmt::Display for HostTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .iter()
            .map(|(name, address)| format!("{}={}", name, address))
            .collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

/// What a provider wrote while describing the topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    /// Native description file (Vagrantfile, metadata.yaml)
    pub description: PathBuf,
    /// Short names of every requested host, in manifest order
    pub hosts: Vec<String>,
}

impl ProvisioningPlan {
    pub fn requested(&self) -> usize {
        self.hosts.len()
    }
}
