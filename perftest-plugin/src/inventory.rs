//! Ansible inventory derived from the provisioned topology

use perftest_provider::{HostRole, HostTopology, TemplateEngine};
use serde::Serialize;
use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::templates::INVENTORY_TEMPLATE;
use crate::tiers::{Parent, ReplicaTree};

/// Admin and Directory Manager password of the test deployment
pub const ADMIN_PASSWORD: &str = "password";

#[derive(Debug, Serialize)]
struct HostLine<'a> {
    name: &'a str,
    address: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplicaLine<'a> {
    name: &'a str,
    address: &'a str,
    parent: String,
}

#[derive(Debug, Serialize)]
struct TierGroup<'a> {
    tier: usize,
    hosts: Vec<ReplicaLine<'a>>,
}

#[derive(Debug, Serialize)]
struct InventoryData<'a> {
    domain: String,
    realm: String,
    password: &'static str,
    server: HostLine<'a>,
    tiers: Vec<TierGroup<'a>>,
    clients: Vec<HostLine<'a>>,
    ad: Option<HostLine<'a>>,
    ad_password: &'a str,
}

/// Replicas that came up, ordered by index
pub fn present_replicas(topology: &HostTopology) -> Vec<(u32, &str, &str)> {
    let mut replicas: Vec<_> = topology
        .with_role(HostRole::Replica)
        .filter_map(|(name, address)| {
            let index = name.strip_prefix("replica")?.parse::<u32>().ok()?;
            Some((index, name, address))
        })
        .collect();
    replicas.sort_unstable_by_key(|(index, _, _)| *index);
    replicas
}

/// Inventory plus the replica tree it encodes
#[derive(Debug, Clone)]
pub struct Inventory {
    pub content: String,
    /// Tree over the replicas that actually came up
    pub tree: ReplicaTree,
    /// Host names of each tier, tier by tier
    pub tier_hosts: Vec<Vec<String>>,
}

impl Inventory {
    /// Build the inventory for `topology`.
    ///
    /// Replicas are placed in the tree in index order; a replica that failed
    /// to come up is left out and the tree closes over the gap.
    pub fn render(
        engine: &TemplateEngine,
        topology: &HostTopology,
        domain: &str,
        ad_password: &str,
    ) -> PluginResult<Self> {
        let domain = domain.to_lowercase();
        let server_address = topology
            .server_address()
            .ok_or_else(|| PluginError::workload("no server host in topology"))?;

        let replicas = present_replicas(topology);
        let tree = ReplicaTree::build(replicas.len() as u32);
        let fqdn = |parent: Parent| match parent {
            Parent::Server => format!("server.{}", domain),
            Parent::Replica(position) => {
                format!("{}.{}", replicas[position as usize].1, domain)
            }
        };

        let tiers: Vec<TierGroup> = tree
            .tiers()
            .iter()
            .enumerate()
            .map(|(tier, nodes)| TierGroup {
                tier,
                hosts: nodes
                    .iter()
                    .map(|node| {
                        let (_, name, address) = replicas[node.index as usize];
                        ReplicaLine {
                            name,
                            address,
                            parent: fqdn(node.parent),
                        }
                    })
                    .collect(),
            })
            .collect();
        let tier_hosts = tiers
            .iter()
            .map(|group| group.hosts.iter().map(|h| h.name.to_string()).collect())
            .collect();

        let data = InventoryData {
            realm: domain.to_uppercase(),
            domain: domain.clone(),
            password: ADMIN_PASSWORD,
            server: HostLine {
                name: "server",
                address: server_address,
            },
            tiers,
            clients: topology
                .clients()
                .map(|(name, address)| HostLine { name, address })
                .collect(),
            ad: topology
                .with_role(HostRole::Ad)
                .next()
                .map(|(name, address)| HostLine { name, address }),
            ad_password,
        };

        let content = engine.render("inventory", INVENTORY_TEMPLATE, &data)?;
        debug!(
            replicas = tree.replica_count(),
            tiers = tree.tier_count(),
            "Inventory rendered"
        );
        Ok(Self {
            content,
            tree,
            tier_hosts,
        })
    }

    /// Inventory group holding the replicas of `tier`
    pub fn tier_group(tier: usize) -> String {
        format!("ipareplicas_tier{}", tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(replicas: u32, clients: u32) -> HostTopology {
        let mut pairs = vec![("server".to_string(), "192.168.3.2".to_string())];
        for i in 0..replicas {
            pairs.push((format!("replica{}", i), format!("192.168.3.{}", 10 + i)));
        }
        for i in 0..clients {
            pairs.push((format!("client{:03}", i), format!("192.168.4.{}", 2 + i)));
        }
        HostTopology::from_pairs(pairs).unwrap()
    }

    fn lines(content: &str) -> Vec<&str> {
        content.lines().map(str::trim).collect()
    }

    #[test]
    fn test_server_and_clients() {
        let engine = TemplateEngine::new();
        let inventory = Inventory::render(&engine, &topology(0, 2), "IPA.test", "vagrant").unwrap();
        let lines = lines(&inventory.content);

        assert!(lines.contains(&"server ansible_host=192.168.3.2"));
        assert!(lines.contains(&"client000 ansible_host=192.168.4.2"));
        assert!(lines.contains(&"client001 ansible_host=192.168.4.3"));
        assert!(lines.contains(&"ipaserver_domain=ipa.test"));
        assert!(lines.contains(&"ipaserver_realm=IPA.TEST"));
        assert!(lines.contains(&"ipaadmin_password=password"));
        assert!(!inventory.content.contains("[ad]"));
        assert!(inventory.tree.is_empty());
    }

    #[test]
    fn test_replica_tiers() {
        let engine = TemplateEngine::new();
        let inventory = Inventory::render(&engine, &topology(5, 0), "ipa.test", "vagrant").unwrap();
        let lines = lines(&inventory.content);

        assert!(lines.contains(&"[ipareplicas_tier0]"));
        assert!(lines.contains(&"[ipareplicas_tier1]"));
        assert!(lines.contains(
            &"replica0 ansible_host=192.168.3.10 ipareplica_servers=server.ipa.test"
        ));
        assert!(lines.contains(
            &"replica4 ansible_host=192.168.3.14 ipareplica_servers=replica0.ipa.test"
        ));
        assert_eq!(
            inventory.tier_hosts,
            vec![
                vec!["replica0", "replica1", "replica2", "replica3"],
                vec!["replica4"]
            ]
        );
    }

    #[test]
    fn test_missing_replica_closes_gap() {
        let engine = TemplateEngine::new();
        let topology = HostTopology::from_pairs([
            ("server", "10.0.0.1"),
            ("replica0", "10.0.0.2"),
            ("replica2", "10.0.0.4"),
        ])
        .unwrap();
        let inventory = Inventory::render(&engine, &topology, "ipa.test", "vagrant").unwrap();
        assert_eq!(inventory.tier_hosts, vec![vec!["replica0", "replica2"]]);
    }

    #[test]
    fn test_replicas_sorted_numerically() {
        let topology = topology(12, 0);
        let names: Vec<_> = present_replicas(&topology).iter().map(|r| r.1).collect();
        assert_eq!(names[2], "replica2");
        assert_eq!(names[11], "replica11");
    }

    #[test]
    fn test_ad_group() {
        let engine = TemplateEngine::new();
        let topology =
            HostTopology::from_pairs([("server", "10.0.0.1"), ("ad", "10.0.0.9")]).unwrap();
        let inventory = Inventory::render(&engine, &topology, "ipa.test", "Secret123").unwrap();
        let lines = lines(&inventory.content);
        assert!(lines.contains(&"ad ansible_host=10.0.0.9"));
        assert!(lines.contains(&"ansible_password=Secret123"));
        assert!(lines.contains(&"ansible_connection=winrm"));
    }

    #[test]
    fn test_missing_server_rejected() {
        let engine = TemplateEngine::new();
        let topology = HostTopology::from_pairs([("client000", "10.0.0.5")]).unwrap();
        assert!(Inventory::render(&engine, &topology, "ipa.test", "x").is_err());
    }
}
