//! Routing-group segmentation on a shared transit hub.
//!
//! Each declared group gets its own transit routing domain. The implicit
//! `hub` group reaches and is reached by every group. Reachability is
//! structural: a network's routes are propagated only into the domains of
//! groups its own group may reach, so an absent propagation means no route.
//! Security groups and network ACLs are still expected on top of this.

use crate::config::RoutingGroupConfig;
use crate::error::SynthError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Reserved name of the implicit hub group
pub const HUB: &str = "hub";

/// Declared groups and their directed reachability edges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingGroups {
    allowed: BTreeMap<String, BTreeSet<String>>,
}

/// Association and propagations for one network attached to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAttachment {
    pub network: String,
    pub group: String,
    /// Routing domain the attachment is associated with
    pub association: String,
    /// Routing domains that receive this network's routes
    pub propagations: Vec<String>,
}

impl RoutingGroups {
    /// Declare groups from configuration.
    ///
    /// # Arguments
    /// * `groups` - group name to allowed peer groups
    ///
    /// # Returns
    /// * `Err(SynthError::Configuration)` if a group is named `hub`
    /// * `Err(SynthError::NotFound)` if an allowed group is never declared
    pub fn declare(groups: &BTreeMap<String, RoutingGroupConfig>) -> Result<Self, SynthError> {
        let mut allowed = BTreeMap::new();

        for (name, group) in groups {
            if name == HUB {
                return Err(SynthError::configuration(
                    "segmentation.groups",
                    format!("'{}' is reserved for the implicit transit hub group", HUB),
                ));
            }
            if name.trim().is_empty() {
                return Err(SynthError::validation("segmentation.groups", name, "group name must not be empty"));
            }

            let mut peers = BTreeSet::new();
            for peer in &group.allowed_groups {
                if peer != HUB && !groups.contains_key(peer) {
                    return Err(SynthError::not_found("routing group", peer));
                }
                peers.insert(peer.clone());
            }
            allowed.insert(name.clone(), peers);
        }

        log::info!("Declared {} routing group(s) plus {}", allowed.len(), HUB);
        Ok(Self { allowed })
    }

    pub fn is_declared(&self, group: &str) -> bool {
        group == HUB || self.allowed.contains_key(group)
    }

    /// Whether group `a` may route to group `b`
    pub fn reachability(&self, a: &str, b: &str) -> bool {
        if a == HUB || b == HUB {
            return true;
        }
        self.allowed.get(a).is_some_and(|peers| peers.contains(b))
    }

    /// Every routing domain, hub first
    pub fn domains(&self) -> Vec<String> {
        std::iter::once(HUB.to_string()).chain(self.allowed.keys().cloned()).collect()
    }

    /// Bind a network to a group's routing domain.
    ///
    /// Routes propagate to the group's own domain, the hub domain and the
    /// domain of every group this one may reach.
    pub fn attach(&self, network: &str, group: &str) -> Result<GroupAttachment, SynthError> {
        if !self.is_declared(group) {
            return Err(SynthError::not_found("routing group", group));
        }

        let propagations: Vec<String> = self
            .domains()
            .into_iter()
            .filter(|domain| domain == group || self.reachability(group, domain))
            .collect();

        log::debug!("Attached {} to routing group {}, propagating to {:?}", network, group, propagations);
        Ok(GroupAttachment {
            network: network.to_string(),
            group: group.to_string(),
            association: group.to_string(),
            propagations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(entries: &[(&str, &[&str])]) -> BTreeMap<String, RoutingGroupConfig> {
        entries
            .iter()
            .map(|(name, allowed)| {
                (
                    name.to_string(),
                    RoutingGroupConfig {
                        allowed_groups: allowed.iter().map(|s| s.to_string()).collect(),
                    },
                )
            })
            .collect()
    }

    fn sample() -> RoutingGroups {
        RoutingGroups::declare(&groups(&[
            ("production", &[]),
            ("development", &["test"]),
            ("test", &["development"]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_reachability() {
        let groups = sample();
        assert!(!groups.reachability("production", "test"));
        assert!(!groups.reachability("test", "production"));
        assert!(groups.reachability("development", "test"));
        assert!(groups.reachability("test", "development"));
        for group in ["production", "development", "test"] {
            assert!(groups.reachability(group, HUB));
            assert!(groups.reachability(HUB, group));
        }
    }

    #[test]
    fn test_reachability_is_directed() {
        let groups = RoutingGroups::declare(&groups(&[("shared", &[]), ("apps", &["shared"])])).unwrap();
        assert!(groups.reachability("apps", "shared"));
        assert!(!groups.reachability("shared", "apps"));
    }

    #[test]
    fn test_hub_is_reserved() {
        let err = RoutingGroups::declare(&groups(&[(HUB, &[])])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_peer_group() {
        let err = RoutingGroups::declare(&groups(&[("production", &["staging"])])).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_domains_include_hub() {
        assert_eq!(sample().domains(), vec!["hub", "development", "production", "test"]);
    }

    #[test]
    fn test_attach_follows_reachability_direction() {
        let groups = RoutingGroups::declare(&groups(&[("shared", &[]), ("apps", &["shared"])])).unwrap();

        let apps = groups.attach("frontend", "apps").unwrap();
        assert_eq!(apps.propagations, vec!["hub", "apps", "shared"]);

        let shared = groups.attach("registry", "shared").unwrap();
        assert_eq!(shared.propagations, vec!["hub", "shared"]);
    }

    #[test]
    fn test_attach_propagates_to_reachable_domains_only() {
        let groups = sample();

        let prod = groups.attach("payments", "production").unwrap();
        assert_eq!(prod.association, "production");
        assert_eq!(prod.propagations, vec!["hub", "production"]);

        let dev = groups.attach("sandbox", "development").unwrap();
        assert_eq!(dev.propagations, vec!["hub", "development", "test"]);

        let shared = groups.attach("dns", HUB).unwrap();
        assert_eq!(shared.propagations, vec!["hub", "development", "production", "test"]);

        assert!(groups.attach("x", "staging").unwrap_err().is_not_found());
    }
}
