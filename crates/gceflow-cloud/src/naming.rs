//! Resource naming conventions

use crate::error::{CloudError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const BOOT_DISK_SUFFIX: &str = "boot";

/// Platform-provided network that is never reclaimed
pub const DEFAULT_NETWORK: &str = "default";

pub const METADATA_SSH_KEYS: &str = "sshKeys";
pub const METADATA_GROUP: &str = "gceflow-group";
pub const METADATA_IMAGE: &str = "gceflow-image";
pub const METADATA_DELETE_BOOT_DISK: &str = "gceflow-delete-boot-disk";

const MAX_NAME_LEN: usize = 63;

pub fn boot_disk_name(instance: &str) -> String {
    format!("{}-{}", instance, BOOT_DISK_SUFFIX)
}

/// `jclouds-test` + `[22]` → `jclouds-test-port-22`
pub fn firewall_name(network: &str, ports: &[u16]) -> String {
    let mut name = format!("{}-port", network);
    for port in ports {
        name.push('-');
        name.push_str(&port.to_string());
    }
    name
}

pub fn group_network_name(prefix: &str, group: &str) -> String {
    format!("{}-{}", prefix, group)
}

/// Check a name against the platform rule `[a-z]([-a-z0-9]*[a-z0-9])?`
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CloudError::InvalidConfig(format!(
            "'{}' is not a valid resource name (lowercase letters, digits and '-', starting with a letter)",
            name
        )))
    }
}

pub fn validate_group(group: &str) -> Result<()> {
    validate_name(group)?;
    // Room for "-<n>-boot"
    if group.len() + 10 > MAX_NAME_LEN {
        return Err(CloudError::InvalidConfig(format!(
            "group name '{}' is too long",
            group
        )));
    }
    Ok(())
}

/// Pick `count` names `<group>-<n>` using the lowest free indices
pub fn next_node_names<'a, I>(group: &str, existing: I, count: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format!("{}-", group);
    let taken: BTreeSet<u32> = existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix.as_str()))
        .filter_map(|suffix| suffix.parse().ok())
        .collect();

    (1u32..)
        .filter(|n| !taken.contains(n))
        .take(count)
        .map(|n| format!("{}{}", prefix, n))
        .collect()
}

/// Node identifier in the form `<zone>/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub zone: String,
    pub name: String,
}

impl NodeId {
    pub fn new(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
        }
    }
}

impl FromStr for NodeId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((zone, name)) if !zone.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(NodeId::new(zone, name))
            }
            _ => Err(CloudError::InvalidNodeId(s.to_string())),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        assert_eq!(boot_disk_name("test-1"), "test-1-boot");
        assert_eq!(firewall_name("jclouds-test", &[22]), "jclouds-test-port-22");
        assert_eq!(
            firewall_name("net", &[22, 8080]),
            "net-port-22-8080"
        );
        assert_eq!(group_network_name("gceflow", "web"), "gceflow-web");
    }

    #[test]
    fn test_next_node_names_fills_gaps() {
        assert_eq!(next_node_names("test", Vec::<&str>::new(), 1), vec!["test-1"]);

        let existing = ["web-1", "web-3", "webby-2", "web-x"];
        assert_eq!(
            next_node_names("web", existing, 3),
            vec!["web-2", "web-4", "web-5"]
        );
    }

    #[test]
    fn test_node_id_parse() {
        let id: NodeId = "us-central1-a/test-delete-networks".parse().unwrap();
        assert_eq!(id.zone, "us-central1-a");
        assert_eq!(id.name, "test-delete-networks");
        assert_eq!(id.to_string(), "us-central1-a/test-delete-networks");

        for bad in ["", "no-slash", "/name", "zone/", "a/b/c"] {
            assert!(
                matches!(bad.parse::<NodeId>(), Err(CloudError::InvalidNodeId(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_validate_group() {
        assert!(validate_group("test").is_ok());
        assert!(validate_group("web-tier2").is_ok());
        assert!(validate_group("Web").is_err());
        assert!(validate_group("1web").is_err());
        assert!(validate_group("web-").is_err());
        assert!(validate_group("web_1").is_err());
        assert!(validate_group(&"a".repeat(60)).is_err());
    }
}
