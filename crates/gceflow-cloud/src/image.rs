//! Operating system info derived from image names

use crate::resource::name_from_link;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
    /// `debian`, `centos`, ...; `linux` when the name has no recognisable shape
    pub family: String,
    /// Middle name segments joined with `.` (`7.wheezy`)
    pub version: Option<String>,
    pub is_64bit: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Last path segment of the image link
    pub id: String,
    pub link: String,
    /// Trailing name segment, usually a date stamp (`v20140718`)
    pub build: Option<String>,
    pub os: OperatingSystem,
}

impl ImageInfo {
    /// Parse `<family>-<version parts...>-<build>` out of an image link or name
    pub fn from_link(link: &str) -> Self {
        let id = name_from_link(link).to_string();
        let parts: Vec<&str> = id.split('-').collect();

        let (family, version, build) = if parts.len() < 3 {
            ("linux".to_string(), None, None)
        } else {
            (
                parts[0].to_string(),
                Some(parts[1..parts.len() - 1].join(".")),
                parts.last().map(|s| s.to_string()),
            )
        };

        Self {
            link: link.to_string(),
            build,
            os: OperatingSystem {
                family,
                version,
                is_64bit: true,
                description: id.clone(),
            },
            id,
        }
    }
}
