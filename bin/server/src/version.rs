use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Protocol versions the server knows about, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "2.0")]
    V2_0,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1_0 => "1.0",
            ProtocolVersion::V1_1 => "1.1",
            ProtocolVersion::V2_0 => "2.0",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1.0" => Some(ProtocolVersion::V1_0),
            "1.1" => Some(ProtocolVersion::V1_1),
            "2.0" => Some(ProtocolVersion::V2_0),
            _ => None,
        }
    }
}

/// Inclusive version range; an open `max` accepts anything at or above
/// `min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: ProtocolVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<ProtocolVersion>,
}

impl VersionRange {
    pub fn contains(&self, version: ProtocolVersion) -> bool {
        if version < self.min {
            return false;
        }
        match self.max {
            Some(max) => version <= max,
            None => true,
        }
    }
}

/// Negotiates the protocol version for a session.
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    supported: Vec<ProtocolVersion>,
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new(vec![
            ProtocolVersion::V1_0,
            ProtocolVersion::V1_1,
            ProtocolVersion::V2_0,
        ])
    }
}

impl VersionNegotiator {
    pub fn new(mut supported: Vec<ProtocolVersion>) -> Self {
        supported.sort();
        supported.dedup();
        Self { supported }
    }

    pub fn latest(&self) -> Option<ProtocolVersion> {
        self.supported.last().copied()
    }

    pub fn is_supported(&self, version: ProtocolVersion) -> bool {
        self.supported.contains(&version)
    }

    /// Highest member of the intersection with the client's version set.
    pub fn negotiate_set(&self, client_versions: &[ProtocolVersion]) -> Option<ProtocolVersion> {
        let negotiated = self
            .supported
            .iter()
            .rev()
            .find(|v| client_versions.contains(v))
            .copied();
        match negotiated {
            Some(version) => debug!("Negotiated protocol version {}", version.as_str()),
            None => warn!(
                "No compatible protocol version; server supports {:?}, client offered {:?}",
                self.supported, client_versions
            ),
        }
        negotiated
    }

    /// Highest supported version inside the client's range.
    pub fn negotiate_range(&self, range: &VersionRange) -> Option<ProtocolVersion> {
        self.supported
            .iter()
            .rev()
            .find(|v| range.contains(**v))
            .copied()
    }

    pub fn supported_range(&self) -> Option<VersionRange> {
        Some(VersionRange {
            min: *self.supported.first()?,
            max: self.supported.last().copied(),
        })
    }
}

/// Map of feature names to the protocol versions that carry them.
#[derive(Debug, Default, Clone)]
pub struct FeatureVersionMap {
    features: HashMap<String, VersionRange>,
}

impl FeatureVersionMap {
    pub fn add_feature(&mut self, feature: impl Into<String>, range: VersionRange) {
        self.features.insert(feature.into(), range);
    }

    pub fn is_feature_supported(&self, feature: &str, version: ProtocolVersion) -> bool {
        self.features
            .get(feature)
            .map(|range| range.contains(version))
            .unwrap_or(false)
    }

    pub fn supported_features(&self, version: ProtocolVersion) -> Vec<&str> {
        let mut features: Vec<&str> = self
            .features
            .iter()
            .filter(|(_, range)| range.contains(version))
            .map(|(name, _)| name.as_str())
            .collect();
        features.sort_unstable();
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_common_version() {
        let negotiator = VersionNegotiator::default();
        let negotiated = negotiator
            .negotiate_set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_1])
            .unwrap();
        assert_eq!(negotiated, ProtocolVersion::V1_1);
    }

    #[test]
    fn no_overlap_yields_none() {
        let negotiator = VersionNegotiator::new(vec![ProtocolVersion::V2_0]);
        assert!(negotiator
            .negotiate_set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_1])
            .is_none());
    }

    #[test]
    fn range_negotiation_respects_bounds() {
        let negotiator = VersionNegotiator::default();
        let range = VersionRange {
            min: ProtocolVersion::V1_0,
            max: Some(ProtocolVersion::V1_1),
        };
        assert_eq!(
            negotiator.negotiate_range(&range),
            Some(ProtocolVersion::V1_1)
        );

        let open = VersionRange {
            min: ProtocolVersion::V1_1,
            max: None,
        };
        assert_eq!(negotiator.negotiate_range(&open), Some(ProtocolVersion::V2_0));
    }

    #[test]
    fn feature_map_gates_by_version() {
        let mut features = FeatureVersionMap::default();
        features.add_feature(
            "textDocument",
            VersionRange {
                min: ProtocolVersion::V1_1,
                max: None,
            },
        );

        assert!(!features.is_feature_supported("textDocument", ProtocolVersion::V1_0));
        assert!(features.is_feature_supported("textDocument", ProtocolVersion::V2_0));
        assert!(features.supported_features(ProtocolVersion::V1_0).is_empty());
    }
}
