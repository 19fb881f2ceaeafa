//! Source-version stamp for cached documents
//!
//! Every persisted cache document embeds `source_version =
//! "<name>-<major>.<minor>.<patch>"`. Readers compare major.minor only, so
//! a patch release never invalidates the cache while a minor bump rebuilds
//! everything on next access.

use crate::{Error, Result};
use semver::Version;

/// Parsed `"<name>-<major>.<minor>.<patch>"` stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersion {
    pub name: String,
    pub version: Version,
}

impl SourceVersion {
    /// Stamp for the running build.
    pub fn running(name: &str, version: &str) -> Result<Self> {
        let version = Version::parse(version)
            .map_err(|e| Error::Config(format!("bad build version '{}': {}", version, e)))?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Parse a stored stamp. The name itself may contain `-`, so the split
    /// point is the last `-` before the numeric version.
    pub fn parse(stamp: &str) -> Result<Self> {
        let (name, version) = stamp
            .rsplit_once('-')
            .ok_or_else(|| Error::Config(format!("malformed source_version '{}'", stamp)))?;
        let version = Version::parse(version)
            .map_err(|e| Error::Config(format!("malformed source_version '{}': {}", stamp, e)))?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Accept a stored document iff name and major.minor match; patch drift
    /// is tolerated.
    pub fn accepts(&self, stored: &SourceVersion) -> bool {
        self.name == stored.name
            && self.version.major == stored.version.major
            && self.version.minor == stored.version.minor
    }

    pub fn stamp(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl std::fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_drift_tolerated() {
        let running = SourceVersion::running("strata-builder", "1.2.3").unwrap();
        let stored = SourceVersion::parse("strata-builder-1.2.9").unwrap();
        assert!(running.accepts(&stored));
    }

    #[test]
    fn test_minor_bump_rejected() {
        let running = SourceVersion::running("strata-builder", "1.3.0").unwrap();
        let stored = SourceVersion::parse("strata-builder-1.2.3").unwrap();
        assert!(!running.accepts(&stored));
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let running = SourceVersion::running("strata-builder", "1.2.0").unwrap();
        let stored = SourceVersion::parse("other-service-1.2.0").unwrap();
        assert!(!running.accepts(&stored));
    }

    #[test]
    fn test_roundtrip_stamp() {
        let v = SourceVersion::parse("strata-builder-0.1.0").unwrap();
        assert_eq!(v.stamp(), "strata-builder-0.1.0");
        assert_eq!(v.name, "strata-builder");
    }

    #[test]
    fn test_malformed_stamp() {
        assert!(SourceVersion::parse("nodashversion").is_err());
        assert!(SourceVersion::parse("name-not.a.version").is_err());
    }
}
