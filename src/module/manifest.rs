//! Component manifests and capabilities.

use std::collections::HashSet;

/// Semantic version of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemVer {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What a component contributes to admission control.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Token-bucket throughput limits.
    RateLimiting,

    /// Session token verification.
    Authentication,

    /// Route permission checks.
    Authorization,

    /// Deny-list of caller addresses.
    IpFiltering,

    /// Promotion of repeat offenders into the deny-list.
    AbuseEscalation,

    /// Exposes metrics.
    Metrics,

    /// Accepts configuration changes without a restart.
    HotReload,

    /// Anything else.
    Custom(String),
}

/// Identity and capabilities of a component.
#[derive(Debug, Clone)]
pub struct ModuleManifest {
    /// Unique component name.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Component version.
    pub version: SemVer,

    /// Capabilities provided.
    pub capabilities: HashSet<Capability>,
}

impl ModuleManifest {
    /// Starts building a manifest.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModuleManifestBuilder {
        ModuleManifestBuilder {
            name: name.into(),
            description: String::new(),
            version: SemVer {
                major: 0,
                minor: 1,
                patch: 0,
            },
            capabilities: HashSet::new(),
        }
    }

    /// Checks for a capability.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Builder for [`ModuleManifest`].
#[derive(Debug)]
pub struct ModuleManifestBuilder {
    name: String,
    description: String,
    version: SemVer,
    capabilities: HashSet<Capability>,
}

impl ModuleManifestBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.version = SemVer {
            major,
            minor,
            patch,
        };
        self
    }

    /// Adds a capability.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Builds the manifest.
    #[must_use]
    pub fn build(self) -> ModuleManifest {
        ModuleManifest {
            name: self.name,
            description: self.description,
            version: self.version,
            capabilities: self.capabilities,
        }
    }
}
