//! Configuration for principal resolution.

/// Configuration for resolving an accessor's principals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum group nesting depth followed during resolution.
    pub max_depth: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_depth: 25 }
    }
}

impl ResolverConfig {
    /// Creates a new configuration with the specified max depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}
