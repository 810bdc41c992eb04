//! Identifier types shared by the render and pipeline crates.

use std::fmt;

/// Prefix of the container element id derived from a stable id.
pub const CONTAINER_PREFIX: &str = "mermaid__";

/// Prefix of identifiers generated for source blocks that have none.
pub const GENERATED_ID_PREFIX: &str = "idname_";

// ---------------------------------------------------------------------------
// StableId
// ---------------------------------------------------------------------------

/// The `id` attribute of a diagram source block, either pre-existing or
/// generated and written back so it survives later passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StableId(String);

impl StableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Container element name for this source block.
    pub fn container(&self) -> ContainerName {
        ContainerName(format!("{CONTAINER_PREFIX}{}", self.0))
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ContainerName
// ---------------------------------------------------------------------------

/// The `id` of the element holding rendered output for one source block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name handed to the render engine for the element it creates.
    pub fn render_target(&self) -> String {
        format!("{}_svg", self.0)
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_and_target_names_derive_from_id() {
        let id = StableId::new("idname_abc123xyz");
        let container = id.container();
        assert_eq!(container.as_str(), "mermaid__idname_abc123xyz");
        assert_eq!(container.render_target(), "mermaid__idname_abc123xyz_svg");
    }
}
