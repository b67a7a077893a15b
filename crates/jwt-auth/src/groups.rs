//! Role-to-group expansion driven by configuration.

use std::collections::{BTreeSet, HashMap};

use crate::config::{parse_properties, ConfigSource};

/// Expands token roles into deployment-level groups.
///
/// The mapping comes from the `groups.mapping` properties text
/// (`role=group-a,group-b` per line). Unmapped roles map to
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct GroupMapper {
    mapping: HashMap<String, BTreeSet<String>>,
}

impl GroupMapper {
    /// Build from configuration.
    #[must_use]
    pub fn from_config<C: ConfigSource>(config: &C) -> Self {
        let mapping = config
            .read("groups.mapping")
            .map(|text| {
                parse_properties(&text)
                    .into_iter()
                    .map(|(role, groups)| {
                        let set: BTreeSet<String> = groups
                            .split(',')
                            .map(str::trim)
                            .filter(|g| !g.is_empty())
                            .map(str::to_string)
                            .collect();
                        (role, set)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { mapping }
    }

    /// The groups a single role expands to.
    #[must_use]
    pub fn map(&self, role: &str) -> BTreeSet<String> {
        self.mapping
            .get(role)
            .cloned()
            .unwrap_or_else(|| std::iter::once(role.to_string()).collect())
    }

    /// Expand a whole role set, unioning the per-role results.
    #[must_use]
    pub fn map_all<'a, I: IntoIterator<Item = &'a str>>(&self, roles: I) -> BTreeSet<String> {
        roles.into_iter().flat_map(|role| self.map(role)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::MapConfig;

    fn mapper(text: &str) -> GroupMapper {
        let mut config = MapConfig::default();
        config.set("groups.mapping", text);
        GroupMapper::from_config(&config)
    }

    #[test]
    fn mapped_role_expands_with_trimming() {
        let mapper = mapper("admin=ops, superuser\n");
        let groups = mapper.map("admin");
        assert_eq!(groups.len(), 2);
        assert!(groups.contains("ops"));
        assert!(groups.contains("superuser"));
    }

    #[test]
    fn unmapped_role_maps_to_itself() {
        let mapper = mapper("admin=ops");
        let groups = mapper.map("viewer");
        assert_eq!(groups.len(), 1);
        assert!(groups.contains("viewer"));
    }

    #[test]
    fn no_config_is_identity() {
        let mapper = GroupMapper::from_config(&MapConfig::default());
        assert!(mapper.map("anything").contains("anything"));
    }

    #[test]
    fn map_all_unions() {
        let mapper = mapper("admin=ops,superuser\nauditor=readonly");
        let groups = mapper.map_all(["admin", "auditor", "guest"]);
        assert_eq!(groups.len(), 4);
        assert!(groups.contains("ops"));
        assert!(groups.contains("readonly"));
        assert!(groups.contains("guest"));
    }
}
