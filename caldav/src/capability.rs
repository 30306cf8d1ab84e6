// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Capability model: what this server can be trusted to do.
//!
//! Features are addressed by dotted paths (`search.text.substring`,
//! `sync.collection`). The model starts from a static registry of defaults,
//! optionally adjusted by a [`ServerFlavor`] preset, and records per-feature
//! overrides as the planner learns from failed REPORTs. Lookups never fail;
//! a path nobody registered resolves to [`Support::Unknown`].

use std::collections::BTreeMap;

use crate::config::ServerFlavor;

/// How well the server handles a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// Works as specified.
    Full,
    /// Works with caveats; usable but results may need re-checking.
    Partial,
    /// Does not work; the planner must route around it.
    Unsupported,
    /// Nominally works but known to misbehave; avoided when a safe
    /// alternative exists.
    Fragile,
    /// No information either way.
    Unknown,
}

impl Support {
    /// Whether the planner may rely on the feature without a fallback.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Full | Self::Partial)
    }
}

struct FeatureDef {
    path: &'static str,
    default: Support,
}

/// Registered features and their out-of-the-box defaults.
///
/// `search.recurrences.expanded` is hierarchical: per-class leaves
/// (`.event`, `.todo`, `.journal`) inherit from it unless overridden.
const FEATURES: &[FeatureDef] = &[
    FeatureDef {
        path: "search.text.substring",
        default: Support::Full,
    },
    FeatureDef {
        path: "search.text.category",
        default: Support::Full,
    },
    FeatureDef {
        path: "search.filters.combined",
        default: Support::Full,
    },
    FeatureDef {
        path: "search.filters.negated",
        default: Support::Fragile,
    },
    FeatureDef {
        path: "search.comp-type.optional",
        default: Support::Full,
    },
    FeatureDef {
        path: "search.comp-filter",
        default: Support::Full,
    },
    FeatureDef {
        path: "search.recurrences.expanded",
        default: Support::Full,
    },
    FeatureDef {
        path: "search.recurrences.includes-pending",
        default: Support::Unsupported,
    },
    FeatureDef {
        path: "sync.collection",
        default: Support::Full,
    },
    FeatureDef {
        path: "server.backward-compat",
        default: Support::Unsupported,
    },
];

/// Hierarchical families eligible for [`CapabilityModel::collapse`]: a parent
/// entry replaces the children only when every listed child is explicitly
/// recorded with the same value.
const FAMILIES: &[(&str, &[&str])] = &[(
    "search.recurrences.expanded",
    &[
        "search.recurrences.expanded.event",
        "search.recurrences.expanded.todo",
        "search.recurrences.expanded.journal",
    ],
)];

fn registry_default(path: &str) -> Option<Support> {
    FEATURES.iter().find(|f| f.path == path).map(|f| f.default)
}

fn is_family_parent(path: &str) -> bool {
    FAMILIES.iter().any(|(parent, _)| *parent == path)
}

/// Per-server capability table.
#[derive(Debug, Clone, Default)]
pub struct CapabilityModel {
    explicit: BTreeMap<String, Support>,
}

impl CapabilityModel {
    /// Creates an empty model backed only by registry defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model seeded from a server flavor preset.
    ///
    /// Presets record documented quirks; everything else stays at the
    /// registry default and is corrected at runtime if a REPORT fails.
    #[must_use]
    pub fn for_flavor(flavor: ServerFlavor) -> Self {
        let mut model = Self::new();
        match flavor {
            ServerFlavor::Generic | ServerFlavor::Radicale | ServerFlavor::Xandikos => {}
            ServerFlavor::Nextcloud | ServerFlavor::Baikal => {
                // sabre/dav mishandles time-range combined with prop filters
                // in some versions; combined queries get re-checked.
                model.set_feature("search.filters.combined", Support::Fragile);
            }
            ServerFlavor::GoogleCalendar => {
                model.set_feature("search.text.substring", Support::Unsupported);
                model.set_feature("search.filters.negated", Support::Unsupported);
                model.set_feature("sync.collection", Support::Fragile);
            }
            ServerFlavor::Zimbra => {
                model.set_feature("search.comp-type.optional", Support::Unsupported);
                model.set_feature("server.backward-compat", Support::Full);
            }
        }
        model
    }

    /// Resolves the support level for a feature path.
    ///
    /// Resolution order: explicit entry at the path, explicit entry at the
    /// nearest hierarchical-family ancestor, registry default at the path,
    /// registry default at the nearest ancestor, [`Support::Unknown`].
    /// Never fails.
    ///
    /// Explicit ancestor entries only apply along registered families; an
    /// override on an unrelated prefix does not shadow the registry default
    /// of an independently-defaulted leaf.
    #[must_use]
    pub fn support_for(&self, path: &str) -> Support {
        if let Some(s) = self.explicit.get(path) {
            return *s;
        }
        let mut p = path;
        while let Some(idx) = p.rfind('.') {
            p = &p[..idx];
            if is_family_parent(p) {
                if let Some(s) = self.explicit.get(p) {
                    return *s;
                }
            }
        }
        if let Some(s) = registry_default(path) {
            return s;
        }
        let mut p = path;
        while let Some(idx) = p.rfind('.') {
            p = &p[..idx];
            if let Some(s) = registry_default(p) {
                return s;
            }
        }
        Support::Unknown
    }

    /// Records what was learnt about one feature.
    ///
    /// Collapses sibling entries afterwards so the table stays small.
    pub fn set_feature(&mut self, path: &str, support: Support) {
        self.explicit.insert(path.to_string(), support);
        self.collapse();
    }

    /// Merges explicit sibling entries into their parent, deepest-first.
    ///
    /// Only complete families collapse: a parent entry is written (and the
    /// children removed) when every registered child carries the same
    /// explicit value. Idempotent.
    pub fn collapse(&mut self) {
        for (parent, children) in FAMILIES {
            let Some(first) = self.explicit.get(children[0]).copied() else {
                continue;
            };
            let all_equal = children
                .iter()
                .all(|c| self.explicit.get(*c) == Some(&first));
            if all_equal {
                for c in *children {
                    self.explicit.remove(*c);
                }
                self.explicit.insert((*parent).to_string(), first);
            }
        }
    }

    /// Number of explicit overrides currently recorded.
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.explicit.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_defaults_apply() {
        let model = CapabilityModel::new();
        assert_eq!(model.support_for("search.text.substring"), Support::Full);
        assert_eq!(model.support_for("search.filters.negated"), Support::Fragile);
        assert_eq!(
            model.support_for("search.recurrences.includes-pending"),
            Support::Unsupported
        );
    }

    #[test]
    fn unregistered_path_is_unknown() {
        let model = CapabilityModel::new();
        assert_eq!(model.support_for("carddav.addressbook"), Support::Unknown);
    }

    #[test]
    fn hierarchical_leaf_inherits_from_ancestor() {
        let model = CapabilityModel::new();
        // Not registered individually, inherits the family default.
        assert_eq!(
            model.support_for("search.recurrences.expanded.todo"),
            Support::Full
        );
    }

    #[test]
    fn explicit_override_beats_default() {
        let mut model = CapabilityModel::new();
        model.set_feature("search.text.substring", Support::Unsupported);
        assert_eq!(
            model.support_for("search.text.substring"),
            Support::Unsupported
        );
    }

    #[test]
    fn explicit_ancestor_beats_leaf_default() {
        let mut model = CapabilityModel::new();
        model.set_feature("search.recurrences.expanded", Support::Unsupported);
        assert_eq!(
            model.support_for("search.recurrences.expanded.event"),
            Support::Unsupported
        );
    }

    #[test]
    fn non_family_ancestor_override_does_not_leak() {
        let mut model = CapabilityModel::new();
        model.set_feature("search.text", Support::Unsupported);
        // Not a registered family, so the leaf keeps its own default.
        assert_eq!(model.support_for("search.text.substring"), Support::Full);
        assert_eq!(model.support_for("search.text"), Support::Unsupported);
    }

    #[test]
    fn collapse_merges_complete_families() {
        let mut model = CapabilityModel::new();
        model.set_feature("search.recurrences.expanded.event", Support::Unsupported);
        model.set_feature("search.recurrences.expanded.todo", Support::Unsupported);
        assert_eq!(model.override_count(), 2);

        model.set_feature("search.recurrences.expanded.journal", Support::Unsupported);
        // All three siblings agree, so one parent entry replaces them.
        assert_eq!(model.override_count(), 1);
        assert_eq!(
            model.support_for("search.recurrences.expanded.todo"),
            Support::Unsupported
        );
    }

    #[test]
    fn collapse_requires_all_children() {
        let mut model = CapabilityModel::new();
        model.set_feature("search.recurrences.expanded.event", Support::Fragile);
        model.set_feature("search.recurrences.expanded.todo", Support::Fragile);
        assert_eq!(model.override_count(), 2);
        // Journal untouched, keeps the family default.
        assert_eq!(
            model.support_for("search.recurrences.expanded.journal"),
            Support::Full
        );
    }

    #[test]
    fn flavor_presets_seed_quirks() {
        let google = CapabilityModel::for_flavor(ServerFlavor::GoogleCalendar);
        assert_eq!(
            google.support_for("search.text.substring"),
            Support::Unsupported
        );
        assert_eq!(google.support_for("sync.collection"), Support::Fragile);

        let zimbra = CapabilityModel::for_flavor(ServerFlavor::Zimbra);
        assert_eq!(
            zimbra.support_for("server.backward-compat"),
            Support::Full
        );

        let generic = CapabilityModel::for_flavor(ServerFlavor::Generic);
        assert_eq!(generic.override_count(), 0);
    }
}
