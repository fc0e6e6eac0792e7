//! Kind Registry - Load kind aliases and health tables from JSON
//!
//! The set of kinds is fixed by [`Kind`]. Which provider strings map to a
//! kind, and how each kind's states map to [`Health`], is data loaded from
//! an embedded JSON file so tables can grow without touching match arms.
//!
//! Two filter-only refinements live in the same file: group terms such as
//! `iam` select several kinds at once, and subtype aliases such as
//! `rds_cluster` select one kind narrowed by its `resource_subtype`.

use super::model::Health;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Embedded kind table (compiled into the binary)
const KIND_FILE: &str = include_str!("../resources/kinds.json");

/// Normalized resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    VirtualMachine,
    Container,
    Function,
    Cluster,
    ObjectStorage,
    BlockStorage,
    FileStorage,
    Database,
    Vpc,
    Subnet,
    LoadBalancer,
    SecurityGroup,
    Gateway,
    IamUser,
    IamRole,
    IamPolicy,
    Secret,
    Unknown,
}

impl Kind {
    pub const ALL: [Kind; 18] = [
        Kind::VirtualMachine,
        Kind::Container,
        Kind::Function,
        Kind::Cluster,
        Kind::ObjectStorage,
        Kind::BlockStorage,
        Kind::FileStorage,
        Kind::Database,
        Kind::Vpc,
        Kind::Subnet,
        Kind::LoadBalancer,
        Kind::SecurityGroup,
        Kind::Gateway,
        Kind::IamUser,
        Kind::IamRole,
        Kind::IamPolicy,
        Kind::Secret,
        Kind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::VirtualMachine => "virtual_machine",
            Kind::Container => "container",
            Kind::Function => "function",
            Kind::Cluster => "cluster",
            Kind::ObjectStorage => "object_storage",
            Kind::BlockStorage => "block_storage",
            Kind::FileStorage => "file_storage",
            Kind::Database => "database",
            Kind::Vpc => "vpc",
            Kind::Subnet => "subnet",
            Kind::LoadBalancer => "load_balancer",
            Kind::SecurityGroup => "security_group",
            Kind::Gateway => "gateway",
            Kind::IamUser => "iam_user",
            Kind::IamRole => "iam_role",
            Kind::IamPolicy => "iam_policy",
            Kind::Secret => "secret",
            Kind::Unknown => "unknown",
        }
    }

    /// Human label from the kind table
    pub fn display_name(self) -> &'static str {
        get_kind_def(self)
            .map(|def| def.display_name.as_str())
            .unwrap_or_else(|| self.as_str())
    }

    /// Recognized aliases (canonical name excluded)
    pub fn aliases(self) -> &'static [String] {
        get_kind_def(self)
            .map(|def| def.aliases.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = std::convert::Infallible;

    /// Never fails: unrecognized strings become [`Kind::Unknown`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize_kind(s))
    }
}

/// Kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct KindDef {
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Lowercase provider state -> health
    #[serde(default)]
    pub health: HashMap<String, Health>,
    /// Alias -> `resource_subtype` metadata value it narrows to
    #[serde(default)]
    pub subtypes: HashMap<String, String>,
}

/// Root structure of resources/kinds.json
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    /// Filter term -> every kind it selects
    #[serde(default)]
    pub groups: HashMap<String, Vec<Kind>>,
    pub kinds: HashMap<Kind, KindDef>,
}

struct KindRegistry {
    config: KindConfig,
    /// Lowercase alias or canonical name -> kind
    lookup: HashMap<String, Kind>,
    /// Lowercase subtype alias -> subtype
    subtypes: HashMap<String, String>,
}

static REGISTRY: OnceLock<KindRegistry> = OnceLock::new();

fn get_registry() -> &'static KindRegistry {
    REGISTRY.get_or_init(|| {
        let config: KindConfig = serde_json::from_str(KIND_FILE)
            .unwrap_or_else(|e| panic!("Failed to parse embedded kind JSON: {}", e));

        let mut lookup = HashMap::new();
        let mut subtypes = HashMap::new();
        for (kind, def) in &config.kinds {
            lookup.insert(kind.as_str().to_string(), *kind);
            for alias in &def.aliases {
                lookup.insert(alias.to_lowercase(), *kind);
            }
            for (alias, subtype) in &def.subtypes {
                subtypes.insert(alias.to_lowercase(), subtype.clone());
            }
        }

        KindRegistry {
            config,
            lookup,
            subtypes,
        }
    })
}

/// Get a kind definition
pub fn get_kind_def(kind: Kind) -> Option<&'static KindDef> {
    get_registry().config.kinds.get(&kind)
}

/// Normalize a provider or user supplied type string to a [`Kind`].
///
/// Matching is case-insensitive and ignores surrounding whitespace; `-` is
/// treated as `_` so "virtual-machine" and "virtual_machine" agree.
pub fn normalize_kind(raw: &str) -> Kind {
    get_registry()
        .lookup
        .get(&term_key(raw))
        .copied()
        .unwrap_or(Kind::Unknown)
}

fn term_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace('-', "_")
}

/// Whether filter term `raw` selects resources of `kind`.
///
/// Group terms cover each kind they list. Any other term selects the kind
/// it normalizes to; unrecognized terms select nothing.
pub fn term_selects(raw: &str, kind: Kind) -> bool {
    let registry = get_registry();
    if let Some(group) = registry.config.groups.get(&term_key(raw)) {
        return group.contains(&kind);
    }
    is_known_kind(raw) && normalize_kind(raw) == kind
}

/// The `resource_subtype` a filter term narrows to, if any
pub fn term_subtype(raw: &str) -> Option<&'static str> {
    get_registry()
        .subtypes
        .get(&term_key(raw))
        .map(String::as_str)
}

/// Whether `raw` names a kind (canonical or alias) rather than falling to unknown
pub fn is_known_kind(raw: &str) -> bool {
    normalize_kind(raw) != Kind::Unknown || raw.trim().eq_ignore_ascii_case("unknown")
}

/// Derive health for `state` using the kind's table. Unlisted states are unknown.
pub fn health_for(kind: Kind, state: &str) -> Health {
    get_kind_def(kind)
        .and_then(|def| def.health.get(&state.to_lowercase()))
        .copied()
        .unwrap_or(Health::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_every_kind() {
        for kind in Kind::ALL {
            assert!(
                get_kind_def(kind).is_some(),
                "Kind {} should be defined in kinds.json",
                kind
            );
        }
    }

    #[test]
    fn test_aliases_are_unique_across_kinds() {
        let mut seen: HashMap<String, Kind> = HashMap::new();
        for kind in Kind::ALL {
            for alias in kind.aliases() {
                let key = alias.to_lowercase();
                if let Some(other) = seen.insert(key.clone(), kind) {
                    panic!("Alias {:?} claimed by both {} and {}", key, other, kind);
                }
                assert!(
                    Kind::ALL.iter().all(|k| k.as_str() != key),
                    "Alias {:?} shadows a canonical kind name",
                    key
                );
            }
        }
    }

    #[test]
    fn test_virtual_machine_aliases_normalize_together() {
        for alias in ["ec2", "vm", "virtual_machines", "compute_engine", "EC2", " Vm "] {
            assert_eq!(normalize_kind(alias), Kind::VirtualMachine, "alias {alias}");
        }
    }

    #[test]
    fn test_normalize_is_idempotent_on_canonical_names() {
        for kind in Kind::ALL {
            assert_eq!(normalize_kind(kind.as_str()), kind);
            assert_eq!(normalize_kind(normalize_kind(kind.as_str()).as_str()), kind);
        }
    }

    #[test]
    fn test_unrecognized_kind_falls_back_to_unknown() {
        assert_eq!(normalize_kind("quantum_computer"), Kind::Unknown);
        assert_eq!(normalize_kind(""), Kind::Unknown);
        assert!(!is_known_kind("quantum_computer"));
        assert!(is_known_kind("unknown"));
        assert!(is_known_kind("s3"));
    }

    #[test]
    fn test_hyphenated_kind_names() {
        assert_eq!(normalize_kind("virtual-machine"), Kind::VirtualMachine);
        assert_eq!(normalize_kind("security-group"), Kind::SecurityGroup);
    }

    #[test]
    fn test_compute_health_table() {
        let kind = Kind::VirtualMachine;
        assert_eq!(health_for(kind, "running"), Health::Healthy);
        assert_eq!(health_for(kind, "stopped"), Health::Unhealthy);
        assert_eq!(health_for(kind, "terminated"), Health::Unhealthy);
        assert_eq!(health_for(kind, "pending"), Health::Warning);
        assert_eq!(health_for(kind, "shutting-down"), Health::Warning);
        assert_eq!(health_for(kind, "hibernating"), Health::Unknown);
    }

    #[test]
    fn test_database_health_table() {
        let kind = Kind::Database;
        assert_eq!(health_for(kind, "available"), Health::Healthy);
        assert_eq!(health_for(kind, "Available"), Health::Healthy);
        assert_eq!(health_for(kind, "backing-up"), Health::Warning);
        assert_eq!(health_for(kind, "storage-full"), Health::Unhealthy);
        assert_eq!(health_for(kind, "mystery"), Health::Unknown);
    }

    #[test]
    fn test_kinds_without_table_are_unknown() {
        assert_eq!(health_for(Kind::Function, "running"), Health::Unknown);
        assert_eq!(health_for(Kind::Unknown, "available"), Health::Unknown);
    }

    #[test]
    fn test_iam_group_selects_every_iam_kind() {
        for kind in [Kind::IamUser, Kind::IamRole, Kind::IamPolicy] {
            assert!(term_selects("iam", kind), "iam should select {kind}");
            assert!(term_selects(" IAM ", kind));
        }
        assert!(!term_selects("iam", Kind::Vpc));
        // Dispatch by type still resolves the group term to users
        assert_eq!(normalize_kind("iam"), Kind::IamUser);
    }

    #[test]
    fn test_plain_terms_select_their_kind_only() {
        assert!(term_selects("role", Kind::IamRole));
        assert!(!term_selects("role", Kind::IamUser));
        assert!(term_selects("ec2", Kind::VirtualMachine));
        assert!(!term_selects("quantum", Kind::Unknown));
        assert!(term_selects("unknown", Kind::Unknown));
    }

    #[test]
    fn test_subtype_aliases() {
        assert_eq!(term_subtype("rds_cluster"), Some("cluster"));
        assert_eq!(term_subtype("Aurora"), Some("cluster"));
        assert_eq!(term_subtype("rds-instance"), Some("instance"));
        assert_eq!(term_subtype("rds"), None);
        assert_eq!(term_subtype("database"), None);
        assert_eq!(normalize_kind("aurora"), Kind::Database);
    }

    #[test]
    fn test_kind_from_str_never_fails() {
        let kind: Kind = "rds".parse().unwrap();
        assert_eq!(kind, Kind::Database);
        let kind: Kind = "nonsense".parse().unwrap();
        assert_eq!(kind, Kind::Unknown);
    }
}
