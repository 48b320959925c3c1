//! Canonical Naming Patterns
//!
//! An ordered registry of (canonical name, patterns) pairs. Order is
//! load-bearing: narrower categories come before the broader ones that would
//! otherwise shadow them, and score ties go to the earlier group. Patterns are
//! matched at the start of Dto-stripped schema names.

use regex::Regex;
use std::sync::LazyLock;

use crate::analysis::strip_dto_suffix;
use crate::config::PatternGroupConfig;
use crate::error::{ConsolidateError, Result};

/// Built-in pattern groups, in priority order
const BUILTIN_PATTERNS: &[(&str, &[&str])] = &[
    // Event-style responses
    (
        "EventResponse",
        &[
            r"^BulkAll\w+Response",
            r"^(Add|Remove)UsersTo\w+Response",
            r"^(Add|Remove)UsersFrom\w+Response",
            r"^Restart(All)?Node\w*Response",
            r"^ResetNodeTrafficResponse",
        ],
    ),
    ("DeleteResponse", &[r"^Delete\w+Response"]),
    ("BulkActionResponse", &[r"^Bulk(Delete|Reset|Revoke|Update)Users\w*Response"]),
    ("BulkUuidsRequest", &[r"^Bulk(Delete|Disable|Enable|Reset|Revoke)\w+Request"]),
    ("ReorderRequest", &[r"^Reorder\w+Request"]),
    (
        "TokenResponse",
        &[r"^(Login|Register|OAuth2Callback|TelegramCallback|VerifyPasskeyAuthentication)Response"],
    ),
    (
        "PasskeyOptions",
        &[
            r"^(Get|Verify)Passkey(Authentication|Registration)(Options)?(Response)?$",
            r"^VerifyPasskey(Authentication|Registration)Request",
        ],
    ),
    ("TagsResponse", &[r"^GetAll\w*Tags\w*Response"]),
    ("InboundsResponse", &[r"^(GetAllInbounds|GetInboundsBy\w+)Response"]),
    ("SubscriptionResponse", &[r"^GetSubscription(By\w+|Info)\w*Response"]),
    ("SettingsResponse", &[r"^(Get|Update)RemnawaveSettings\w*Response"]),
    (
        "SubscriptionSettingsResponse",
        &[r"^(Get|Update)SubscriptionSettings\w*Response"],
    ),
    (
        "PasskeysResponse",
        &[r"^(GetAllPasskeys|DeletePasskey|UpdatePasskey)\w*Response"],
    ),
    ("SnippetRequest", &[r"^(Create|Update)Snippet\w*Request"]),
    ("SnippetsResponse", &[r"^(Create|Update|Delete|Get)Snippets?\w*Response"]),
    ("UsersResponse", &[r"^GetUserBy(Email|Tag|TelegramId)\w*Response"]),
    (
        "UserResponse",
        &[
            r"^(Create|Update|Disable|Enable)UserResponse",
            r"^GetUserBy(Uuid|Username|ShortUuid)\w*Response",
            r"^(Reset|Revoke)User\w+Response",
        ],
    ),
    (
        "HostListResponse",
        &[
            r"^GetAllHostsResponse",
            r"^Bulk(Delete|Disable|Enable)HostsResponse",
            r"^Set\w+ToManyHostsResponse",
        ],
    ),
    ("HostResponse", &[r"^(Create|Update|GetOne)HostResponse"]),
    ("NodeResponse", &[r"^(Create|Update|GetOne|Disable|Enable)NodeResponse"]),
    ("NodesResponse", &[r"^(GetAllNodes|ReorderNode)Response"]),
    ("TemplateResponse", &[r"^(Create|Update|Get)(?:Subscription)?TemplateResponse"]),
    ("TemplatesResponse", &[r"^(GetTemplates|Reorder\w+Templates)Response"]),
    (
        "ConfigProfileResponse",
        &[r"^(Create|Update|Get(Computed)?ConfigProfileBy\w+)Response"],
    ),
    (
        "ConfigProfilesResponse",
        &[r"^(GetConfigProfiles|ReorderConfigProfiles)Response"],
    ),
    (
        "InternalSquadResponse",
        &[r"^(Create|Update|GetInternalSquadBy\w+)Response"],
    ),
    (
        "InternalSquadsResponse",
        &[r"^(GetInternalSquads|ReorderInternalSquads)Response"],
    ),
    (
        "ExternalSquadResponse",
        &[r"^(Create|Update|GetExternalSquadBy\w+)Response"],
    ),
    (
        "ExternalSquadsResponse",
        &[r"^(GetExternalSquads|ReorderExternalSquads)Response"],
    ),
    (
        "InfraProviderResponse",
        &[r"^(Create|Update|GetInfraProviderBy\w+)Response"],
    ),
    (
        "BillingNodesResponse",
        &[r"^(Create|Update|Delete|Get)InfraBillingNode\w*Response"],
    ),
    (
        "BillingHistoryResponse",
        &[r"^(Create|Delete|Get)InfraBillingHistoryRecord\w*Response"],
    ),
    (
        "HwidDevicesResponse",
        &[r"^(Create|Delete(All)?|Get)UserHwidDevice\w*Response"],
    ),
];

static BUILTIN: LazyLock<Vec<PatternGroup>> = LazyLock::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .map(|(canonical, patterns)| {
            PatternGroup::new(canonical, patterns.iter().copied())
                .expect("built-in naming patterns are valid")
        })
        .collect()
});

/// A canonical name and the patterns that vote for it
#[derive(Debug, Clone)]
pub struct PatternGroup {
    canonical: String,
    patterns: Vec<Regex>,
}

impl PatternGroup {
    pub fn new<'a>(canonical: &str, patterns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConsolidateError::InvalidPattern {
                    canonical: canonical.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            canonical: canonical.to_string(),
            patterns,
        })
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Number of (pattern, name) pairs that match
    pub fn match_count<S: AsRef<str>>(&self, clean_names: &[S]) -> usize {
        self.patterns
            .iter()
            .map(|pattern| {
                clean_names
                    .iter()
                    .filter(|name| matches_at_start(pattern, name.as_ref()))
                    .count()
            })
            .sum()
    }
}

fn matches_at_start(pattern: &Regex, name: &str) -> bool {
    pattern.find(name).is_some_and(|m| m.start() == 0)
}

/// A pattern group's score against a set of names
#[derive(Debug, Clone, PartialEq)]
pub struct PatternScore<'a> {
    pub canonical: &'a str,
    pub matches: usize,
    pub score: f64,
}

/// Ordered registry of naming pattern groups
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    groups: Vec<PatternGroup>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternRegistry {
    /// The built-in registry
    pub fn builtin() -> Self {
        Self {
            groups: BUILTIN.clone(),
        }
    }

    /// A registry of configured groups only
    pub fn from_config(configs: &[PatternGroupConfig]) -> Result<Self> {
        let groups = configs
            .iter()
            .map(|group| PatternGroup::new(&group.canonical, group.patterns.iter().map(String::as_str)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups })
    }

    /// Put configured groups ahead of the current ones
    pub fn with_extra(self, extra: &[PatternGroupConfig]) -> Result<Self> {
        let mut groups = Self::from_config(extra)?.groups;
        groups.extend(self.groups);
        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[PatternGroup] {
        &self.groups
    }

    /// Scores of every group with at least one match, in registry order.
    ///
    /// Score is matches divided by group size; a name matching several
    /// patterns of one group counts once per pattern.
    pub fn scores<S: AsRef<str>>(&self, names: &[S]) -> Vec<PatternScore<'_>> {
        if names.is_empty() {
            return Vec::new();
        }
        let clean: Vec<&str> = names.iter().map(|n| strip_dto_suffix(n.as_ref())).collect();
        self.groups
            .iter()
            .filter_map(|group| {
                let matches = group.match_count(&clean);
                (matches > 0).then(|| PatternScore {
                    canonical: group.canonical(),
                    matches,
                    score: matches as f64 / names.len() as f64,
                })
            })
            .collect()
    }

    /// Highest-scoring group; ties go to the earlier group
    pub fn best_match<S: AsRef<str>>(&self, names: &[S]) -> Option<PatternScore<'_>> {
        let mut best: Option<PatternScore<'_>> = None;
        for score in self.scores(names) {
            if best.as_ref().map_or(true, |b| score.score > b.score) {
                best = Some(score);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_order() {
        let registry = PatternRegistry::builtin();
        assert_eq!(registry.len(), BUILTIN_PATTERNS.len());
        assert_eq!(registry.groups()[0].canonical(), "EventResponse");
        assert_eq!(registry.groups()[1].canonical(), "DeleteResponse");
        assert_eq!(
            registry.groups().last().map(|g| g.canonical()),
            Some("HwidDevicesResponse")
        );
    }

    #[test]
    fn test_best_match_full_coverage() {
        let registry = PatternRegistry::builtin();
        let best = registry
            .best_match(&["CreateUserResponseDto", "UpdateUserResponseDto"])
            .unwrap();
        assert_eq!(best.canonical, "UserResponse");
        assert_eq!(best.score, 1.0);
    }

    #[test]
    fn test_earlier_group_wins_ties() {
        // DeleteResponse and SnippetsResponse both match once
        let registry = PatternRegistry::builtin();
        let best = registry.best_match(&["DeleteSnippetResponseDto"]).unwrap();
        assert_eq!(best.canonical, "DeleteResponse");
    }

    #[test]
    fn test_match_anchored_at_start() {
        let registry = PatternRegistry::builtin();
        assert!(registry.best_match(&["XDeleteUserResponse"]).is_none());
    }

    #[test]
    fn test_partial_coverage_score() {
        let registry = PatternRegistry::builtin();
        let best = registry
            .best_match(&["GetOneHostResponseDto", "SomethingElse", "Another"])
            .unwrap();
        assert_eq!(best.canonical, "HostResponse");
        assert!((best.score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_patterns_in_group_each_count() {
        let group = PatternGroup::new("Both", [r"^Get", r"^GetUser"]).unwrap();
        assert_eq!(group.match_count(&["GetUser", "GetHost"]), 3);
    }

    #[test]
    fn test_extra_groups_take_priority() {
        let extra = vec![PatternGroupConfig {
            canonical: "UserEnvelope".to_string(),
            patterns: vec![r"^CreateUserResponse".to_string()],
        }];
        let registry = PatternRegistry::builtin().with_extra(&extra).unwrap();
        assert_eq!(registry.len(), BUILTIN_PATTERNS.len() + 1);
        let best = registry.best_match(&["CreateUserResponseDto"]).unwrap();
        assert_eq!(best.canonical, "UserEnvelope");
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let groups = vec![PatternGroupConfig {
            canonical: "Broken".to_string(),
            patterns: vec!["(unclosed".to_string()],
        }];
        match PatternRegistry::from_config(&groups) {
            Err(ConsolidateError::InvalidPattern { canonical, .. }) => assert_eq!(canonical, "Broken"),
            other => panic!("Expected InvalidPattern, got {:?}", other.map(|r| r.len())),
        }
    }
}
