use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{PolicyUuid, RequestTypeId, Session, Timestamp};

use crate::pattern::PatternMatcher;

// ---------------------------------------------------------------------------
// Policy and Statement
// ---------------------------------------------------------------------------

/// Effect of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => write!(f, "Allow"),
            Effect::Deny => write!(f, "Deny"),
        }
    }
}

/// A single rule inside a policy.
///
/// Action strings are `<apiTypePattern>` or, on deny statements,
/// `<apiTypePattern>:<field1>,<field2>,...`. Principal strings are
/// `<type>:<uuidPattern>` with type `account` or `user`; an empty list
/// applies the statement to every principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub effect: Effect,
    pub actions: Vec<String>,
    #[serde(default)]
    pub principals: Vec<String>,
}

impl Statement {
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            principals: Vec::new(),
        }
    }

    pub fn deny<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Deny,
            actions: actions.into_iter().map(Into::into).collect(),
            principals: Vec::new(),
        }
    }

    /// Restrict the statement to the given principals.
    pub fn with_principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principals = principals.into_iter().map(Into::into).collect();
        self
    }
}

/// Named, identified collection of statements. Read-only during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub uuid: PolicyUuid,
    pub name: String,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl Policy {
    pub fn new(uuid: impl Into<PolicyUuid>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            statements: Vec::new(),
        }
    }

    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }
}

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// No statement produced an explicit outcome.
    DefaultDeny,
    /// A deny statement without a field list matched the request type.
    ExplicitDeny { policy_uuid: PolicyUuid },
    /// A deny statement named a field the request sets.
    FieldDeny {
        policy_uuid: PolicyUuid,
        field_name: String,
    },
}

impl DenyReason {
    pub fn policy_uuid(&self) -> Option<&PolicyUuid> {
        match self {
            DenyReason::DefaultDeny => None,
            DenyReason::ExplicitDeny { policy_uuid } => Some(policy_uuid),
            DenyReason::FieldDeny { policy_uuid, .. } => Some(policy_uuid),
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::DefaultDeny => write!(f, "operation denied by default"),
            DenyReason::ExplicitDeny { policy_uuid } => {
                write!(f, "operation denied by policy[{}]", policy_uuid)
            }
            DenyReason::FieldDeny {
                policy_uuid,
                field_name,
            } => write!(
                f,
                "operation denied by policy[{}], field[{}] not permitted",
                policy_uuid, field_name
            ),
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "ALLOW"),
            Decision::Deny(reason) => write!(f, "DENY: {}", reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Default upper bound on pattern length.
pub const DEFAULT_MAX_PATTERN_LENGTH: usize = 512;

/// Toggles for the engine's side channels and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Emit a `trace!` event naming the statement that decided a request.
    #[serde(default)]
    pub trace_matches: bool,

    /// Emit audit events to the configured sink.
    #[serde(default = "default_true")]
    pub audit: bool,

    /// Patterns longer than this are rejected when policies are compiled.
    #[serde(default = "default_max_pattern_length")]
    pub max_pattern_length: usize,
}

impl EngineConfig {
    /// The matcher policies loaded under this configuration compile with.
    pub fn pattern_matcher(&self) -> PatternMatcher {
        PatternMatcher::new(self.max_pattern_length)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_pattern_length() -> usize {
    DEFAULT_MAX_PATTERN_LENGTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_matches: false,
            audit: default_true(),
            max_pattern_length: default_max_pattern_length(),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit types
// ---------------------------------------------------------------------------

/// Types of auditable events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyAuditEventKind {
    /// A deny or allow statement decided the request.
    StatementMatched,
    /// An evaluation produced a decision.
    EvaluationCompleted,
    /// The request type is exempt and no policy was consulted.
    ExemptionApplied,
}

/// A structured audit event. Informational only: it never feeds back into
/// the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAuditEvent {
    pub event_kind: PolicyAuditEventKind,
    pub timestamp: Timestamp,
    pub request_type: RequestTypeId,
    pub session: Session,
    pub policy_uuid: Option<PolicyUuid>,
    pub policy_name: Option<String>,
    pub statement_action: Option<String>,
    pub decision_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_reason_messages() {
        assert_eq!(
            DenyReason::DefaultDeny.to_string(),
            "operation denied by default"
        );
        assert_eq!(
            DenyReason::ExplicitDeny {
                policy_uuid: PolicyUuid::new("p1")
            }
            .to_string(),
            "operation denied by policy[p1]"
        );
        assert_eq!(
            DenyReason::FieldDeny {
                policy_uuid: PolicyUuid::new("p1"),
                field_name: "name".into()
            }
            .to_string(),
            "operation denied by policy[p1], field[name] not permitted"
        );
    }

    #[test]
    fn test_deny_reason_policy_uuid() {
        assert!(DenyReason::DefaultDeny.policy_uuid().is_none());
        let reason = DenyReason::FieldDeny {
            policy_uuid: PolicyUuid::new("p2"),
            field_name: "cpu".into(),
        };
        assert_eq!(reason.policy_uuid().map(PolicyUuid::as_str), Some("p2"));
    }

    #[test]
    fn test_decision_helpers() {
        assert!(Decision::Allow.is_allow());
        assert!(Decision::Allow.deny_reason().is_none());
        let deny = Decision::Deny(DenyReason::DefaultDeny);
        assert!(!deny.is_allow());
        assert_eq!(deny.deny_reason(), Some(&DenyReason::DefaultDeny));
        assert_eq!(deny.to_string(), "DENY: operation denied by default");
    }

    #[test]
    fn test_decision_serde_shape() {
        let deny = Decision::Deny(DenyReason::ExplicitDeny {
            policy_uuid: PolicyUuid::new("p1"),
        });
        let json = serde_json::to_value(&deny).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["reason"]["kind"], "explicit_deny");
        assert_eq!(json["reason"]["policy_uuid"], "p1");

        let allow = serde_json::to_value(Decision::Allow).unwrap();
        assert_eq!(allow["decision"], "allow");
    }

    #[test]
    fn test_policy_builder() {
        let policy = Policy::new("p1", "vm-admins")
            .with_statement(Statement::deny(["DeleteVmMsg"]))
            .with_statement(Statement::allow(["*"]).with_principals(["user:u-.*"]));
        assert_eq!(policy.statements.len(), 2);
        assert_eq!(policy.statements[0].effect, Effect::Deny);
        assert!(policy.statements[0].principals.is_empty());
        assert_eq!(policy.statements[1].principals, vec!["user:u-.*"]);
    }

    #[test]
    fn test_policy_deserialize_defaults() {
        let json = r#"{
            "uuid": "p1",
            "name": "readers",
            "statements": [{"effect": "Allow", "actions": ["Query*"]}]
        }"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.uuid.as_str(), "p1");
        assert!(policy.statements[0].principals.is_empty());
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert!(!config.trace_matches);
        assert!(config.audit);
        assert_eq!(config.max_pattern_length, DEFAULT_MAX_PATTERN_LENGTH);
        assert_eq!(
            config.pattern_matcher().max_pattern_length(),
            DEFAULT_MAX_PATTERN_LENGTH
        );
    }
}
