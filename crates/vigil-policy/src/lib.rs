//! Vigil Policy Engine
//!
//! Statement-based authorization for API requests. Every request is judged
//! against the policies a provider returns for its session, producing a
//! two-way decision: ALLOW or DENY with a reason.
//!
//! Key features:
//! - Deny-overrides combining: every deny statement is evaluated before any allow
//! - Default deny when no statement matches
//! - Field-scoped deny (`UpdateVmMsg:name,cpu`) that triggers only on set fields
//! - Principal restriction by session kind and uuid pattern
//! - Patterns compiled once, when policies are loaded
//! - Per-operation permission hook consulted on the allow path
//! - Configuration defects surface as errors, never as a deny

pub mod engine;
pub mod error;
pub mod field;
pub mod pattern;
pub mod principal;
pub mod provider;
pub mod snapshot;
pub mod statement;
pub mod types;
pub mod validate;

// Re-export primary types for convenience
pub use engine::{AuditSink, AuthorizationEngine, InMemoryAuditSink};
pub use error::{CheckError, PolicyError, PolicyErrorKind, PolicyResult};
pub use field::{is_set, FieldAccessor, FieldRegistry, FieldTable};
pub use pattern::{Pattern, PatternMatcher};
pub use principal::{parse_principal, principals_match, CompiledPrincipal, PrincipalEntry};
pub use provider::{AccountPolicyStore, PolicyProvider, StaticPolicyProvider};
pub use snapshot::{CompiledPolicy, CompiledStatement, PolicySnapshot};
pub use statement::{
    classify_statements, evaluate_allow, evaluate_deny, parse_action, ClassifiedStatements,
    CompiledAction, EvaluationContext, ParsedAction, ScopedStatement, StatementMatch,
};
pub use types::{
    Decision, DenyReason, EngineConfig, Effect, Policy, PolicyAuditEvent, PolicyAuditEventKind,
    Statement, DEFAULT_MAX_PATTERN_LENGTH,
};
pub use validate::{validate_policies, PolicyWarning};
