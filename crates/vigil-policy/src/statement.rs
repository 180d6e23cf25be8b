use vigil_core::{FieldResolver, PermissionHook, RequestTypeId, Session};

use crate::error::{PolicyError, PolicyResult};
use crate::field::is_set;
use crate::pattern::{Pattern, PatternMatcher};
use crate::principal::principals_match;
use crate::snapshot::{CompiledPolicy, CompiledStatement};
use crate::types::{DenyReason, Effect, Policy};

// ---------------------------------------------------------------------------
// Action parsing
// ---------------------------------------------------------------------------

/// An action string split into its type pattern and optional field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction<'a> {
    pub type_pattern: &'a str,
    pub fields: Option<Vec<&'a str>>,
}

/// Parse `<apiTypePattern>[:<field1>,<field2>,...]`.
pub fn parse_action(action: &str) -> PolicyResult<ParsedAction<'_>> {
    let (type_pattern, field_list) = match action.split_once(':') {
        Some((pattern, fields)) => (pattern, Some(fields)),
        None => (action, None),
    };

    if type_pattern.is_empty() {
        return Err(PolicyError::MalformedAction {
            action: action.to_string(),
            reason: "empty type pattern".to_string(),
        });
    }

    let fields = match field_list {
        None => None,
        Some(list) => {
            let names: Vec<&str> = list.split(',').map(str::trim).collect();
            if names.iter().any(|n| n.is_empty()) {
                return Err(PolicyError::MalformedAction {
                    action: action.to_string(),
                    reason: "empty field name".to_string(),
                });
            }
            Some(names)
        }
    };

    Ok(ParsedAction {
        type_pattern,
        fields,
    })
}

/// An action with its type pattern compiled. `source` is the action string
/// as written, reported when the action decides a request.
#[derive(Debug, Clone)]
pub struct CompiledAction {
    pub source: String,
    pub type_pattern: Pattern,
    pub fields: Option<Vec<String>>,
}

impl CompiledAction {
    pub fn compile(action: &str, patterns: &PatternMatcher) -> PolicyResult<Self> {
        let parsed = parse_action(action)?;
        Ok(Self {
            source: action.to_string(),
            type_pattern: patterns.compile(parsed.type_pattern)?,
            fields: parsed
                .fields
                .map(|names| names.into_iter().map(String::from).collect()),
        })
    }
}

// ---------------------------------------------------------------------------
// StatementClassifier
// ---------------------------------------------------------------------------

/// A statement together with the policy that owns it.
#[derive(Debug, Clone, Copy)]
pub struct ScopedStatement<'p> {
    pub policy: &'p Policy,
    pub statement: &'p CompiledStatement,
}

/// Statements split by effect. Each bucket keeps provider order: policies
/// in the order returned, statements in declaration order.
#[derive(Debug, Default)]
pub struct ClassifiedStatements<'p> {
    pub deny: Vec<ScopedStatement<'p>>,
    pub allow: Vec<ScopedStatement<'p>>,
}

impl<'p> ClassifiedStatements<'p> {
    pub fn is_empty(&self) -> bool {
        self.deny.is_empty() && self.allow.is_empty()
    }
}

pub fn classify_statements(policies: &[CompiledPolicy]) -> ClassifiedStatements<'_> {
    let mut classified = ClassifiedStatements::default();
    for compiled in policies {
        let policy = compiled.policy();
        for statement in compiled.statements() {
            let scoped = ScopedStatement { policy, statement };
            match statement.effect {
                Effect::Deny => classified.deny.push(scoped),
                Effect::Allow => classified.allow.push(scoped),
            }
        }
    }
    classified
}

// ---------------------------------------------------------------------------
// Statement evaluation
// ---------------------------------------------------------------------------

/// Everything a statement needs to judge one request.
pub struct EvaluationContext<'a, R: ?Sized> {
    pub request: &'a R,
    pub request_type: &'a RequestTypeId,
    pub session: &'a Session,
    pub fields: &'a dyn FieldResolver<R>,
    pub hook: &'a dyn PermissionHook<R>,
}

/// The statement action that decided a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementMatch<'p> {
    pub policy: &'p Policy,
    pub action: &'p str,
}

/// Walk the deny bucket. The first matching entry ends the walk.
///
/// An entry without a field list denies the whole request. An entry with a
/// field list denies only if one of the named fields is set; otherwise the
/// walk continues with the next entry.
pub fn evaluate_deny<'p, R: ?Sized>(
    statements: &[ScopedStatement<'p>],
    ctx: &EvaluationContext<'_, R>,
) -> PolicyResult<Option<(StatementMatch<'p>, DenyReason)>> {
    for scoped in statements {
        let statement: &'p CompiledStatement = scoped.statement;
        if !principals_match(&statement.principals, ctx.session)? {
            continue;
        }

        for action in &statement.actions {
            if !action.type_pattern.matches(ctx.request_type.as_str()) {
                continue;
            }

            let matched = StatementMatch {
                policy: scoped.policy,
                action: action.source.as_str(),
            };

            let Some(fields) = &action.fields else {
                return Ok(Some((
                    matched,
                    DenyReason::ExplicitDeny {
                        policy_uuid: scoped.policy.uuid.clone(),
                    },
                )));
            };

            for field in fields {
                let value = ctx.fields.value_of(ctx.request_type, field, ctx.request)?;
                if is_set(&value) {
                    return Ok(Some((
                        matched,
                        DenyReason::FieldDeny {
                            policy_uuid: scoped.policy.uuid.clone(),
                            field_name: field.clone(),
                        },
                    )));
                }
            }
        }
    }

    Ok(None)
}

/// Walk the allow bucket. The first entry whose type pattern matches and
/// whose permission hook passes ends the walk. A pattern match vetoed by
/// the hook does not stop the search.
///
/// Allow actions are bare type patterns. A field suffix is stripped and
/// reported as a warning.
pub fn evaluate_allow<'p, R: ?Sized>(
    statements: &[ScopedStatement<'p>],
    ctx: &EvaluationContext<'_, R>,
) -> PolicyResult<Option<StatementMatch<'p>>> {
    for scoped in statements {
        let statement: &'p CompiledStatement = scoped.statement;
        if !principals_match(&statement.principals, ctx.session)? {
            continue;
        }

        for action in &statement.actions {
            if action.fields.is_some() {
                tracing::warn!(
                    policy_uuid = scoped.policy.uuid.as_str(),
                    action = action.source.as_str(),
                    "field list on allow statement is not supported; matching type pattern only"
                );
            }

            if action.type_pattern.matches(ctx.request_type.as_str())
                && ctx.hook.check_permission(ctx.request, ctx.session)
            {
                return Ok(Some(StatementMatch {
                    policy: scoped.policy,
                    action: action.source.as_str(),
                }));
            }
        }
    }

    Ok(None)
}
