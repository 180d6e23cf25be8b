use vigil_core::{Session, SessionKind};

use crate::error::{PolicyError, PolicyResult};
use crate::pattern::{Pattern, PatternMatcher};

pub const PRINCIPAL_ACCOUNT: &str = "account";
pub const PRINCIPAL_USER: &str = "user";

/// A parsed `<type>:<uuidPattern>` principal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalEntry<'a> {
    pub kind: SessionKind,
    pub uuid_pattern: &'a str,
}

/// Split a principal entry at its first `:` and resolve the type.
pub fn parse_principal(entry: &str) -> PolicyResult<PrincipalEntry<'_>> {
    let (principal_type, uuid_pattern) = entry
        .split_once(':')
        .ok_or_else(|| PolicyError::MalformedPrincipal(entry.to_string()))?;

    let kind = match principal_type {
        PRINCIPAL_ACCOUNT => SessionKind::Account,
        PRINCIPAL_USER => SessionKind::User,
        other => {
            return Err(PolicyError::UnknownPrincipalType {
                principal_type: other.to_string(),
                entry: entry.to_string(),
            })
        }
    };

    Ok(PrincipalEntry { kind, uuid_pattern })
}

/// A principal entry with its uuid pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledPrincipal {
    pub kind: SessionKind,
    pub uuid_pattern: Pattern,
}

impl CompiledPrincipal {
    pub fn compile(entry: &str, patterns: &PatternMatcher) -> PolicyResult<Self> {
        let parsed = parse_principal(entry)?;
        Ok(Self {
            kind: parsed.kind,
            uuid_pattern: patterns.compile(parsed.uuid_pattern)?,
        })
    }
}

/// Decides whether a statement's principal constraints cover a session.
///
/// An empty list covers every session. Otherwise entries are checked in
/// order and the first one whose type equals the session kind and whose
/// uuid pattern matches wins.
///
/// A user session without a user uuid is an error once a `user:` entry has
/// to be checked; it never matches by accident.
pub fn principals_match(
    principals: &[CompiledPrincipal],
    session: &Session,
) -> PolicyResult<bool> {
    if principals.is_empty() {
        return Ok(true);
    }

    for principal in principals {
        if principal.kind != session.kind {
            continue;
        }
        if principal.uuid_pattern.matches(session.principal_uuid()?) {
            return Ok(true);
        }
    }

    Ok(false)
}
