use std::sync::Arc;

use crate::error::PolicyResult;
use crate::pattern::PatternMatcher;
use crate::principal::CompiledPrincipal;
use crate::statement::CompiledAction;
use crate::types::{Effect, Policy, Statement};

// ---------------------------------------------------------------------------
// Compiled policy forms
// ---------------------------------------------------------------------------

/// A statement with every principal and action compiled.
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    pub effect: Effect,
    pub principals: Vec<CompiledPrincipal>,
    pub actions: Vec<CompiledAction>,
}

impl CompiledStatement {
    /// Compile principals and actions in declaration order. The first
    /// defect aborts compilation.
    pub fn compile(statement: &Statement, patterns: &PatternMatcher) -> PolicyResult<Self> {
        let principals = statement
            .principals
            .iter()
            .map(|entry| CompiledPrincipal::compile(entry, patterns))
            .collect::<PolicyResult<Vec<_>>>()?;
        let actions = statement
            .actions
            .iter()
            .map(|action| CompiledAction::compile(action, patterns))
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self {
            effect: statement.effect,
            principals,
            actions,
        })
    }
}

/// A policy ready for evaluation, alongside the source it was compiled from.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    policy: Policy,
    statements: Vec<CompiledStatement>,
}

impl CompiledPolicy {
    pub fn compile(policy: Policy, patterns: &PatternMatcher) -> PolicyResult<Self> {
        let statements = policy
            .statements
            .iter()
            .map(|statement| CompiledStatement::compile(statement, patterns))
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self { policy, statements })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn statements(&self) -> &[CompiledStatement] {
        &self.statements
    }
}

// ---------------------------------------------------------------------------
// PolicySnapshot
// ---------------------------------------------------------------------------

/// An ordered list of compiled policies.
///
/// Patterns are compiled once, when the snapshot is built; every evaluation
/// that reads it only runs them. Clones share the same list. Appending to a
/// snapshot that has live clones copies the list first, so a clone never
/// sees a policy added after it was taken.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    policies: Arc<Vec<CompiledPolicy>>,
}

impl PolicySnapshot {
    pub fn compile<I>(policies: I, patterns: &PatternMatcher) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = Policy>,
    {
        let compiled = policies
            .into_iter()
            .map(|policy| CompiledPolicy::compile(policy, patterns))
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self {
            policies: Arc::new(compiled),
        })
    }

    pub fn push(&mut self, policy: CompiledPolicy) {
        Arc::make_mut(&mut self.policies).push(policy);
    }

    pub fn policies(&self) -> &[CompiledPolicy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
