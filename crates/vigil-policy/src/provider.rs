use std::collections::HashMap;
use vigil_core::{AccountUuid, RequestTypeId, Session};

use crate::error::PolicyResult;
use crate::pattern::PatternMatcher;
use crate::snapshot::{CompiledPolicy, PolicySnapshot};
use crate::types::Policy;

/// Supplies the candidate policies for one request.
///
/// The returned order is the evaluation order; the engine never reorders.
/// Providers hand out compiled snapshots: patterns are compiled when the
/// provider loads its policies, and concurrent evaluations only read them.
pub trait PolicyProvider: Send + Sync {
    fn policies_for(
        &self,
        request_type: &RequestTypeId,
        session: &Session,
    ) -> PolicyResult<PolicySnapshot>;
}

impl<F> PolicyProvider for F
where
    F: Fn(&RequestTypeId, &Session) -> PolicyResult<PolicySnapshot> + Send + Sync,
{
    fn policies_for(
        &self,
        request_type: &RequestTypeId,
        session: &Session,
    ) -> PolicyResult<PolicySnapshot> {
        self(request_type, session)
    }
}

/// Returns the same policy list for every request.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyProvider {
    snapshot: PolicySnapshot,
}

impl StaticPolicyProvider {
    /// Compile `policies` with the default pattern limits.
    pub fn new(policies: Vec<Policy>) -> PolicyResult<Self> {
        Self::with_patterns(policies, &PatternMatcher::default())
    }

    pub fn with_patterns(policies: Vec<Policy>, patterns: &PatternMatcher) -> PolicyResult<Self> {
        Ok(Self {
            snapshot: PolicySnapshot::compile(policies, patterns)?,
        })
    }

    pub fn snapshot(&self) -> &PolicySnapshot {
        &self.snapshot
    }
}

impl PolicyProvider for StaticPolicyProvider {
    fn policies_for(
        &self,
        _request_type: &RequestTypeId,
        _session: &Session,
    ) -> PolicyResult<PolicySnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Policies attached to accounts. User sessions resolve to the policies of
/// the account that owns the user.
///
/// Every policy is compiled as it is attached, so a corrupt policy is
/// rejected at load time.
#[derive(Debug, Clone, Default)]
pub struct AccountPolicyStore {
    patterns: PatternMatcher,
    by_account: HashMap<AccountUuid, PolicySnapshot>,
}

impl AccountPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: PatternMatcher) -> Self {
        Self {
            patterns,
            by_account: HashMap::new(),
        }
    }

    pub fn from_map(
        by_account: HashMap<AccountUuid, Vec<Policy>>,
        patterns: PatternMatcher,
    ) -> PolicyResult<Self> {
        let by_account = by_account
            .into_iter()
            .map(|(account, policies)| {
                PolicySnapshot::compile(policies, &patterns).map(|snapshot| (account, snapshot))
            })
            .collect::<PolicyResult<HashMap<_, _>>>()?;
        Ok(Self {
            patterns,
            by_account,
        })
    }

    /// Compile a policy and attach it to an account, after any already
    /// attached.
    pub fn attach(&mut self, account: impl Into<AccountUuid>, policy: Policy) -> PolicyResult<()> {
        let compiled = CompiledPolicy::compile(policy, &self.patterns)?;
        self.by_account
            .entry(account.into())
            .or_default()
            .push(compiled);
        Ok(())
    }

    pub fn attached(&self, account: &AccountUuid) -> &[CompiledPolicy] {
        self.by_account
            .get(account)
            .map(PolicySnapshot::policies)
            .unwrap_or_default()
    }

    pub fn account_count(&self) -> usize {
        self.by_account.len()
    }

    pub fn patterns(&self) -> &PatternMatcher {
        &self.patterns
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountUuid, &PolicySnapshot)> {
        self.by_account.iter()
    }
}

impl PolicyProvider for AccountPolicyStore {
    fn policies_for(
        &self,
        _request_type: &RequestTypeId,
        session: &Session,
    ) -> PolicyResult<PolicySnapshot> {
        Ok(self
            .by_account
            .get(&session.account_uuid)
            .cloned()
            .unwrap_or_default())
    }
}
