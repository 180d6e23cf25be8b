//! Vigil Root Library
//!
//! Configuration, request catalog and policy loading for the vigil binary.
//! The root is a thin orchestrator: it reads the TOML config, loads and
//! compiles the per-account policy file, builds the request catalog and
//! hands each request to the decision engine in `vigil-policy`.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{DynamicRequest, RequestCatalog, RequestFixture, RequestTypeConfig};
pub use config::RootConfig;
pub use error::{RootError, RootResult};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};
use vigil_core::{AccountUuid, AllowAllHook, Session};
use vigil_policy::{
    validate_policies, AccountPolicyStore, AuditSink, AuthorizationEngine, Decision,
    PatternMatcher, Policy, PolicyWarning,
};

// ---------------------------------------------------------------------------
// Policy file
// ---------------------------------------------------------------------------

/// Read a policy file: a JSON object from account uuid to the ordered list
/// of policies attached to that account.
///
/// Every account's list is validated first, so one error names every defect
/// in the file. The lists are then compiled into the returned store along
/// with the non-fatal warnings. A missing file yields an empty store, so
/// every request falls through to the default deny.
pub fn load_policies(
    path: &Path,
    patterns: PatternMatcher,
) -> RootResult<(AccountPolicyStore, Vec<PolicyWarning>)> {
    if !path.exists() {
        warn!(path = %path.display(), "policy file not found; every request will be denied");
        return Ok((AccountPolicyStore::with_patterns(patterns), Vec::new()));
    }
    let contents = std::fs::read_to_string(path)?;
    let by_account: BTreeMap<AccountUuid, Vec<Policy>> = serde_json::from_str(&contents)?;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for (account, policies) in &by_account {
        match validate_policies(policies, &patterns) {
            Ok(found) => warnings.extend(found),
            Err(e) => errors.push(format!("policies of account '{}': {}", account, e)),
        }
    }
    if !errors.is_empty() {
        return Err(RootError::Config(errors.join("; ")));
    }

    let by_account: HashMap<AccountUuid, Vec<Policy>> = by_account.into_iter().collect();
    let store = AccountPolicyStore::from_map(by_account, patterns)?;
    Ok((store, warnings))
}

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

/// Everything a decision needs, loaded once at startup.
pub struct RootState {
    pub config: RootConfig,
    pub catalog: RequestCatalog,
    pub policies: AccountPolicyStore,
    /// Non-fatal findings from loading the policy file.
    pub warnings: Vec<PolicyWarning>,
}

/// Load the catalog and policy file named by `config`. Policy patterns are
/// compiled here, under the configured pattern limit.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    config.validate()?;
    let catalog = RequestCatalog::from_config(&config.request_types)?;
    let (policies, warnings) =
        load_policies(&config.policies_path, config.engine.pattern_matcher())?;
    info!(
        request_types = catalog.len(),
        accounts = policies.account_count(),
        warnings = warnings.len(),
        "vigil initialized"
    );
    Ok(RootState {
        config,
        catalog,
        policies,
        warnings,
    })
}

impl RootState {
    pub fn engine(&self) -> AuthorizationEngine<'_, DynamicRequest> {
        AuthorizationEngine::new(&self.policies, &self.catalog, &AllowAllHook)
            .with_config(self.config.engine.clone())
    }

    /// Decide one request. Configuration defects come back as errors.
    pub fn evaluate(&self, request: &DynamicRequest, session: &Session) -> RootResult<Decision> {
        Ok(self.engine().evaluate(request, session)?)
    }

    /// Decide one request, recording audit events to `sink`.
    pub fn evaluate_audited(
        &self,
        request: &DynamicRequest,
        session: &Session,
        sink: &dyn AuditSink,
    ) -> RootResult<Decision> {
        Ok(self
            .engine()
            .with_audit_sink(sink)
            .evaluate(request, session)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vigil_policy::{DenyReason, InMemoryAuditSink, Statement};

    fn state(policies: AccountPolicyStore) -> RootState {
        let config = RootConfig {
            request_types: vec![
                RequestTypeConfig::new("UpdateVmMsg").with_fields(["name"]),
                RequestTypeConfig::new("QueryZoneMsg").exempt(),
            ],
            ..RootConfig::default()
        };
        RootState {
            catalog: RequestCatalog::from_config(&config.request_types).unwrap(),
            config,
            policies,
            warnings: Vec::new(),
        }
    }

    fn write_policies(dir_name: &str, json: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(dir_name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("policies.json");
        std::fs::write(&path, json).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_policies_missing_file() {
        let (store, warnings) = load_policies(
            Path::new("/nonexistent/policies.json"),
            PatternMatcher::new(64),
        )
        .unwrap();
        assert_eq!(store.account_count(), 0);
        assert_eq!(store.patterns().max_pattern_length(), 64);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_policies_from_json() {
        let (dir, path) = write_policies(
            "vigil-test-load-policies",
            r#"{
                "acc-1": [
                    {"uuid": "p1", "name": "no-rename", "statements": [
                        {"effect": "Deny", "actions": ["UpdateVmMsg:name"]},
                        {"effect": "Allow", "actions": ["UpdateVmMsg:cpu"]}
                    ]}
                ]
            }"#,
        );

        let (store, warnings) = load_policies(&path, PatternMatcher::default()).unwrap();
        let attached = store.attached(&AccountUuid::new("acc-1"));
        assert_eq!(attached.len(), 1);
        let statement = &attached[0].statements()[0];
        assert_eq!(statement.actions[0].source, "UpdateVmMsg:name");
        assert_eq!(statement.actions[0].fields, Some(vec!["name".to_string()]));
        assert!(statement.principals.is_empty());
        assert_eq!(warnings.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_policies_bad_json() {
        let (dir, path) = write_policies("vigil-test-bad-policies", "[not an object]");

        assert!(matches!(
            load_policies(&path, PatternMatcher::default()),
            Err(RootError::Serialization(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_policies_reports_every_defective_account() {
        let (dir, path) = write_policies(
            "vigil-test-defective-policies",
            r#"{
                "acc-1": [{"uuid": "p1", "name": "a", "statements": [
                    {"effect": "Allow", "actions": ["*"], "principals": ["tenant:x"]}
                ]}],
                "acc-2": [{"uuid": "p2", "name": "b", "statements": [
                    {"effect": "Deny", "actions": ["Create(Vm"]}
                ]}]
            }"#,
        );

        let err = load_policies(&path, PatternMatcher::default()).unwrap_err();
        assert!(matches!(err, RootError::Config(_)));
        let msg = err.to_string();
        assert!(msg.contains("acc-1"));
        assert!(msg.contains("acc-2"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_policies_honors_pattern_limit() {
        let (dir, path) = write_policies(
            "vigil-test-long-pattern",
            r#"{"acc-1": [{"uuid": "p1", "name": "a", "statements": [
                {"effect": "Allow", "actions": ["VeryLongPattern*"]}
            ]}]}"#,
        );

        let err = load_policies(&path, PatternMatcher::new(4)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum 4"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_initialize_rejects_duplicate_request_types() {
        let config = RootConfig {
            policies_path: PathBuf::from("/nonexistent/policies.json"),
            request_types: vec![
                RequestTypeConfig::new("CreateVmMsg"),
                RequestTypeConfig::new("CreateVmMsg"),
            ],
            ..RootConfig::default()
        };
        assert!(initialize_root(config).is_err());
    }

    #[test]
    fn test_evaluate_field_deny() {
        let mut store = AccountPolicyStore::new();
        store
            .attach(
                "acc-1",
                Policy::new("p1", "no-rename")
                    .with_statement(Statement::deny(["UpdateVmMsg:name"]))
                    .with_statement(Statement::allow(["UpdateVmMsg"])),
            )
            .unwrap();
        let state = state(store);
        let session = Session::account("acc-1");

        let unset = state
            .catalog
            .request_from_json(r#"{"type": "UpdateVmMsg"}"#)
            .unwrap();
        assert_eq!(state.evaluate(&unset, &session).unwrap(), Decision::Allow);

        let set = state
            .catalog
            .request_from_json(r#"{"type": "UpdateVmMsg", "fields": {"name": "x"}}"#)
            .unwrap();
        let decision = state.evaluate(&set, &session).unwrap();
        assert!(matches!(
            decision,
            Decision::Deny(DenyReason::FieldDeny { .. })
        ));
    }

    #[test]
    fn test_evaluate_exempt_without_policies() {
        let state = state(AccountPolicyStore::new());
        let request = state
            .catalog
            .request_from_json(r#"{"type": "QueryZoneMsg"}"#)
            .unwrap();
        let sink = InMemoryAuditSink::new();
        let decision = state
            .evaluate_audited(&request, &Session::account("acc-1"), &sink)
            .unwrap();
        assert_eq!(decision, Decision::Allow);
        assert!(!sink.events().is_empty());
    }
}
