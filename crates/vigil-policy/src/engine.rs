use std::sync::Mutex;

use vigil_core::{ApiRequest, FieldResolver, PermissionHook, Session, Timestamp};

use crate::error::{CheckError, PolicyResult};
use crate::provider::PolicyProvider;
use crate::statement::{
    classify_statements, evaluate_allow, evaluate_deny, EvaluationContext, StatementMatch,
};
use crate::types::{Decision, DenyReason, EngineConfig, PolicyAuditEvent, PolicyAuditEventKind};

// ---------------------------------------------------------------------------
// AuditSink trait: side channel for decision records
// ---------------------------------------------------------------------------

/// Receives audit events. A failing sink is logged and otherwise ignored;
/// it never changes the decision being recorded.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &PolicyAuditEvent) -> Result<(), String>;
}

/// In-memory audit sink for testing.
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<PolicyAuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<PolicyAuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: &PolicyAuditEvent) -> Result<(), String> {
        self.events
            .lock()
            .map_err(|_| "audit sink lock poisoned".to_string())?
            .push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AuthorizationEngine
// ---------------------------------------------------------------------------

/// Decides whether an API request may proceed for the session issuing it.
///
/// Order of evaluation:
/// 1. exempt request types are allowed without consulting any policy
/// 2. deny statements of every policy, in provider order; the first match denies
/// 3. allow statements of every policy, in provider order; the first match
///    whose permission hook passes allows
/// 4. otherwise the request is denied by default
///
/// Evaluation is synchronous and read-only. Policies arrive from the
/// provider already compiled, and the engine holds no mutable state, so one
/// instance can serve concurrent requests.
pub struct AuthorizationEngine<'a, R: ?Sized> {
    provider: &'a dyn PolicyProvider,
    fields: &'a dyn FieldResolver<R>,
    hook: &'a dyn PermissionHook<R>,
    audit_sink: Option<&'a dyn AuditSink>,
    config: EngineConfig,
}

impl<'a, R: ApiRequest + ?Sized> AuthorizationEngine<'a, R> {
    pub fn new(
        provider: &'a dyn PolicyProvider,
        fields: &'a dyn FieldResolver<R>,
        hook: &'a dyn PermissionHook<R>,
    ) -> Self {
        Self {
            provider,
            fields,
            hook,
            audit_sink: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_audit_sink(mut self, audit_sink: &'a dyn AuditSink) -> Self {
        self.audit_sink = Some(audit_sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate a request. `Ok` carries the business outcome; `Err` means
    /// the policy data or request metadata is defective.
    pub fn evaluate(&self, request: &R, session: &Session) -> PolicyResult<Decision> {
        let result = self.evaluate_inner(request, session);
        match &result {
            Ok(decision) => {
                tracing::debug!(
                    request_type = request.request_type().as_str(),
                    session = %session,
                    decision = %decision,
                    "authorization evaluated"
                );
                self.emit(PolicyAuditEvent {
                    event_kind: PolicyAuditEventKind::EvaluationCompleted,
                    timestamp: Timestamp::now(),
                    request_type: request.request_type().clone(),
                    session: session.clone(),
                    policy_uuid: decision.deny_reason().and_then(DenyReason::policy_uuid).cloned(),
                    policy_name: None,
                    statement_action: None,
                    decision_summary: Some(decision.to_string()),
                });
            }
            Err(e) => {
                tracing::error!(
                    request_type = request.request_type().as_str(),
                    session = %session,
                    error = %e,
                    kind = %e.kind(),
                    "authorization aborted by configuration error"
                );
            }
        }
        result
    }

    /// Evaluate a request and turn a deny into an authorization failure.
    pub fn check(&self, request: &R, session: &Session) -> Result<(), CheckError> {
        match self.evaluate(request, session)? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(CheckError::Denied(reason)),
        }
    }

    fn evaluate_inner(&self, request: &R, session: &Session) -> PolicyResult<Decision> {
        let request_type = request.request_type();

        if request.is_exempt() {
            self.emit(PolicyAuditEvent {
                event_kind: PolicyAuditEventKind::ExemptionApplied,
                timestamp: Timestamp::now(),
                request_type: request_type.clone(),
                session: session.clone(),
                policy_uuid: None,
                policy_name: None,
                statement_action: None,
                decision_summary: None,
            });
            return Ok(Decision::Allow);
        }

        let snapshot = self.provider.policies_for(request_type, session)?;
        let classified = classify_statements(snapshot.policies());

        let ctx = EvaluationContext {
            request,
            request_type,
            session,
            fields: self.fields,
            hook: self.hook,
        };

        if let Some((matched, reason)) = evaluate_deny(&classified.deny, &ctx)? {
            self.record_match(&matched, &ctx, "denies");
            return Ok(Decision::Deny(reason));
        }

        if let Some(matched) = evaluate_allow(&classified.allow, &ctx)? {
            self.record_match(&matched, &ctx, "allows");
            return Ok(Decision::Allow);
        }

        Ok(Decision::Deny(DenyReason::DefaultDeny))
    }

    fn record_match(&self, matched: &StatementMatch<'_>, ctx: &EvaluationContext<'_, R>, verb: &str) {
        if self.config.trace_matches {
            tracing::trace!(
                policy_name = matched.policy.name.as_str(),
                policy_uuid = matched.policy.uuid.as_str(),
                action = matched.action,
                request_type = ctx.request_type.as_str(),
                session = %ctx.session,
                "policy statement {} the request",
                verb
            );
        }
        self.emit(PolicyAuditEvent {
            event_kind: PolicyAuditEventKind::StatementMatched,
            timestamp: Timestamp::now(),
            request_type: ctx.request_type.clone(),
            session: ctx.session.clone(),
            policy_uuid: Some(matched.policy.uuid.clone()),
            policy_name: Some(matched.policy.name.clone()),
            statement_action: Some(matched.action.to_string()),
            decision_summary: Some(verb.to_string()),
        });
    }

    fn emit(&self, event: PolicyAuditEvent) {
        if !self.config.audit {
            return;
        }
        if let Some(sink) = self.audit_sink {
            if let Err(e) = sink.emit(&event) {
                tracing::warn!(error = %e, "failed to emit authorization audit event");
            }
        }
    }
}
