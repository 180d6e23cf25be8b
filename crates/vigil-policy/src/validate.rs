use std::collections::HashSet;

use crate::error::{PolicyError, PolicyResult};
use crate::pattern::PatternMatcher;
use crate::principal::CompiledPrincipal;
use crate::statement::CompiledAction;
use crate::types::{Effect, Policy};

/// A non-fatal finding about policy data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyWarning {
    pub policy_uuid: String,
    pub message: String,
}

/// Check every principal and action of a policy list without evaluating it.
///
/// Compiling a [`crate::PolicySnapshot`] stops at the first defect; this
/// walks the whole list and reports every one.
///
/// Checks:
/// - policy uuids are non-empty and unique
/// - every principal parses and its uuid pattern compiles
/// - every action parses and its type pattern compiles
///
/// Warns about allow statements with a field list (the list is ignored) and
/// statements without actions (they never match).
pub fn validate_policies(
    policies: &[Policy],
    patterns: &PatternMatcher,
) -> PolicyResult<Vec<PolicyWarning>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for policy in policies {
        let uuid = policy.uuid.as_str();
        if uuid.is_empty() {
            errors.push(format!("policy '{}': uuid must not be empty", policy.name));
        } else if !seen.insert(uuid) {
            errors.push(format!("duplicate policy uuid: '{}'", uuid));
        }

        for (index, statement) in policy.statements.iter().enumerate() {
            if statement.actions.is_empty() {
                warnings.push(PolicyWarning {
                    policy_uuid: uuid.to_string(),
                    message: format!("statement {} has no actions and never matches", index),
                });
            }

            for entry in &statement.principals {
                if let Err(e) = CompiledPrincipal::compile(entry, patterns) {
                    errors.push(format!("policy '{}' statement {}: {}", uuid, index, e));
                }
            }

            for action in &statement.actions {
                let compiled = match CompiledAction::compile(action, patterns) {
                    Ok(compiled) => compiled,
                    Err(e) => {
                        errors.push(format!("policy '{}' statement {}: {}", uuid, index, e));
                        continue;
                    }
                };
                if statement.effect == Effect::Allow && compiled.fields.is_some() {
                    warnings.push(PolicyWarning {
                        policy_uuid: uuid.to_string(),
                        message: format!(
                            "statement {}: allow action '{}' carries a field list, which is ignored",
                            index, action
                        ),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(PolicyError::ValidationError(errors.join("; ")))
    }
}
