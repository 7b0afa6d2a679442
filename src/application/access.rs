use metrics::counter;
use tracing::debug;

use crate::application::error::AppError;
use crate::domain::entities::{Actor, ContentResource};
use crate::domain::policy::{Decision, PolicyAction, PolicyEvaluator};

/// Evaluates `action` and turns a denial into `AppError::Forbidden`,
/// recording it on the way out.
pub(crate) fn enforce(
    policy: &PolicyEvaluator,
    actor: Option<&Actor>,
    resource: &ContentResource,
    action: PolicyAction,
) -> Result<(), AppError> {
    match policy.authorize(actor, resource, action) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            counter!(
                "inkpost_policy_denied_total",
                "action" => action.as_str(),
                "reason" => reason.code()
            )
            .increment(1);
            debug!(
                actor_id = ?actor.map(|a| a.id),
                role = ?actor.map(|a| a.role),
                resource_id = %resource.id,
                action = action.as_str(),
                reason = reason.code(),
                "Policy denied request"
            );
            Err(AppError::Forbidden(reason))
        }
    }
}
