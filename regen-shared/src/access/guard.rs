/// Route guard table and evaluation
///
/// A guard decides, for a page path and the current session, whether the
/// protected content may be shown or where the caller should be sent instead.
///
/// # States
///
/// ```text
/// Loading ──session resolves──> Authorized
///                          └──> Unauthorized { redirect_to }
/// ```
///
/// `Unauthorized` never exposes the protected content: it only carries the
/// navigation target. A failed session fetch is evaluated exactly like an
/// unauthenticated visitor.
///
/// Role and plan are gated independently: [`evaluate_role`] and
/// [`evaluate_plan`] can be used on their own, and [`evaluate`] composes them
/// (role first) the way pages stack both guards.

use serde::{Deserialize, Serialize};

use super::plan::{plan_gate, PlanGate, PlanTier, SubscriptionStatus};
use super::roles::{effective_role, RoleRequirement, UserRole};
use super::SessionUser;

/// Landing path for unauthenticated callers and failed session fetches
pub const VISITOR_LANDING_PATH: &str = "/";

/// Where plan denials are sent
pub const PRICING_PATH: &str = "/pricing";

/// A row of the static permission table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRule {
    /// Path prefix, matched on segment boundaries
    pub prefix: &'static str,

    /// Role requirement for the prefix
    pub roles: RoleRequirement,

    /// Minimum plan tier, if the prefix is metered
    pub plan: Option<PlanTier>,
}

/// Static permission table. The longest matching prefix wins.
pub static ROUTE_TABLE: &[RouteRule] = &[
    RouteRule {
        prefix: "/admin",
        roles: RoleRequirement::OneOf(&[UserRole::Admin]),
        plan: None,
    },
    RouteRule {
        prefix: "/crm/copilot",
        roles: RoleRequirement::AtLeast(UserRole::Member),
        plan: Some(PlanTier::CrmPro),
    },
    RouteRule {
        prefix: "/crm",
        roles: RoleRequirement::AtLeast(UserRole::Member),
        plan: None,
    },
    RouteRule {
        prefix: "/account",
        roles: RoleRequirement::AtLeast(UserRole::Member),
        plan: None,
    },
    RouteRule {
        prefix: "/onboarding",
        roles: RoleRequirement::Any,
        plan: None,
    },
    RouteRule {
        prefix: "/directory",
        roles: RoleRequirement::Any,
        plan: None,
    },
    RouteRule {
        prefix: "/",
        roles: RoleRequirement::Any,
        plan: None,
    },
];

/// Result of the session fetch a guard waits on
#[derive(Debug, Clone, Copy)]
pub enum SessionFetch<'a> {
    /// Request still in flight
    Pending,

    /// Resolved; `None` means no one is signed in
    Resolved(Option<&'a SessionUser>),

    /// Request failed (treated as unauthenticated)
    Failed,
}

/// Guard decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    /// Waiting on the session or subscription fetch
    Loading,

    /// Render the protected content
    Authorized,

    /// Navigate away; do not render the protected content
    Unauthorized { redirect_to: String },
}

impl GuardState {
    fn redirect(path: &str) -> Self {
        GuardState::Unauthorized {
            redirect_to: path.to_string(),
        }
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

/// Finds the rule governing `path`
///
/// Paths without a leading slash are matched as if they had one.
pub fn rule_for(path: &str) -> &'static RouteRule {
    let normalized;
    let path = if path.starts_with('/') {
        path
    } else {
        normalized = format!("/{}", path);
        normalized.as_str()
    };

    let mut best: Option<&'static RouteRule> = None;
    for rule in ROUTE_TABLE {
        if prefix_matches(rule.prefix, path)
            && best.map_or(true, |b| rule.prefix.len() > b.prefix.len())
        {
            best = Some(rule);
        }
    }

    // "/" matches every normalized path, so the table always yields a rule
    best.unwrap_or(&ROUTE_TABLE[ROUTE_TABLE.len() - 1])
}

/// Evaluates the role guard for `path`
pub fn evaluate_role(session: SessionFetch<'_>, path: &str) -> GuardState {
    let user = match session {
        SessionFetch::Pending => return GuardState::Loading,
        SessionFetch::Resolved(user) => user,
        SessionFetch::Failed => None,
    };

    let rule = rule_for(path);
    if rule.roles.is_satisfied_by(user) {
        return GuardState::Authorized;
    }

    match user {
        Some(_) => GuardState::redirect(effective_role(user).home_path()),
        None => GuardState::redirect(VISITOR_LANDING_PATH),
    }
}

/// Evaluates the plan guard for `path`
///
/// Paths without a plan requirement are authorized even while the
/// subscription status is loading.
pub fn evaluate_plan(subscription: Option<&SubscriptionStatus>, path: &str) -> GuardState {
    let Some(required) = rule_for(path).plan else {
        return GuardState::Authorized;
    };

    match plan_gate(subscription, required) {
        PlanGate::Loading => GuardState::Loading,
        PlanGate::Allowed => GuardState::Authorized,
        PlanGate::Denied { .. } => GuardState::redirect(PRICING_PATH),
    }
}

/// Evaluates role then plan for `path`
pub fn evaluate(
    session: SessionFetch<'_>,
    subscription: Option<&SubscriptionStatus>,
    path: &str,
) -> GuardState {
    match evaluate_role(session, path) {
        GuardState::Authorized => evaluate_plan(subscription, path),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::plan::{BillingPeriod, SubscriptionState};
    use crate::access::roles::ROLE_HIERARCHY;
    use uuid::Uuid;

    fn user(role: UserRole) -> SessionUser {
        SessionUser::new(Uuid::new_v4(), "someone@example.org", role)
    }

    fn pro() -> SubscriptionStatus {
        SubscriptionStatus {
            plan: PlanTier::CrmPro,
            status: SubscriptionState::Active,
            billing_period: BillingPeriod::Monthly,
            current_period_end: None,
            token_quota: PlanTier::CrmPro.token_quota(),
            tokens_used: 0,
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(rule_for("/crm/copilot/chat").prefix, "/crm/copilot");
        assert_eq!(rule_for("/crm/123/dashboard").prefix, "/crm");
        assert_eq!(rule_for("/admin").prefix, "/admin");
        assert_eq!(rule_for("/pricing").prefix, "/");
    }

    #[test]
    fn test_prefix_matches_on_segment_boundary() {
        assert_eq!(rule_for("/crmish").prefix, "/");
        assert_eq!(rule_for("/administrator").prefix, "/");
        assert_eq!(rule_for("/admin?tab=users").prefix, "/admin");
        assert_eq!(rule_for("crm").prefix, "/crm");
    }

    #[test]
    fn test_pending_session_is_loading() {
        assert_eq!(evaluate_role(SessionFetch::Pending, "/crm"), GuardState::Loading);
    }

    #[test]
    fn test_failed_session_routes_to_visitor_landing() {
        assert_eq!(
            evaluate_role(SessionFetch::Failed, "/crm"),
            GuardState::Unauthorized {
                redirect_to: "/".to_string()
            }
        );
        assert_eq!(evaluate_role(SessionFetch::Failed, "/directory"), GuardState::Authorized);
    }

    #[test]
    fn test_denied_roles_go_home() {
        let member = user(UserRole::Member);
        assert_eq!(
            evaluate_role(SessionFetch::Resolved(Some(&member)), "/admin/users"),
            GuardState::Unauthorized {
                redirect_to: "/directory".to_string()
            }
        );

        let visitor = user(UserRole::Visitor);
        assert_eq!(
            evaluate_role(SessionFetch::Resolved(Some(&visitor)), "/crm"),
            GuardState::Unauthorized {
                redirect_to: "/".to_string()
            }
        );
    }

    #[test]
    fn test_home_paths_never_loop() {
        for role in ROLE_HIERARCHY {
            let u = user(role);
            assert_eq!(
                evaluate_role(SessionFetch::Resolved(Some(&u)), role.home_path()),
                GuardState::Authorized,
                "home path of {} must be reachable",
                role
            );
        }
    }

    #[test]
    fn test_plan_gate_is_independent_of_role() {
        let admin = user(UserRole::Admin);
        let session = SessionFetch::Resolved(Some(&admin));

        assert_eq!(evaluate(session, None, "/crm/copilot"), GuardState::Loading);
        assert_eq!(
            evaluate(session, Some(&SubscriptionStatus::free(0)), "/crm/copilot"),
            GuardState::Unauthorized {
                redirect_to: PRICING_PATH.to_string()
            }
        );
        assert_eq!(evaluate(session, Some(&pro()), "/crm/copilot"), GuardState::Authorized);

        // A paid visitor is still stopped by the role guard
        let visitor = user(UserRole::Visitor);
        assert_eq!(
            evaluate(SessionFetch::Resolved(Some(&visitor)), Some(&pro()), "/crm/copilot"),
            GuardState::Unauthorized {
                redirect_to: "/".to_string()
            }
        );
    }

    #[test]
    fn test_unmetered_path_ignores_loading_subscription() {
        assert_eq!(evaluate_plan(None, "/crm"), GuardState::Authorized);
    }

    #[test]
    fn test_guard_state_serialization() {
        let json = serde_json::to_value(GuardState::Unauthorized {
            redirect_to: "/".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "unauthorized");
        assert_eq!(json["redirect_to"], "/");
    }
}
