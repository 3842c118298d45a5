/// Subscription plan tiers and the plan gate
///
/// Plans are an axis independent of [`super::roles::UserRole`]: an admin may
/// be on the free plan and a visitor may hold a paid subscription. Guards
/// evaluate both axes separately.
///
/// # Plan Ordering
///
/// ```text
/// free < crm_pro < crm_team
/// ```
///
/// Only a subscription whose status is `trialing` or `active` counts; any
/// other status falls back to `free`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billing plan tiers, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// No subscription
    Free,

    /// Individual CRM plan
    CrmPro,

    /// Team CRM plan
    CrmTeam,
}

impl PlanTier {
    /// Converts plan to its wire/database name
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::CrmPro => "crm_pro",
            PlanTier::CrmTeam => "crm_team",
        }
    }

    /// Position in the plan ordering
    pub fn index(&self) -> usize {
        match self {
            PlanTier::Free => 0,
            PlanTier::CrmPro => 1,
            PlanTier::CrmTeam => 2,
        }
    }

    /// Checks if this plan meets or exceeds `required`
    pub fn meets(&self, required: PlanTier) -> bool {
        self.index() >= required.index()
    }

    /// AI copilot tokens included per billing period
    pub fn token_quota(&self) -> i64 {
        match self {
            PlanTier::Free => 10_000,
            PlanTier::CrmPro => 500_000,
            PlanTier::CrmTeam => 2_000_000,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "crm_pro" => Ok(PlanTier::CrmPro),
            "crm_team" => Ok(PlanTier::CrmTeam),
            other => Err(format!("Unknown plan: {}", other)),
        }
    }
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Trial period running
    Trialing,

    /// Paid and current
    Active,

    /// Payment failed, grace period
    PastDue,

    /// Ended or replaced
    Canceled,

    /// Checkout started but never completed
    Incomplete,
}

impl SubscriptionState {
    /// Whether a subscription in this state grants its plan
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionState::Trialing | SubscriptionState::Active)
    }

    /// Converts status to its wire/database name
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Trialing => "trialing",
            SubscriptionState::Active => "active",
            SubscriptionState::PastDue => "past_due",
            SubscriptionState::Canceled => "canceled",
            SubscriptionState::Incomplete => "incomplete",
        }
    }
}

/// Billing period length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_period", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

/// Subscription status record fetched by the client (`GET /v1/subscription`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// Plan on the subscription record
    pub plan: PlanTier,

    /// Lifecycle status
    pub status: SubscriptionState,

    /// Billing period
    pub billing_period: BillingPeriod,

    /// End of the current billing period, if any
    pub current_period_end: Option<DateTime<Utc>>,

    /// Tokens included in the effective plan
    pub token_quota: i64,

    /// Tokens consumed in the current period
    pub tokens_used: i64,
}

impl SubscriptionStatus {
    /// Status of a user without any subscription row
    pub fn free(tokens_used: i64) -> Self {
        Self {
            plan: PlanTier::Free,
            status: SubscriptionState::Active,
            billing_period: BillingPeriod::Monthly,
            current_period_end: None,
            token_quota: PlanTier::Free.token_quota(),
            tokens_used,
        }
    }

    /// The plan actually granted by this record
    pub fn effective_tier(&self) -> PlanTier {
        if self.status.is_live() {
            self.plan
        } else {
            PlanTier::Free
        }
    }

    /// Tokens left in the current period
    pub fn tokens_remaining(&self) -> i64 {
        self.token_quota.saturating_sub(self.tokens_used).max(0)
    }
}

/// Outcome of a plan gate evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlanGate {
    /// Subscription status not fetched yet
    Loading,

    /// Effective tier meets the requirement
    Allowed,

    /// Effective tier is below the requirement
    Denied {
        current: PlanTier,
        required: PlanTier,
    },
}

impl PlanGate {
    /// Whether the gated affordance is enabled
    pub fn is_allowed(&self) -> bool {
        matches!(self, PlanGate::Allowed)
    }
}

/// Evaluates the plan gate for a (possibly still loading) subscription status
pub fn plan_gate(status: Option<&SubscriptionStatus>, required: PlanTier) -> PlanGate {
    let Some(status) = status else {
        return PlanGate::Loading;
    };

    let current = status.effective_tier();
    if current.meets(required) {
        PlanGate::Allowed
    } else {
        PlanGate::Denied { current, required }
    }
}
