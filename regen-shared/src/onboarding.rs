/// Onboarding flows and progress tracking
///
/// An onboarding flow is a named, fixed list of steps. Progress is a bag of
/// step → done flags plus a `completed` flag that flips once every step of
/// the flow is done.
///
/// Step completion is idempotent: completing a step that is already done
/// leaves the record untouched, including `updated_at`. Callers use the
/// returned flag to skip writes.
///
/// The same record lives in two places: the server (authoritative for
/// signed-in users) and the client's local store (visitors, offline). The two
/// copies are reconciled by last write wins on `updated_at`, see [`reconcile`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Error type for onboarding operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardingError {
    /// Flow name not recognized
    #[error("Unknown onboarding flow: {0}")]
    UnknownFlow(String),

    /// Step is not part of the flow
    #[error("Step '{step}' is not part of the {flow} flow")]
    UnknownStep { flow: OnboardingFlow, step: String },
}

/// Known onboarding flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingFlow {
    /// Public directory introduction (visitors)
    Directory,

    /// CRM workspace setup
    Crm,
}

impl OnboardingFlow {
    /// Flow name used in URLs, storage keys and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingFlow::Directory => "directory",
            OnboardingFlow::Crm => "crm",
        }
    }

    /// Steps of the flow, in presentation order
    pub fn steps(&self) -> &'static [&'static str] {
        match self {
            OnboardingFlow::Directory => &["browse_directory", "view_enterprise", "create_account"],
            OnboardingFlow::Crm => &[
                "claim_enterprise",
                "invite_team",
                "add_contact",
                "create_opportunity",
            ],
        }
    }

    /// Local store key for this flow's progress
    pub fn storage_key(&self) -> String {
        format!("regen.onboarding.{}", self.as_str())
    }
}

impl fmt::Display for OnboardingFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnboardingFlow {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(OnboardingFlow::Directory),
            "crm" => Ok(OnboardingFlow::Crm),
            other => Err(OnboardingError::UnknownFlow(other.to_string())),
        }
    }
}

/// Progress through one onboarding flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    /// Flow being tracked
    pub flow: OnboardingFlow,

    /// Step → done
    pub steps: BTreeMap<String, bool>,

    /// Every step of the flow is done
    pub completed: bool,

    /// Last change, used for last-write-wins reconciliation
    pub updated_at: DateTime<Utc>,
}

impl OnboardingProgress {
    /// Fresh progress with every step pending
    pub fn new(flow: OnboardingFlow, now: DateTime<Utc>) -> Self {
        Self {
            flow,
            steps: flow.steps().iter().map(|s| (s.to_string(), false)).collect(),
            completed: false,
            updated_at: now,
        }
    }

    /// Is `step` done?
    pub fn is_step_complete(&self, step: &str) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    /// Marks `step` done
    ///
    /// Returns `Ok(true)` when the record changed and `Ok(false)` when the
    /// step was already done (the record is left exactly as it was).
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::UnknownStep` if the step isn't in the flow
    pub fn complete_step(&mut self, step: &str, now: DateTime<Utc>) -> Result<bool, OnboardingError> {
        if !self.flow.steps().contains(&step) {
            return Err(OnboardingError::UnknownStep {
                flow: self.flow,
                step: step.to_string(),
            });
        }

        if self.is_step_complete(step) {
            return Ok(false);
        }

        self.steps.insert(step.to_string(), true);
        self.completed = self.flow.steps().iter().all(|s| self.is_step_complete(s));
        self.updated_at = now;
        Ok(true)
    }

    /// Drops steps foreign to the flow, adds missing ones as pending and
    /// recomputes `completed`
    ///
    /// Applied to copies pushed by clients before they are stored.
    pub fn normalized(mut self) -> Self {
        let steps = self.flow.steps();
        self.steps.retain(|name, _| steps.contains(&name.as_str()));
        for step in steps {
            self.steps.entry(step.to_string()).or_insert(false);
        }
        self.completed = steps.iter().all(|s| self.is_step_complete(s));
        self
    }

    /// Steps still pending, in flow order
    pub fn remaining_steps(&self) -> Vec<&'static str> {
        self.flow
            .steps()
            .iter()
            .copied()
            .filter(|s| !self.is_step_complete(s))
            .collect()
    }
}

/// Which copy won a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    Server,
    Local,
}

/// Picks the newer of the server and local copies
///
/// Ties go to the server.
pub fn reconcile(
    server: Option<OnboardingProgress>,
    local: Option<OnboardingProgress>,
) -> Option<(OnboardingProgress, ProgressSource)> {
    match (server, local) {
        (Some(server), Some(local)) => {
            if local.updated_at > server.updated_at {
                Some((local, ProgressSource::Local))
            } else {
                Some((server, ProgressSource::Server))
            }
        }
        (Some(server), None) => Some((server, ProgressSource::Server)),
        (None, Some(local)) => Some((local, ProgressSource::Local)),
        (None, None) => None,
    }
}
