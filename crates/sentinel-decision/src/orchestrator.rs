//! The decision orchestrator: first match wins, default deny.
//!
//! Every outcome is a structured `Decision`; load failures, posture
//! failures, and missing approvals fold into denials rather than
//! propagating as errors. The only side effect is tracing.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use sentinel_core::posture::DevicePosture;
use sentinel_core::types::{Effect, Mode};
use sentinel_policy::{Policy, PolicyLoader, Rule};
use sentinel_posture::PostureResolver;
use sentinel_store::{ApprovalStore, BreakGlassStore};

use crate::decision::{Decision, DecisionRequest};
use crate::matching::rule_matches;

pub struct DecisionOrchestrator {
    loader: Arc<dyn PolicyLoader>,
    breakglass: Arc<dyn BreakGlassStore>,
    approvals: Arc<dyn ApprovalStore>,
    resolver: PostureResolver,
    /// Whether a session registry is wired in. `require_server_session`
    /// only degrades to `require_server` when it is.
    session_tracking: bool,
}

impl DecisionOrchestrator {
    pub fn new(
        loader: Arc<dyn PolicyLoader>,
        breakglass: Arc<dyn BreakGlassStore>,
        approvals: Arc<dyn ApprovalStore>,
        resolver: PostureResolver,
        session_tracking: bool,
    ) -> Self {
        Self {
            loader,
            breakglass,
            approvals,
            resolver,
            session_tracking,
        }
    }

    /// Evaluate one request. Never errors: every failure mode is a denial
    /// with a structured reason.
    pub async fn decide(&self, request: &DecisionRequest) -> Decision {
        let policy = match self.loader.load(&request.profile).await {
            Ok(policy) => policy,
            Err(e) => {
                warn!(profile = %request.profile, error = %e, "policy load failed; denying");
                let mut decision = Decision::denied("policy-load-failed");
                decision.reasons.push(e.to_string());
                return self.apply_break_glass(request, None, decision).await;
            }
        };

        let posture = match self.resolve_posture(request, &policy).await {
            Ok(posture) => posture,
            Err(decision) => return self.apply_break_glass(request, None, decision).await,
        };

        let matched = policy.rules.iter().find(|rule| {
            rule_matches(
                rule,
                &request.identity.username,
                &request.profile,
                request.mode,
                request.request_time,
                posture.as_ref(),
            )
        });

        let decision = match matched {
            Some(rule) => {
                debug!(rule = %rule.name, effect = %rule.effect, "rule matched");
                self.apply_effect(request, rule, posture.is_some()).await
            }
            None => Decision::denied("no rule matched"),
        };

        self.apply_break_glass(request, matched, decision).await
    }

    async fn resolve_posture(
        &self,
        request: &DecisionRequest,
        policy: &Policy,
    ) -> Result<Option<DevicePosture>, Decision> {
        if !policy.needs_posture() {
            return Ok(None);
        }
        let Some(device_id) = &request.device_id else {
            if policy.require_device_posture {
                return Err(Decision::denied("device-posture-unavailable"));
            }
            return Ok(None);
        };
        self.resolver
            .resolve(device_id, policy.require_device_posture)
            .await
            .map_err(|e| {
                let mut decision = Decision::denied("device-posture-unavailable");
                decision.reasons.push(e.to_string());
                decision
            })
    }

    async fn apply_effect(
        &self,
        request: &DecisionRequest,
        rule: &Rule,
        device_bound: bool,
    ) -> Decision {
        let base = Decision {
            allow: false,
            matched_rule: Some(rule.name.clone()),
            effect: Some(rule.effect),
            max_duration: Duration::ZERO,
            reasons: Vec::new(),
            break_glass: false,
            break_glass_remaining: None,
            device_bound,
        };

        match rule.effect {
            Effect::Allow => Decision {
                allow: true,
                max_duration: request.requested_duration.min(rule.max_duration),
                reasons: vec![format!("rule {} allows", rule.name)],
                ..base
            },
            Effect::Deny => Decision {
                reasons: vec![rule.name.clone()],
                ..base
            },
            Effect::RequireApproval => {
                let approval = self
                    .approvals
                    .find_approved(
                        &request.identity.username,
                        &request.profile,
                        request.request_time,
                    )
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "approval lookup failed; treating as unapproved");
                        None
                    });
                match approval {
                    Some(approval) => {
                        let remaining = approval
                            .remaining(request.request_time)
                            .unwrap_or(Duration::ZERO);
                        Decision {
                            allow: true,
                            max_duration: request
                                .requested_duration
                                .min(rule.max_duration)
                                .min(remaining),
                            reasons: vec![format!(
                                "approval {} granted by {}",
                                approval.id,
                                approval.approver.as_deref().unwrap_or("unknown")
                            )],
                            ..base
                        }
                    }
                    None => Decision {
                        reasons: vec!["approval-required".to_string()],
                        ..base
                    },
                }
            }
            Effect::RequireServer => self.apply_server_effect(request, rule, base),
            Effect::RequireServerSession => {
                if request.mode != Mode::Server && !self.session_tracking {
                    return Decision {
                        reasons: vec!["server-session-required".to_string()],
                        ..base
                    };
                }
                self.apply_server_effect(request, rule, base)
            }
        }
    }

    fn apply_server_effect(
        &self,
        request: &DecisionRequest,
        rule: &Rule,
        base: Decision,
    ) -> Decision {
        if request.mode != Mode::Server {
            return Decision {
                reasons: vec!["server-mode-required".to_string()],
                ..base
            };
        }
        Decision {
            allow: true,
            max_duration: request.requested_duration.min(rule.server_ceiling()),
            reasons: vec![format!("rule {} allows in server mode", rule.name)],
            ..base
        }
    }

    /// Step 6: an active break-glass event overrides a denial.
    async fn apply_break_glass(
        &self,
        request: &DecisionRequest,
        matched: Option<&Rule>,
        decision: Decision,
    ) -> Decision {
        let event = match self
            .breakglass
            .find_active(
                &request.identity.username,
                &request.profile,
                request.request_time,
            )
            .await
        {
            Ok(event) => event,
            Err(e) => {
                // The override only ever upgrades a denial; a read failure
                // leaves the ordinary decision in force.
                warn!(error = %e, "break-glass lookup failed; no override");
                None
            }
        };
        let Some(event) = event else {
            return decision;
        };
        let Some(remaining) = event.remaining(request.request_time) else {
            return decision;
        };

        let mut max = request.requested_duration.min(remaining);
        if let Some(rule) = matched {
            max = max.min(rule.max_duration);
        }
        info!(
            event = %event.id,
            invoker = %event.invoker,
            profile = %event.profile,
            "break-glass override applied"
        );
        let mut reasons = decision.reasons.clone();
        reasons.push(format!("break-glass event {} active", event.id));
        Decision {
            allow: true,
            max_duration: max,
            break_glass: true,
            break_glass_remaining: Some(remaining),
            reasons,
            ..decision
        }
    }
}
