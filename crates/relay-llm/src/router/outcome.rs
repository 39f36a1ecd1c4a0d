//! Decision table for unsuccessful attempts
//!
//! | outcome               | more tiers left | last tier  |
//! |-----------------------|-----------------|------------|
//! | none / `Overloaded`   | switch          | terminate  |
//! | `Exceeded`            | switch          | crop       |
//! | `Unknown`             | rejection error | rejection  |
//! | `Completed`           | terminate       | terminate  |

use crate::error::{Error, Result};
use crate::provider::LAST_ERROR_KEY;
use crate::response::{InvocationContext, InvocationResponse, InvocationStatus};
use serde::Serialize;
use tracing::debug;

/// What the router should do next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeDecision {
    /// Stop and give up (or stop because there is nothing left to do)
    pub should_terminate: bool,
    /// Crop the prompt and retry the current tier
    pub should_crop_prompt: bool,
    /// Move on to the next quality tier
    pub should_switch_to_next_llm: bool,
}

impl OutcomeDecision {
    const TERMINATE: Self = Self {
        should_terminate: true,
        should_crop_prompt: false,
        should_switch_to_next_llm: false,
    };

    const CROP: Self = Self {
        should_terminate: false,
        should_crop_prompt: true,
        should_switch_to_next_llm: false,
    };

    const SWITCH: Self = Self {
        should_terminate: false,
        should_crop_prompt: false,
        should_switch_to_next_llm: true,
    };
}

/// Decide how to continue after an attempt that did not complete
///
/// `None` stands for "gave up on this tier" (e.g. retries exhausted while
/// overloaded) and is treated like an overload.
///
/// # Errors
/// Returns [`Error::Rejection`] for an `Unknown` status, whatever the tier.
pub fn handle_unsuccessful_outcome(
    response: Option<&InvocationResponse>,
    current_tier_index: usize,
    total_tiers: usize,
    context: &InvocationContext,
    resource: &str,
) -> Result<OutcomeDecision> {
    let has_next_tier = current_tier_index + 1 < total_tiers;

    let decision = match response.map(|r| r.status) {
        None | Some(InvocationStatus::Overloaded) => {
            if has_next_tier {
                OutcomeDecision::SWITCH
            } else {
                OutcomeDecision::TERMINATE
            }
        }
        Some(InvocationStatus::Exceeded) => {
            if has_next_tier {
                OutcomeDecision::SWITCH
            } else {
                OutcomeDecision::CROP
            }
        }
        Some(InvocationStatus::Completed) => OutcomeDecision::TERMINATE,
        Some(InvocationStatus::Unknown) => {
            let model_key = response.map(|r| r.model_key.clone()).unwrap_or_default();
            let reason = response
                .and_then(|r| r.context.get(LAST_ERROR_KEY))
                .and_then(|v| v.as_str())
                .map_or_else(
                    || "unknown invocation status".to_string(),
                    |e| format!("unknown invocation status: {e}"),
                );
            return Err(Error::Rejection {
                resource: resource.to_string(),
                model_key,
                reason,
            });
        }
    };

    debug!(
        resource,
        status = ?response.map(|r| r.status),
        tier = current_tier_index,
        total_tiers,
        context = ?context,
        ?decision,
        "Handled unsuccessful LLM outcome"
    );

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: InvocationStatus) -> InvocationResponse {
        InvocationResponse::skeleton("prompt", "GPT", InvocationContext::new()).with_status(status)
    }

    fn decide(status: Option<InvocationStatus>, tier: usize, total: usize) -> Result<OutcomeDecision> {
        let response = status.map(response);
        handle_unsuccessful_outcome(response.as_ref(), tier, total, &InvocationContext::new(), "res")
    }

    #[test]
    fn test_overloaded_switches_then_terminates() {
        assert_eq!(
            decide(Some(InvocationStatus::Overloaded), 0, 2).unwrap(),
            OutcomeDecision {
                should_terminate: false,
                should_crop_prompt: false,
                should_switch_to_next_llm: true,
            }
        );
        assert_eq!(
            decide(Some(InvocationStatus::Overloaded), 1, 2).unwrap(),
            OutcomeDecision {
                should_terminate: true,
                should_crop_prompt: false,
                should_switch_to_next_llm: false,
            }
        );
    }

    #[test]
    fn test_missing_response_behaves_like_overloaded() {
        assert!(decide(None, 0, 2).unwrap().should_switch_to_next_llm);
        assert!(decide(None, 0, 1).unwrap().should_terminate);
    }

    #[test]
    fn test_exceeded_switches_when_possible() {
        let decision = decide(Some(InvocationStatus::Exceeded), 0, 2).unwrap();
        assert!(decision.should_switch_to_next_llm);
        assert!(!decision.should_crop_prompt);
    }

    #[test]
    fn test_exceeded_at_last_tier_crops() {
        for (tier, total) in [(0, 1), (1, 2)] {
            let decision = decide(Some(InvocationStatus::Exceeded), tier, total).unwrap();
            assert!(decision.should_crop_prompt);
            assert!(!decision.should_switch_to_next_llm);
            assert!(!decision.should_terminate);
        }
    }

    #[test]
    fn test_unknown_is_rejection_at_any_tier() {
        for (tier, total) in [(0, 1), (0, 2), (1, 2)] {
            let err = decide(Some(InvocationStatus::Unknown), tier, total).unwrap_err();
            assert!(err.is_rejection());
        }
    }

    #[test]
    fn test_unknown_rejection_carries_last_error() {
        let response = response(InvocationStatus::Unknown)
            .with_context_entry(LAST_ERROR_KEY, "vendor said no");
        let err = handle_unsuccessful_outcome(
            Some(&response),
            0,
            1,
            &InvocationContext::new(),
            "res",
        )
        .unwrap_err();
        assert!(err.to_string().contains("vendor said no"));
    }
}
