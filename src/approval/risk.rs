//! Risk assessment for generation requests.
//!
//! Pure classification: no I/O, no state. Three independent pre-execution
//! rules plus one post-execution rule:
//!
//! | Rule | Fires when | Reason |
//! |------|------------|--------|
//! | question count | `question_count > 25` | `question_count_<N>` |
//! | critic pass | `enable_critic_pass` | `critic_pass_enabled` |
//! | context trim | `context_trim_percent > 0.25` | `context_trimmed_<P>pct` |
//! | batch quality (post) | decision is `regen_full` | `batch_quality_regen_full` |
//!
//! All matching rules fire; reasons are appended in table order.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::GovernanceError;

/// The only post-execution batch decision treated as high-risk.
pub const REGEN_FULL_DECISION: &str = "regen_full";

/// Reason emitted by [`RiskAssessor::detect_post_execution_high_risk`].
pub const BATCH_REGEN_FULL_REASON: &str = "batch_quality_regen_full";

/// Reason emitted when the critic pass is requested.
pub const CRITIC_PASS_REASON: &str = "critic_pass_enabled";

fn default_max_question_count() -> u32 {
    25
}

fn default_max_context_trim_percent() -> f64 {
    0.25
}

/// Thresholds for the pre-execution risk rules.
///
/// Both thresholds are exclusive: a value equal to the threshold is not
/// high-risk.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RiskConfig {
    /// Largest question count that is still considered routine.
    #[serde(default = "default_max_question_count")]
    pub max_question_count: u32,

    /// Largest context-trim fraction (`0.0..=1.0`) still considered routine.
    #[serde(default = "default_max_context_trim_percent")]
    pub max_context_trim_percent: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_question_count: default_max_question_count(),
            max_context_trim_percent: default_max_context_trim_percent(),
        }
    }
}

/// Result of a risk assessment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HighRiskCheck {
    /// `true` when at least one rule fired.
    pub is_high_risk: bool,
    /// One reason per fired rule, in rule order. Safe to display and log.
    pub reasons: Vec<String>,
}

impl HighRiskCheck {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            is_high_risk: !reasons.is_empty(),
            reasons,
        }
    }
}

/// Stateless classifier for risky generation requests.
#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    config: RiskConfig,
}

impl RiskAssessor {
    /// Create an assessor with the given thresholds.
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Return the active thresholds.
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Reject malformed risk inputs.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Validation`] if `context_trim_percent` is
    /// NaN, infinite, or outside `[0.0, 1.0]`.
    pub fn validate_inputs(context_trim_percent: Option<f64>) -> Result<(), GovernanceError> {
        if let Some(pct) = context_trim_percent {
            if !pct.is_finite() || !(0.0..=1.0).contains(&pct) {
                return Err(GovernanceError::Validation(format!(
                    "context_trim_percent must be a finite fraction in [0.0, 1.0], got {pct}"
                )));
            }
        }
        Ok(())
    }

    /// Evaluate the pre-execution rules.
    ///
    /// Every rule is evaluated; there is no short-circuit.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_ai_governance::RiskAssessor;
    /// let check = RiskAssessor::default().detect_high_risk(26, false, None);
    /// assert!(check.is_high_risk);
    /// assert_eq!(check.reasons, vec!["question_count_26"]);
    /// ```
    pub fn detect_high_risk(
        &self,
        question_count: u32,
        enable_critic_pass: bool,
        context_trim_percent: Option<f64>,
    ) -> HighRiskCheck {
        let mut reasons = Vec::new();

        if question_count > self.config.max_question_count {
            reasons.push(format!("question_count_{question_count}"));
        }

        if enable_critic_pass {
            reasons.push(CRITIC_PASS_REASON.to_string());
        }

        if let Some(pct) = context_trim_percent {
            if pct > self.config.max_context_trim_percent {
                let whole = (pct * 100.0).round() as i64;
                reasons.push(format!("context_trimmed_{whole}pct"));
            }
        }

        HighRiskCheck::from_reasons(reasons)
    }

    /// Evaluate the post-execution rule on a batch quality decision.
    ///
    /// Only the literal `regen_full` is high-risk; every other value,
    /// including unknown ones, is not.
    pub fn detect_post_execution_high_risk(batch_decision: &str) -> HighRiskCheck {
        if batch_decision == REGEN_FULL_DECISION {
            HighRiskCheck::from_reasons(vec![BATCH_REGEN_FULL_REASON.to_string()])
        } else {
            HighRiskCheck::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessor() -> RiskAssessor {
        RiskAssessor::default()
    }

    // -- question count --------------------------------------------------

    #[test]
    fn test_question_count_25_not_high_risk() {
        let check = assessor().detect_high_risk(25, false, None);
        assert!(!check.is_high_risk);
        assert!(check.reasons.is_empty());
    }

    #[test]
    fn test_question_count_26_high_risk() {
        let check = assessor().detect_high_risk(26, false, None);
        assert!(check.is_high_risk);
        assert_eq!(check.reasons, vec!["question_count_26"]);
    }

    #[test]
    fn test_question_count_zero_not_high_risk() {
        assert!(!assessor().detect_high_risk(0, false, None).is_high_risk);
    }

    // -- critic pass -----------------------------------------------------

    #[test]
    fn test_critic_pass_alone_high_risk() {
        let check = assessor().detect_high_risk(3, true, None);
        assert!(check.is_high_risk);
        assert_eq!(check.reasons, vec!["critic_pass_enabled"]);
    }

    // -- context trim ----------------------------------------------------

    #[test]
    fn test_context_trim_exactly_0_25_not_high_risk() {
        let check = assessor().detect_high_risk(1, false, Some(0.25));
        assert!(!check.is_high_risk);
    }

    #[test]
    fn test_context_trim_0_30_high_risk_rounded_reason() {
        let check = assessor().detect_high_risk(1, false, Some(0.30));
        assert!(check.is_high_risk);
        assert_eq!(check.reasons, vec!["context_trimmed_30pct"]);
    }

    #[test]
    fn test_context_trim_rounds_half_up() {
        let check = assessor().detect_high_risk(1, false, Some(0.335));
        assert_eq!(check.reasons, vec!["context_trimmed_34pct"]);
    }

    #[test]
    fn test_context_trim_absent_not_high_risk() {
        assert!(!assessor().detect_high_risk(1, false, None).is_high_risk);
    }

    // -- combined --------------------------------------------------------

    #[test]
    fn test_all_rules_fire_in_order() {
        let check = assessor().detect_high_risk(50, true, Some(0.40));
        assert!(check.is_high_risk);
        assert_eq!(
            check.reasons,
            vec![
                "question_count_50",
                "critic_pass_enabled",
                "context_trimmed_40pct"
            ]
        );
    }

    #[test]
    fn test_custom_thresholds_respected() {
        let a = RiskAssessor::new(RiskConfig {
            max_question_count: 10,
            max_context_trim_percent: 0.5,
        });
        assert!(a.detect_high_risk(11, false, None).is_high_risk);
        assert!(!a.detect_high_risk(10, false, Some(0.5)).is_high_risk);
        assert!(a.detect_high_risk(0, false, Some(0.51)).is_high_risk);
    }

    // -- post execution --------------------------------------------------

    #[test]
    fn test_post_execution_regen_full_high_risk() {
        let check = RiskAssessor::detect_post_execution_high_risk("regen_full");
        assert!(check.is_high_risk);
        assert_eq!(check.reasons, vec!["batch_quality_regen_full"]);
    }

    #[test]
    fn test_post_execution_other_decisions_not_high_risk() {
        for decision in ["accept", "regen_partial", "", "REGEN_FULL", "unknown"] {
            let check = RiskAssessor::detect_post_execution_high_risk(decision);
            assert!(!check.is_high_risk, "{decision:?} must not be high-risk");
            assert!(check.reasons.is_empty());
        }
    }

    // -- validation ------------------------------------------------------

    #[test]
    fn test_validate_inputs_accepts_none_and_bounds() {
        assert!(RiskAssessor::validate_inputs(None).is_ok());
        assert!(RiskAssessor::validate_inputs(Some(0.0)).is_ok());
        assert!(RiskAssessor::validate_inputs(Some(1.0)).is_ok());
    }

    #[test]
    fn test_validate_inputs_rejects_nan_and_out_of_range() {
        for bad in [f64::NAN, f64::INFINITY, -0.1, 1.01] {
            let result = RiskAssessor::validate_inputs(Some(bad));
            assert!(
                matches!(result, Err(GovernanceError::Validation(_))),
                "{bad} must be rejected"
            );
        }
    }

    #[test]
    fn test_risk_config_deserializes_with_defaults() {
        let cfg: RiskConfig = toml::from_str("").expect("test: empty risk config");
        assert_eq!(cfg, RiskConfig::default());
        assert_eq!(cfg.max_question_count, 25);
    }
}
