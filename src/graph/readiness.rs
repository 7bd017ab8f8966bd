//! Automation-readiness scoring.
//!
//! Each Capability is measured on four signals in [0, 1]:
//!
//! | signal             | value                                               |
//! |--------------------|-----------------------------------------------------|
//! | `decision_factors` | `min(n, saturation) / saturation`                   |
//! | `heuristics`       | 1 if any heuristic is documented, else 0            |
//! | `exceptions`       | share of exceptions whose override is described     |
//! | `skills`           | 1 if any skill reference exists, else 0             |
//!
//! The readiness score is the weighted mean of the signals. Weights are
//! non-negative, so the score never decreases when a signal increases.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::primitive::Capability;

/// Skill type recommended when a Capability has no skill references.
pub const MANUAL_SKILL_TYPE: &str = "manual";

/// Relative weight of each signal. Normalised by their sum when scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessWeights {
    pub decision_factors: f64,
    pub heuristics: f64,
    pub exceptions: f64,
    pub skills: f64,
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self {
            decision_factors: 0.3,
            heuristics: 0.2,
            exceptions: 0.2,
            skills: 0.3,
        }
    }
}

impl ReadinessWeights {
    fn get(&self, signal: ReadinessSignal) -> f64 {
        match signal {
            ReadinessSignal::DecisionFactors => self.decision_factors,
            ReadinessSignal::Heuristics => self.heuristics,
            ReadinessSignal::Exceptions => self.exceptions,
            ReadinessSignal::Skills => self.skills,
        }
    }

    pub fn sum(&self) -> f64 {
        ReadinessSignal::ALL.iter().map(|&s| self.get(s)).sum()
    }
}

/// Scoring parameters for automation candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub weights: ReadinessWeights,
    /// Number of decision factors at which that signal reaches 1.
    pub decision_factor_saturation: usize,
    /// Signals below this value are reported as missing.
    pub signal_threshold: f64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            weights: ReadinessWeights::default(),
            decision_factor_saturation: 3,
            signal_threshold: 0.5,
        }
    }
}

impl ReadinessConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: String| Err(EngineError::InvalidConfig { message });
        for signal in ReadinessSignal::ALL {
            let w = self.weights.get(signal);
            if !w.is_finite() || w < 0.0 {
                return invalid(format!(
                    "readiness weight for {} must be a finite, non-negative number (got {w})",
                    signal.as_str()
                ));
            }
        }
        if self.weights.sum() <= 0.0 {
            return invalid("readiness weights must not all be zero".into());
        }
        if self.decision_factor_saturation == 0 {
            return invalid("decision_factor_saturation must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.signal_threshold) {
            return invalid(format!(
                "signal_threshold must lie in [0, 1] (got {})",
                self.signal_threshold
            ));
        }
        Ok(())
    }

    /// Weighted mean of `signals`, in [0, 1].
    pub fn score(&self, signals: &ReadinessSignals) -> f64 {
        let total = self.weights.sum();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = ReadinessSignal::ALL
            .iter()
            .map(|&s| self.weights.get(s) * signals.get(s))
            .sum();
        (weighted / total).clamp(0.0, 1.0)
    }

    /// Signals scoring below the threshold, in declaration order.
    pub fn missing(&self, signals: &ReadinessSignals) -> Vec<ReadinessSignal> {
        ReadinessSignal::ALL
            .into_iter()
            .filter(|&s| signals.get(s) < self.signal_threshold)
            .collect()
    }
}

/// One readiness dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessSignal {
    DecisionFactors,
    Heuristics,
    Exceptions,
    Skills,
}

impl ReadinessSignal {
    pub const ALL: [Self; 4] = [
        Self::DecisionFactors,
        Self::Heuristics,
        Self::Exceptions,
        Self::Skills,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DecisionFactors => "decision_factors",
            Self::Heuristics => "heuristics",
            Self::Exceptions => "exceptions",
            Self::Skills => "skills",
        }
    }
}

/// Measured value of every signal for one Capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSignals {
    pub decision_factors: f64,
    pub heuristics: f64,
    pub exceptions: f64,
    pub skills: f64,
}

impl ReadinessSignals {
    pub fn measure(cap: &Capability, config: &ReadinessConfig) -> Self {
        let saturation = config.decision_factor_saturation.max(1);
        let factors = cap.decision_factors.len().min(saturation);
        let exceptions = if cap.exceptions.is_empty() {
            0.0
        } else {
            let resolved = cap.exceptions.iter().filter(|e| e.is_resolved()).count();
            resolved as f64 / cap.exceptions.len() as f64
        };
        Self {
            decision_factors: factors as f64 / saturation as f64,
            heuristics: if cap.heuristics.is_empty() { 0.0 } else { 1.0 },
            exceptions,
            skills: if cap.skills.is_empty() { 0.0 } else { 1.0 },
        }
    }

    pub fn get(&self, signal: ReadinessSignal) -> f64 {
        match signal {
            ReadinessSignal::DecisionFactors => self.decision_factors,
            ReadinessSignal::Heuristics => self.heuristics,
            ReadinessSignal::Exceptions => self.exceptions,
            ReadinessSignal::Skills => self.skills,
        }
    }

    pub fn set(&mut self, signal: ReadinessSignal, value: f64) {
        let slot = match signal {
            ReadinessSignal::DecisionFactors => &mut self.decision_factors,
            ReadinessSignal::Heuristics => &mut self.heuristics,
            ReadinessSignal::Exceptions => &mut self.exceptions,
            ReadinessSignal::Skills => &mut self.skills,
        };
        *slot = value.clamp(0.0, 1.0);
    }
}

/// Documented evidence behind a score, joined with `; `.
///
/// Empty when the Capability documents nothing the signals measure.
pub fn rationale(cap: &Capability) -> String {
    let mut parts = Vec::new();
    if !cap.decision_factors.is_empty() {
        parts.push(counted(cap.decision_factors.len(), "decision factor", "decision factors"));
    }
    if !cap.heuristics.is_empty() {
        parts.push(counted(cap.heuristics.len(), "heuristic", "heuristics"));
    }
    if !cap.exceptions.is_empty() {
        let resolved = cap.exceptions.iter().filter(|e| e.is_resolved()).count();
        parts.push(format!(
            "{resolved} of {} resolved",
            counted(cap.exceptions.len(), "exception", "exceptions")
        ));
    }
    if !cap.skills.is_empty() {
        parts.push(counted(cap.skills.len(), "skill reference", "skill references"));
    }
    parts.join("; ")
}

fn counted(n: usize, singular: &str, plural: &str) -> String {
    format!("{n} {}", if n == 1 { singular } else { plural })
}

/// Skill type of the most confident skill reference; ties go to the lowest id.
pub fn recommended_skill_type(cap: &Capability) -> String {
    cap.skills
        .iter()
        .min_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|s| s.skill_type.clone())
        .unwrap_or_else(|| MANUAL_SKILL_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{DecisionFactor, ExceptionRule, SkillReference, WeightTier};

    fn documented() -> Capability {
        Capability::new("cap", "org", "dom", "Pricing")
            .with_factor(DecisionFactor::new("margin", Some(WeightTier::Primary)))
            .with_factor(DecisionFactor::new("volume", None))
            .with_heuristic("round to nearest 5")
            .with_exception(ExceptionRule::new("strategic account", ""))
            .with_exception(ExceptionRule::new("end of quarter", " "))
    }

    #[test]
    fn adding_a_skill_raises_readiness() {
        let config = ReadinessConfig::default();
        let without = documented();
        let with = documented().with_skill(SkillReference::new("s1", "Quote bot", "agent_skill"));

        let a = config.score(&ReadinessSignals::measure(&without, &config));
        let b = config.score(&ReadinessSignals::measure(&with, &config));
        assert!(a < b, "{a} should be below {b}");
        assert!((a - 0.4).abs() < 1e-9);
        assert!((b - 0.7).abs() < 1e-9);
    }

    #[test]
    fn readiness_is_monotone_in_every_signal() {
        let config = ReadinessConfig {
            weights: ReadinessWeights {
                decision_factors: 0.5,
                heuristics: 0.0,
                exceptions: 1.5,
                skills: 2.0,
            },
            ..ReadinessConfig::default()
        };
        let steps = [0.0, 0.25, 0.5, 0.75, 1.0];
        for signal in ReadinessSignal::ALL {
            for &base in &steps {
                let mut signals = ReadinessSignals::default();
                for other in ReadinessSignal::ALL {
                    signals.set(other, base);
                }
                let mut previous = f64::NEG_INFINITY;
                for &value in &steps {
                    signals.set(signal, value);
                    let score = config.score(&signals);
                    assert!(score >= previous, "{signal:?} at {value} dropped the score");
                    previous = score;
                }
            }
        }
    }

    #[test]
    fn missing_elements_follow_threshold() {
        let config = ReadinessConfig::default();
        let signals = ReadinessSignals::measure(&documented(), &config);
        assert_eq!(
            config.missing(&signals),
            vec![ReadinessSignal::Exceptions, ReadinessSignal::Skills]
        );
    }

    #[test]
    fn no_exceptions_scores_zero() {
        let cap = Capability::new("cap", "org", "dom", "Bare");
        let signals = ReadinessSignals::measure(&cap, &ReadinessConfig::default());
        assert_eq!(signals.exceptions, 0.0);
        assert_eq!(ReadinessConfig::default().score(&signals), 0.0);
    }

    #[test]
    fn factors_saturate() {
        let mut cap = documented();
        for i in 0..5 {
            cap = cap.with_factor(DecisionFactor::new(format!("f{i}"), None));
        }
        let signals = ReadinessSignals::measure(&cap, &ReadinessConfig::default());
        assert_eq!(signals.decision_factors, 1.0);
    }

    #[test]
    fn skill_recommendation_prefers_confidence_then_id() {
        let cap = Capability::new("cap", "org", "dom", "X")
            .with_skill(SkillReference::new("b", "B", "workflow").with_confidence(0.9))
            .with_skill(SkillReference::new("a", "A", "tool").with_confidence(0.9))
            .with_skill(SkillReference::new("c", "C", "agent_skill").with_confidence(0.2));
        assert_eq!(recommended_skill_type(&cap), "tool");
        let bare = Capability::new("cap", "org", "dom", "X");
        assert_eq!(recommended_skill_type(&bare), MANUAL_SKILL_TYPE);
    }

    #[test]
    fn rationale_lists_documented_signals() {
        assert_eq!(
            rationale(&documented()),
            "2 decision factors; 1 heuristic; 0 of 2 exceptions resolved"
        );
        let skilled = documented().with_skill(SkillReference::new("s1", "Quote bot", "agent_skill"));
        assert!(rationale(&skilled).ends_with("; 1 skill reference"));
        assert_eq!(rationale(&Capability::new("cap", "org", "dom", "Bare")), "");
    }

    #[test]
    fn config_validation() {
        assert!(ReadinessConfig::default().validate().is_ok());
        let zero = ReadinessConfig {
            weights: ReadinessWeights {
                decision_factors: 0.0,
                heuristics: 0.0,
                exceptions: 0.0,
                skills: 0.0,
            },
            ..ReadinessConfig::default()
        };
        assert!(zero.validate().is_err());
        let negative = ReadinessConfig {
            weights: ReadinessWeights {
                skills: -1.0,
                ..ReadinessWeights::default()
            },
            ..ReadinessConfig::default()
        };
        assert!(negative.validate().is_err());
        let threshold = ReadinessConfig {
            signal_threshold: 1.5,
            ..ReadinessConfig::default()
        };
        assert!(threshold.validate().is_err());
    }
}
