//! Token budget enforcement for context carried between phases.
//!
//! [`TokenBudgetManager`] reduces an aggregated phase output until its
//! estimated size fits `max_tokens`. Estimation is character based
//! (`ceil(chars × tokens_per_char)`), so results are deterministic and need
//! no tokenizer.
//!
//! # Reduction pipeline
//!
//! Strategies are tried in order of increasing destructiveness; the first
//! whose output fits wins:
//!
//! | Strategy | Output |
//! |----------|--------|
//! | `priority_only` | priority segments only, original order |
//! | `with_summary` | each retained segment condensed to marker + first sentence, plus an omitted-content note |
//! | `trim_to_budget` | largest character prefix of the retained text that fits |
//!
//! Every reducing call records exactly one [`ReductionLogEntry`].

use super::segment::{Segment, join_segments, segment_context};
use crate::core::error::DomainError;
use crate::orchestration::phase::Phase;
use crate::util::truncate_chars;
use serde::{Deserialize, Serialize};

/// Reduction strategy, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionStrategy {
    PriorityOnly,
    WithSummary,
    TrimToBudget,
}

impl ReductionStrategy {
    pub const PIPELINE: [ReductionStrategy; 3] = [
        ReductionStrategy::PriorityOnly,
        ReductionStrategy::WithSummary,
        ReductionStrategy::TrimToBudget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionStrategy::PriorityOnly => "priority_only",
            ReductionStrategy::WithSummary => "with_summary",
            ReductionStrategy::TrimToBudget => "trim_to_budget",
        }
    }

    /// Reason recorded in the reduction log
    pub fn reason(&self) -> &'static str {
        match self {
            ReductionStrategy::PriorityOnly => "token_budget_exceeded_priority",
            ReductionStrategy::WithSummary => "token_budget_exceeded_with_summary",
            ReductionStrategy::TrimToBudget => "token_budget_exceeded_summary",
        }
    }

    /// Whether the strategy rewrites content rather than only selecting it
    pub fn applies_summary(&self) -> bool {
        !matches!(self, ReductionStrategy::PriorityOnly)
    }
}

impl std::fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reduction performed by [`TokenBudgetManager::enforce`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionLogEntry {
    pub phase: Phase,
    pub strategy: ReductionStrategy,
    pub reason: String,
    pub before_tokens: usize,
    pub after_tokens: usize,
    /// `after_tokens / before_tokens`, clamped to `[0, 1]`
    pub retain_ratio: f64,
    pub summary_applied: bool,
}

/// Output of a single `enforce` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBudgetResult {
    pub context: String,
    /// True whenever the context was reduced
    pub summary_applied: bool,
    pub reduced_tokens: usize,
    pub log: Vec<ReductionLogEntry>,
}

impl TokenBudgetResult {
    fn unchanged(context: &str) -> Self {
        Self {
            context: context.to_string(),
            summary_applied: false,
            reduced_tokens: 0,
            log: Vec::new(),
        }
    }

    pub fn was_reduced(&self) -> bool {
        !self.log.is_empty()
    }

    /// The entry describing the reduction, if any
    pub fn entry(&self) -> Option<&ReductionLogEntry> {
        self.log.last()
    }
}

/// Fits text into a fixed token budget
///
/// ```
/// use triad_domain::{Phase, TokenBudgetManager};
///
/// let budget = TokenBudgetManager::new(10, 1.0).unwrap();
/// let result = budget.enforce(&"x".repeat(40), Phase::Debate);
/// assert!(budget.estimate_tokens(&result.context) <= 10);
/// assert_eq!(result.reduced_tokens, 30);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBudgetManager {
    max_tokens: usize,
    tokens_per_char: f64,
}

impl TokenBudgetManager {
    pub fn new(max_tokens: usize, tokens_per_char: f64) -> Result<Self, DomainError> {
        if max_tokens == 0 {
            return Err(DomainError::invalid_config("max_tokens must be > 0"));
        }
        if !tokens_per_char.is_finite() || tokens_per_char <= 0.0 {
            return Err(DomainError::invalid_config(format!(
                "tokens_per_char must be a positive number (got {})",
                tokens_per_char
            )));
        }
        Ok(Self {
            max_tokens,
            tokens_per_char,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn tokens_per_char(&self) -> f64 {
        self.tokens_per_char
    }

    /// `ceil(chars × tokens_per_char)`
    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.chars().count() as f64 * self.tokens_per_char).ceil() as usize
    }

    pub fn fits(&self, text: &str) -> bool {
        self.estimate_tokens(text) <= self.max_tokens
    }

    /// Reduce `context` to fit the budget.
    ///
    /// Never fails; the returned context always satisfies
    /// `estimate_tokens(context) <= max_tokens`.
    pub fn enforce(&self, context: &str, phase: Phase) -> TokenBudgetResult {
        let before_tokens = self.estimate_tokens(context);
        if before_tokens <= self.max_tokens {
            return TokenBudgetResult::unchanged(context);
        }

        let segments = segment_context(context);
        let priority: Vec<&Segment> = segments.iter().filter(|s| s.priority).collect();
        let retained: Vec<&Segment> = if priority.is_empty() {
            segments.iter().collect()
        } else {
            priority
        };

        let chosen = ReductionStrategy::PIPELINE.iter().find_map(|&strategy| {
            let candidate = self.apply(strategy, &segments, &retained, before_tokens)?;
            self.fits(&candidate).then_some((strategy, candidate))
        });
        // Trimming always fits; this only guards the postcondition
        let (strategy, reduced) = match chosen {
            Some(found) => found,
            None => (ReductionStrategy::TrimToBudget, self.trim_to_fit(context)),
        };

        let after_tokens = self.estimate_tokens(&reduced);
        let retain_ratio = (after_tokens as f64 / before_tokens as f64).clamp(0.0, 1.0);

        TokenBudgetResult {
            context: reduced,
            summary_applied: true,
            reduced_tokens: before_tokens - after_tokens,
            log: vec![ReductionLogEntry {
                phase,
                strategy,
                reason: strategy.reason().to_string(),
                before_tokens,
                after_tokens,
                retain_ratio,
                summary_applied: strategy.applies_summary(),
            }],
        }
    }

    fn apply(
        &self,
        strategy: ReductionStrategy,
        segments: &[Segment],
        retained: &[&Segment],
        before_tokens: usize,
    ) -> Option<String> {
        match strategy {
            ReductionStrategy::PriorityOnly => {
                let drops_something = retained.len() < segments.len();
                let has_priority = retained.iter().any(|s| s.priority);
                (has_priority && drops_something).then(|| join_segments(retained.iter().copied()))
            }
            ReductionStrategy::WithSummary => {
                let body = retained
                    .iter()
                    .map(|s| s.condensed())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let omitted = before_tokens.saturating_sub(self.estimate_tokens(&body));
                Some(format!(
                    "{}\n\n[{} of {} segments condensed, ~{} tokens omitted]",
                    body,
                    retained.len(),
                    segments.len(),
                    omitted
                ))
            }
            ReductionStrategy::TrimToBudget => {
                Some(self.trim_to_fit(&join_segments(retained.iter().copied())))
            }
        }
    }

    /// Largest character prefix of `text` that fits
    fn trim_to_fit(&self, text: &str) -> String {
        let mut max_chars = (self.max_tokens as f64 / self.tokens_per_char).floor() as usize;
        let mut prefix = truncate_chars(text, max_chars);
        while max_chars > 0 && !self.fits(prefix) {
            max_chars -= 1;
            prefix = truncate_chars(text, max_chars);
        }
        prefix.to_string()
    }
}
