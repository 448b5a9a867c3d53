//! Recommendation selection.
//!
//! Picks indicators a student should revisit, either for reinforcement
//! (not mastered, or scoring below threshold) or for review (mastered but
//! stale), and attaches matched resources to each.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::{MasteryConfig, MAX_STALENESS_DAYS};
use crate::error::{MasteryError, Result};
use crate::ids::RecordId;
use crate::matcher::ResourceMatcher;
use crate::model::{
    Attempt, AttemptFilter, AttemptStatus, Candidate, ProgressState, ProgressSummary,
    RankingKind, Reason, RecommendationRequest, Resource,
};
use crate::traits::{AttemptStore, CatalogSource, Clock, ProgressStore};

/// Thresholds that decide whether an indicator is a candidate.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    pub reinforcement_threshold: f64,
    pub staleness: Duration,
}

impl SelectionPolicy {
    pub fn from_config(config: &MasteryConfig) -> Self {
        Self {
            reinforcement_threshold: config.reinforcement_threshold,
            staleness: Duration::days(config.staleness_days.clamp(0, MAX_STALENESS_DAYS)),
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&MasteryConfig::default())
    }
}

/// A candidate indicator before resources are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub indicator_id: RecordId,
    pub reason: Reason,
    pub average_score: Option<f64>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Classify one summary, or `None` if it needs no attention.
///
/// Summaries without any attempts carry no signal and are skipped.
pub fn classify(
    summary: &ProgressSummary,
    now: DateTime<Utc>,
    policy: &SelectionPolicy,
) -> Option<Reason> {
    if summary.total_attempts == 0 {
        return None;
    }
    let low_score = summary
        .average_score
        .is_some_and(|s| s < policy.reinforcement_threshold);
    if low_score || summary.state != ProgressState::Completed {
        return Some(Reason::Reinforcement);
    }
    match summary.last_attempt_at {
        Some(last) if now - last > policy.staleness => Some(Reason::Review),
        _ => None,
    }
}

/// Seeds from progress summaries, in summary order.
pub fn seeds_from_summaries(
    summaries: &[ProgressSummary],
    now: DateTime<Utc>,
    policy: &SelectionPolicy,
) -> Vec<Seed> {
    summaries
        .iter()
        .filter_map(|s| {
            classify(s, now, policy).map(|reason| Seed {
                indicator_id: s.indicator_id,
                reason,
                average_score: s.average_score,
                last_attempt_at: s.last_attempt_at,
            })
        })
        .collect()
}

/// Seeds from raw attempts, for students without summaries.
///
/// Only low-scoring completions qualify, and only for reinforcement.
pub fn seeds_from_attempts(attempts: &[Attempt], policy: &SelectionPolicy) -> Vec<Seed> {
    attempts
        .iter()
        .filter(|a| a.status == AttemptStatus::Completed)
        .filter_map(|a| {
            let score = a.score?;
            (score < policy.reinforcement_threshold).then(|| Seed {
                indicator_id: a.indicator_id,
                reason: Reason::Reinforcement,
                average_score: Some(score),
                last_attempt_at: None,
            })
        })
        .collect()
}

/// Collapse seeds to one per indicator, keeping first-seen position.
/// Reinforcement always wins over review.
pub fn merge_seeds(seeds: Vec<Seed>) -> Vec<Seed> {
    let mut merged: Vec<Seed> = Vec::with_capacity(seeds.len());
    let mut index: HashMap<RecordId, usize> = HashMap::new();
    for seed in seeds {
        match index.get(&seed.indicator_id) {
            Some(&pos) => {
                if seed.reason == Reason::Reinforcement && merged[pos].reason == Reason::Review {
                    merged[pos] = seed;
                }
            }
            None => {
                index.insert(seed.indicator_id, merged.len());
                merged.push(seed);
            }
        }
    }
    merged
}

/// Bucket resources under every seed they reference, deduplicated and
/// capped per indicator. Seeds left without resources are dropped.
pub fn attach_resources(
    seeds: Vec<Seed>,
    resources: &[Resource],
    limit_resources: usize,
) -> Vec<Candidate> {
    let by_key: HashMap<String, usize> = seeds
        .iter()
        .enumerate()
        .map(|(i, s)| (s.indicator_id.to_string(), i))
        .collect();
    let mut buckets: Vec<Vec<Resource>> = vec![Vec::new(); seeds.len()];
    let mut seen: Vec<HashSet<RecordId>> = vec![HashSet::new(); seeds.len()];

    for resource in resources {
        for reference in resource.indicator_refs() {
            let Some(&slot) = by_key.get(&reference.canonical()) else {
                continue;
            };
            if buckets[slot].len() >= limit_resources || !seen[slot].insert(resource.id) {
                continue;
            }
            buckets[slot].push(resource.clone());
        }
    }

    seeds
        .into_iter()
        .zip(buckets)
        .filter(|(_, bucket)| !bucket.is_empty())
        .map(|(seed, resources)| Candidate {
            indicator_id: seed.indicator_id,
            reason: seed.reason,
            indicator_code: None,
            average_score: seed.average_score,
            last_attempt_at: seed.last_attempt_at,
            resources,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Orders candidates before they are truncated to the indicator limit.
pub trait RankingPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn rank(&self, candidates: Vec<Candidate>) -> Vec<Candidate>;
}

/// Keeps merge order.
pub struct InsertionOrder;

impl RankingPolicy for InsertionOrder {
    fn name(&self) -> &str {
        "insertion"
    }

    fn rank(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
    }
}

/// Unscored candidates first, then ascending average score. Stable.
pub struct LowestScoreFirst;

impl RankingPolicy for LowestScoreFirst {
    fn name(&self) -> &str {
        "lowest_score"
    }

    fn rank(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| match (a.average_score, b.average_score) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.total_cmp(&y),
        });
        candidates
    }
}

pub fn ranking_for(kind: RankingKind) -> Arc<dyn RankingPolicy> {
    match kind {
        RankingKind::Insertion => Arc::new(InsertionOrder),
        RankingKind::LowestScore => Arc::new(LowestScoreFirst),
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

pub struct RecommendationSelector {
    progress: Arc<dyn ProgressStore>,
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn CatalogSource>,
    matcher: Arc<ResourceMatcher>,
    clock: Arc<dyn Clock>,
    ranking: Arc<dyn RankingPolicy>,
    policy: SelectionPolicy,
    limit_indicators: usize,
    limit_resources: usize,
    fallback_scan: usize,
}

impl RecommendationSelector {
    pub fn new(
        progress: Arc<dyn ProgressStore>,
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn CatalogSource>,
        matcher: Arc<ResourceMatcher>,
        clock: Arc<dyn Clock>,
        config: &MasteryConfig,
    ) -> Self {
        Self {
            progress,
            attempts,
            catalog,
            matcher,
            clock,
            ranking: ranking_for(config.ranking),
            policy: SelectionPolicy::from_config(config),
            limit_indicators: config.limit_indicators,
            limit_resources: config.limit_resources,
            fallback_scan: config.fallback_attempt_scan,
        }
    }

    /// Replace the ranking policy.
    pub fn with_ranking(mut self, ranking: Arc<dyn RankingPolicy>) -> Self {
        self.ranking = ranking;
        self
    }

    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Candidate>> {
        let student_id = RecordId::parse_field("student_id", request.student_id.as_deref())?;
        let limit_indicators = request.limit_indicators.unwrap_or(self.limit_indicators);
        let limit_resources = request.limit_resources.unwrap_or(self.limit_resources);
        if limit_indicators == 0 || limit_resources == 0 {
            return Err(MasteryError::Validation(
                "limit_indicators and limit_resources must be at least 1".into(),
            ));
        }

        let seeds = merge_seeds(self.seeds_for(student_id).await);
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let indicator_ids: Vec<RecordId> = seeds.iter().map(|s| s.indicator_id).collect();
        let resources = match self.matcher.find_resources(&indicator_ids).await {
            Ok(resources) => resources,
            Err(e) => {
                tracing::warn!(student = %student_id, "resource matching failed: {e}");
                Vec::new()
            }
        };

        let candidates = attach_resources(seeds, &resources, limit_resources);
        let mut candidates = self.ranking.rank(candidates);
        candidates.truncate(limit_indicators);

        for candidate in &mut candidates {
            candidate.indicator_code = match self.catalog.indicator(candidate.indicator_id).await
            {
                Ok(found) => found.map(|i| i.code),
                Err(e) => {
                    tracing::warn!(
                        indicator = %candidate.indicator_id,
                        "indicator lookup failed: {e}"
                    );
                    None
                }
            };
        }

        tracing::debug!(
            student = %student_id,
            candidates = candidates.len(),
            ranking = self.ranking.name(),
            "selected recommendations"
        );
        Ok(candidates)
    }

    /// Seeds from summaries, or from raw attempts when there are none.
    async fn seeds_for(&self, student_id: RecordId) -> Vec<Seed> {
        let now = self.clock.now();
        let summaries = match self.progress.progress_for_student(student_id).await {
            Ok(summaries) => summaries,
            Err(e) => {
                tracing::warn!(student = %student_id, "progress read failed, using attempts: {e}");
                Vec::new()
            }
        };
        if !summaries.is_empty() {
            return seeds_from_summaries(&summaries, now, &self.policy);
        }

        let filter = AttemptFilter {
            student_id: Some(student_id),
            indicator_id: None,
            limit: Some(self.fallback_scan),
        };
        match self.attempts.list_attempts(&filter).await {
            Ok(attempts) => seeds_from_attempts(&attempts, &self.policy),
            Err(e) => {
                tracing::warn!(student = %student_id, "attempt fallback failed: {e}");
                Vec::new()
            }
        }
    }
}
