//! The engine facade.
//!
//! Wires the ledger, aggregator, matcher, selector, and analytics over one
//! set of stores and exposes the boundary operations.

use std::collections::HashSet;
use std::sync::Arc;

use crate::analytics::{
    AnalyticsAggregator, ClassAnalytics, InstitutionAnalytics, StudentAnalytics,
};
use crate::config::MasteryConfig;
use crate::error::{MasteryError, Result};
use crate::ids::RecordId;
use crate::ledger::AttemptLedger;
use crate::matcher::ResourceMatcher;
use crate::model::{
    AbandonAttemptRequest, Attempt, AttemptFilter, Candidate, CompleteAttemptRequest,
    ProgressSummary, RecommendationRequest, Resource, StartAttemptRequest,
};
use crate::progress::ProgressAggregator;
use crate::recommend::{RankingPolicy, RecommendationSelector};
use crate::traits::{Clock, Stores, SystemClock};

pub struct MasteryEngine {
    stores: Stores,
    ledger: AttemptLedger,
    aggregator: Arc<ProgressAggregator>,
    matcher: Arc<ResourceMatcher>,
    selector: RecommendationSelector,
    analytics: AnalyticsAggregator,
    config: MasteryConfig,
}

impl MasteryEngine {
    /// Build an engine on the wall clock.
    pub fn new(stores: Stores, config: MasteryConfig) -> Self {
        Self::with_clock(stores, config, Arc::new(SystemClock))
    }

    pub fn with_clock(stores: Stores, config: MasteryConfig, clock: Arc<dyn Clock>) -> Self {
        let aggregator = Arc::new(ProgressAggregator::new(
            stores.attempts.clone(),
            stores.progress.clone(),
        ));
        let matcher = Arc::new(ResourceMatcher::new(stores.catalog.clone()));
        let ledger = AttemptLedger::new(
            stores.attempts.clone(),
            stores.catalog.clone(),
            aggregator.clone(),
            clock.clone(),
            config.default_score,
        );
        let selector = RecommendationSelector::new(
            stores.progress.clone(),
            stores.attempts.clone(),
            stores.catalog.clone(),
            matcher.clone(),
            clock.clone(),
            &config,
        );
        let analytics = AnalyticsAggregator::new(
            stores.progress.clone(),
            stores.attempts.clone(),
            stores.catalog.clone(),
            stores.roster.clone(),
            clock,
            &config,
        );
        Self {
            stores,
            ledger,
            aggregator,
            matcher,
            selector,
            analytics,
            config,
        }
    }

    /// Swap the recommendation ranking policy.
    pub fn with_ranking(mut self, ranking: Arc<dyn RankingPolicy>) -> Self {
        self.selector = self.selector.with_ranking(ranking);
        self
    }

    pub fn config(&self) -> &MasteryConfig {
        &self.config
    }

    pub async fn start_attempt(&self, request: &StartAttemptRequest) -> Result<Attempt> {
        self.ledger.start_attempt(request).await
    }

    pub async fn complete_attempt(&self, request: &CompleteAttemptRequest) -> Result<Attempt> {
        self.ledger.complete_attempt(request).await
    }

    pub async fn abandon_attempt(&self, request: &AbandonAttemptRequest) -> Result<Attempt> {
        self.ledger.abandon_attempt(request).await
    }

    /// Attempts filtered by optional student and indicator, newest first.
    pub async fn list_attempts(
        &self,
        student_id: Option<&str>,
        indicator_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Attempt>> {
        let filter = AttemptFilter {
            student_id: RecordId::parse_optional_field("student_id", student_id)?,
            indicator_id: RecordId::parse_optional_field("indicator_id", indicator_id)?,
            limit,
        };
        self.ledger.list_attempts(&filter).await
    }

    /// A student's summaries, optionally restricted to one curriculum area.
    pub async fn progress_summaries(
        &self,
        student_id: &str,
        area_id: Option<&str>,
    ) -> Result<Vec<ProgressSummary>> {
        let student_id = RecordId::parse_field("student_id", Some(student_id))?;
        let area_id = RecordId::parse_optional_field("area_id", area_id)?;
        let summaries = self.stores.progress.progress_for_student(student_id).await?;

        let Some(area_id) = area_id else {
            return Ok(summaries);
        };
        if self.stores.catalog.area(area_id).await?.is_none() {
            return Err(MasteryError::not_found("area", area_id));
        }
        let in_area: HashSet<RecordId> = self
            .stores
            .catalog
            .indicators()
            .await?
            .into_iter()
            .filter(|i| i.area_id == area_id)
            .map(|i| i.id)
            .collect();
        Ok(summaries
            .into_iter()
            .filter(|s| in_area.contains(&s.indicator_id))
            .collect())
    }

    /// Rebuild one pair's summary from its attempts.
    pub async fn recompute(
        &self,
        student_id: &str,
        indicator_id: &str,
    ) -> Result<ProgressSummary> {
        let student_id = RecordId::parse_field("student_id", Some(student_id))?;
        let indicator_id = RecordId::parse_field("indicator_id", Some(indicator_id))?;
        self.aggregator.recompute(student_id, indicator_id).await
    }

    /// Rebuild every summary of a student.
    pub async fn reconcile_student(&self, student_id: &str) -> Result<Vec<ProgressSummary>> {
        let student_id = RecordId::parse_field("student_id", Some(student_id))?;
        self.aggregator.recompute_student(student_id).await
    }

    /// Active resources for the given indicators; malformed ids are ignored.
    pub async fn find_resources_for_indicators(
        &self,
        indicator_ids: &[String],
    ) -> Result<Vec<Resource>> {
        self.matcher
            .find_resources_for_indicators(indicator_ids)
            .await
    }

    pub async fn recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Candidate>> {
        self.selector.get_recommendations(request).await
    }

    pub async fn student_analytics(&self, student_id: &str) -> Result<StudentAnalytics> {
        self.analytics.student(student_id).await
    }

    pub async fn class_analytics(&self, teacher_id: &str) -> Result<ClassAnalytics> {
        self.analytics.class(teacher_id).await
    }

    pub async fn institution_analytics(&self) -> Result<InstitutionAnalytics> {
        self.analytics.institution().await
    }
}
