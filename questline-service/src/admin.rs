//! Administrative cache operations.
//!
//! Thin wrappers over the cache store plus a warming pass. Nothing here adds
//! semantics of its own; the surrounding application decides who may call it.

use crate::leaderboard::LeaderboardService;
use questline_core::{domain_label, QuestlineResult, RankView};
use questline_rank::LeaderboardSource;
use questline_storage::{CacheStats, KeyPattern};
use serde::{Deserialize, Serialize};

/// Outcome of one warming pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmReport {
    /// Pages computed or confirmed present.
    pub warmed: usize,
    /// `(view, domain)` pairs that could not be loaded.
    pub failed: Vec<String>,
}

impl WarmReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct CacheAdmin<S> {
    service: LeaderboardService<S>,
}

impl<S: LeaderboardSource + 'static> CacheAdmin<S> {
    pub fn new(service: LeaderboardService<S>) -> Self {
        Self { service }
    }

    /// Remove entries past their stale window.
    pub fn cleanup(&self) -> QuestlineResult<usize> {
        let removed = self.service.cache().cleanup()?;
        tracing::info!(removed, "Admin cache cleanup");
        Ok(removed)
    }

    pub fn clear(&self) -> QuestlineResult<usize> {
        let removed = self.service.cache().clear()?;
        tracing::info!(removed, "Admin cache clear");
        Ok(removed)
    }

    pub fn invalidate_tags<T: AsRef<str>>(&self, tags: &[T]) -> QuestlineResult<usize> {
        let removed = self.service.cache().invalidate_by_tags(tags)?;
        tracing::info!(removed, tags = tags.len(), "Admin tag invalidation");
        Ok(removed)
    }

    pub fn invalidate_pattern(&self, pattern: &KeyPattern) -> QuestlineResult<usize> {
        let removed = self.service.cache().invalidate_by_pattern(pattern)?;
        tracing::info!(removed, pattern = %pattern, "Admin pattern invalidation");
        Ok(removed)
    }

    /// Glob convenience for [`invalidate_pattern`](Self::invalidate_pattern),
    /// e.g. `leaderboard:weekly:*`.
    pub fn invalidate_glob(&self, glob: &str) -> QuestlineResult<usize> {
        let pattern = KeyPattern::glob(glob)?;
        self.invalidate_pattern(&pattern)
    }

    pub fn stats(&self) -> QuestlineResult<CacheStats> {
        Ok(self.service.cache().stats()?)
    }

    /// Pre-populate the top-N page for every view, across all members and
    /// each configured warm domain.
    ///
    /// Failures are logged and reported; they do not stop the pass.
    pub async fn warm(&self) -> WarmReport {
        let config = self.service.config();
        let limit = i64::from(config.warm_top_n.max(1));
        let domains: Vec<Option<&str>> = std::iter::once(None)
            .chain(config.warm_domains.iter().map(|d| Some(d.as_str())))
            .collect();

        let mut report = WarmReport::default();
        for view in RankView::ALL {
            for domain in &domains {
                match self.service.leaderboard(view, *domain, limit, 0).await {
                    Ok(_) => report.warmed += 1,
                    Err(e) => {
                        tracing::warn!(
                            view = %view,
                            domain = domain_label(*domain),
                            error = %e,
                            "Cache warming failed"
                        );
                        report
                            .failed
                            .push(format!("{}:{}", view.as_str(), domain_label(*domain)));
                    }
                }
            }
        }

        tracing::info!(
            warmed = report.warmed,
            failed = report.failed.len(),
            "Cache warming pass finished"
        );
        report
    }
}
