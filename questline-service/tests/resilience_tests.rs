//! Retry, circuit breaker and stale serving against a failing source.

use questline_core::RankView;
use questline_resilience::CircuitState;
use questline_service::QuestlineRuntime;
use questline_storage::ReadStatus;
use questline_test_utils::assertions::{assert_circuit_open, assert_unavailable};
use questline_test_utils::fixtures::{self, id};
use questline_test_utils::{FlakySource, InMemoryLeaderboard, QuestlineError, UpstreamError};
use std::time::Duration;

type Runtime = QuestlineRuntime<FlakySource<InMemoryLeaderboard>>;

fn runtime(source: FlakySource<InMemoryLeaderboard>) -> Runtime {
    QuestlineRuntime::new(source, fixtures::fast_config()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_transparently() {
    let runtime = runtime(FlakySource::new(
        fixtures::ranked_board(4),
        2,
        fixtures::transient_error(),
    ));

    let page = runtime.service().top(RankView::AllTime, None).await.unwrap();
    assert_eq!(page.entries.len(), 4);
    // Two failed fetch_page attempts, then fetch_page and the population count
    assert_eq!(runtime.source().calls(), 4);
    assert_eq!(runtime.breaker_state(), CircuitState::Closed);
    assert_eq!(runtime.breaker().consecutive_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_is_returned_once_and_not_cached() {
    let runtime = runtime(FlakySource::new(
        fixtures::ranked_board(4),
        1,
        fixtures::fatal_error(),
    ));

    let err = runtime
        .service()
        .top(RankView::AllTime, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuestlineError::Upstream(UpstreamError::Status { status: 400, .. })
    ));
    assert_eq!(runtime.source().calls(), 1);
    assert_eq!(runtime.cache().stats().unwrap().size, 0);

    // The next call computes normally
    assert!(runtime.service().top(RankView::AllTime, None).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_fails_fast_and_recovers() {
    let runtime = runtime(FlakySource::always_failing(
        fixtures::ranked_board(3),
        fixtures::transient_error(),
    ));

    let first = runtime.service().rank_of(RankView::AllTime, id(1), None).await;
    assert_unavailable(&first);
    assert!(matches!(
        first,
        Err(QuestlineError::RetryExhausted { attempts: 3, .. })
    ));
    assert_eq!(runtime.source().calls(), 3);
    assert_eq!(runtime.breaker_state(), CircuitState::Open);

    // Rejected without reaching the source, and not retried
    let second = runtime.service().rank_of(RankView::AllTime, id(2), None).await;
    assert_circuit_open(&second);
    assert_unavailable(&second);
    assert_eq!(runtime.source().calls(), 3);

    runtime.source().set_failures(0);
    tokio::time::advance(Duration::from_secs(6)).await;

    let entry = runtime
        .service()
        .rank_of(RankView::AllTime, id(2), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.rank, 2);
    assert_eq!(runtime.breaker_state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn stale_page_is_served_while_source_is_down() {
    let runtime = runtime(FlakySource::healthy(fixtures::ranked_board(5)));
    let service = runtime.service();
    let ttl = runtime.config().rank.leaderboard_ttl;
    let stale_window = runtime.config().cache.default_stale_window;

    let fresh = service
        .leaderboard(RankView::AllTime, None, 5, 0)
        .await
        .unwrap();
    runtime.source().set_failures(u32::MAX);

    tokio::time::advance(ttl + Duration::from_secs(1)).await;
    let read = service
        .leaderboard_read(RankView::AllTime, None, 5, 0)
        .await
        .unwrap();
    assert_eq!(read.status(), ReadStatus::Stale);
    assert_eq!(read.value(), &fresh);

    // Let the background refresh run out its retries
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stats = runtime.cache().stats().unwrap();
    assert_eq!(stats.stale_hits, 1);
    assert_eq!(stats.refresh_failures, 1);
    assert_eq!(stats.refreshes, 0);

    let again = service
        .leaderboard_read(RankView::AllTime, None, 5, 0)
        .await
        .unwrap();
    assert!(again.is_stale());
    assert_eq!(again.value(), &fresh);

    // Past the stale window nothing is left to serve
    tokio::time::advance(stale_window).await;
    let gone = service.leaderboard(RankView::AllTime, None, 5, 0).await;
    assert_unavailable(&gone);
}

#[tokio::test(start_paused = true)]
async fn stale_page_is_replaced_by_successful_refresh() {
    let runtime = runtime(FlakySource::healthy(fixtures::ranked_board(5)));
    let service = runtime.service();
    let ttl = runtime.config().rank.leaderboard_ttl;

    service.top(RankView::AllTime, None).await.unwrap();
    runtime
        .source()
        .wrapped()
        .upsert_member(questline_test_utils::Member::new(id(5), "user005").with_score(1_000_000))
        .unwrap();

    tokio::time::advance(ttl + Duration::from_secs(1)).await;
    let stale = service.top(RankView::AllTime, None).await.unwrap();
    assert_eq!(stale.entries[0].entity.id, id(1));

    tokio::time::sleep(Duration::from_millis(10)).await;
    let refreshed = service
        .leaderboard_read(RankView::AllTime, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(refreshed.status(), ReadStatus::Fresh);
    assert_eq!(refreshed.value().entries[0].entity.id, id(5));
}
