//! # Rank aggregation
//!
//! Re-derives every player's rank from committed totals. Competition
//! ranking: tied totals share a rank, and the next distinct total resumes
//! at one plus the count of strictly greater totals (`RANK()`, not
//! `DENSE_RANK()`).
//!
//! The whole scan-and-rewrite runs behind one recomputation lock. Two
//! interleaved recomputations reading overlapping snapshots could commit
//! a ranking consistent with neither snapshot; the lock makes each pass
//! atomic relative to the others. It never blocks submissions (those only
//! touch their own row) or reads.
//!
//! Cost is O(n log n) over all players, which is why it runs off the
//! request path.

use std::sync::Arc;

use tracing::{debug, error};

use crate::{error::AppError, models::PlayerId, state::State};

/// Competition ranks for a set of totals. Ties share a rank; the next
/// distinct total gets 1 + count of strictly greater totals.
pub fn competition_ranks(mut totals: Vec<(PlayerId, i64)>) -> Vec<(PlayerId, i64)> {
    totals.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut ranks = Vec::with_capacity(totals.len());
    let mut previous: Option<(i64, i64)> = None;

    for (position, (player_id, total)) in totals.into_iter().enumerate() {
        let rank = match previous {
            Some((prev_total, prev_rank)) if prev_total == total => prev_rank,
            _ => position as i64 + 1,
        };
        previous = Some((total, rank));
        ranks.push((player_id, rank));
    }

    ranks
}

/// Recompute and persist ranks for every player, then drop the caches
/// that may hold the old ordering. Idempotent; overlapping invocations
/// serialize behind the recomputation lock.
pub async fn recompute_ranks(state: &State) -> Result<(), AppError> {
    let _guard = state.recompute_lock.lock().await;

    let totals = state.store.snapshot_totals().await;
    let player_count = totals.len();
    let ranks = competition_ranks(totals);
    state
        .store
        .write_ranks(ranks)
        .await
        .map_err(|e| AppError::Recomputation(e.to_string()))?;

    state.top_cache.invalidate_all();
    state.rank_cache.invalidate_all();

    debug!("Recomputed ranks for {player_count} players");
    Ok(())
}

/// Fire-and-forget recomputation trigger for the submission path. The
/// caller never awaits it; failures are logged and the ranking stays at
/// its last committed state until a later pass succeeds.
pub fn schedule_recompute(state: Arc<State>) {
    tokio::spawn(async move {
        if let Err(e) = recompute_ranks(&state).await {
            error!("Background rank recomputation failed: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn ties_share_rank_and_next_rank_skips() {
        let ranks = competition_ranks(vec![(1, 500), (2, 500), (3, 300)]);
        assert_eq!(ranks, vec![(1, 1), (2, 1), (3, 3)]);
    }

    #[test]
    fn distinct_totals_rank_densely() {
        let ranks = competition_ranks(vec![(3, 300), (1, 500), (2, 400)]);
        assert_eq!(ranks, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn all_tied_totals_share_first_place() {
        let ranks = competition_ranks(vec![(1, 100), (2, 100), (3, 100)]);
        assert_eq!(ranks, vec![(1, 1), (2, 1), (3, 1)]);
    }

    #[test]
    fn empty_input_yields_empty_ranking() {
        assert!(competition_ranks(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn recomputation_is_idempotent() {
        let state = State::new(Config::load());
        state.store.create_player(1, "alice").await.unwrap();
        state.store.create_player(2, "bob").await.unwrap();
        state.store.submit_score(1, 500, "default").await.unwrap();
        state.store.submit_score(2, 300, "default").await.unwrap();

        recompute_ranks(&state).await.unwrap();
        let first = state.store.list_top(10, 1).await.unwrap();

        recompute_ranks(&state).await.unwrap();
        let second = state.store.list_top(10, 1).await.unwrap();

        assert_eq!(first.leaderboard, second.leaderboard);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recomputations_serialize_cleanly() {
        let state = State::new(Config::load());
        for player_id in 1..=10 {
            state
                .store
                .create_player(player_id, &format!("player{player_id}"))
                .await
                .unwrap();
            state
                .store
                .submit_score(player_id, player_id * 10, "default")
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(
                async move { recompute_ranks(&state).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let totals = state.store.snapshot_totals().await;
        let expected = competition_ranks(totals);
        for (player_id, rank) in expected {
            let found = state.store.player_rank(player_id).await.unwrap();
            assert_eq!(found.rank, rank);
        }
    }
}
