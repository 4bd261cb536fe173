//! # Score submission pipeline
//!
//! Validates a submission, applies the delta atomically under the
//! player's row lock, and schedules rank recomputation in the background.
//!
//! Post-commit ordering matters: the submitter's cached rank entry is
//! invalidated first, so a rank lookup right after the ack sees the new
//! total even while the rank itself lags behind the next recomputation.
//! The top-N cache is left alone here; only a completed recomputation
//! invalidates it.

use std::sync::Arc;

use tracing::debug;

use crate::{error::AppError, models::PlayerId, rank, state::State};

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 10_000;

/// Apply one score submission. The returned ack never waits on rank
/// recomputation; that runs as a spawned task.
pub async fn submit(
    state: &Arc<State>,
    player_id: PlayerId,
    score: i64,
    mode: &str,
) -> Result<(), AppError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(AppError::InvalidArgument(format!(
            "Score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
        )));
    }

    if !state.store.player_exists(player_id).await {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let total = state.store.submit_score(player_id, score, mode).await?;
    debug!("Player {player_id} submitted {score} ({mode}), total now {total}");

    state.rank_cache.invalidate(&player_id);
    rank::schedule_recompute(state.clone());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn seeded_state() -> Arc<State> {
        let state = State::new(Config::load());
        state.store.create_player(1, "alice").await.unwrap();
        state
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected_and_total_untouched() {
        let state = seeded_state().await;
        submit(&state, 1, 400, "default").await.unwrap();

        for bad_score in [-1, 10_001] {
            match submit(&state, 1, bad_score, "default").await {
                Err(AppError::InvalidArgument(detail)) => {
                    assert!(detail.contains("between 0 and 10000"), "got: {detail}");
                    assert!(detail.contains(&bad_score.to_string()), "got: {detail}");
                }
                other => panic!("expected InvalidArgument, got {other:?}"),
            }
        }

        let totals = state.store.snapshot_totals().await;
        assert_eq!(totals, vec![(1, 400)]);
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let state = seeded_state().await;
        match submit(&state, 999, 100, "default").await {
            Err(AppError::NotFound(detail)) => assert_eq!(detail, "User not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn boundary_scores_are_accepted() {
        let state = seeded_state().await;
        submit(&state, 1, MIN_SCORE, "default").await.unwrap();
        submit(&state, 1, MAX_SCORE, "default").await.unwrap();

        let totals = state.store.snapshot_totals().await;
        assert_eq!(totals, vec![(1, MAX_SCORE)]);
    }

    #[tokio::test]
    async fn submission_invalidates_only_the_submitters_rank_entry() {
        let state = seeded_state().await;
        state.store.create_player(2, "bob").await.unwrap();
        submit(&state, 1, 500, "default").await.unwrap();
        submit(&state, 2, 300, "default").await.unwrap();
        rank::recompute_ranks(&state).await.unwrap();

        // Drain the recomputations spawned by the setup submissions so
        // they cannot invalidate the entries primed below.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Prime both rank cache entries.
        let alice = state.store.player_rank(1).await.unwrap();
        let bob = state.store.player_rank(2).await.unwrap();
        state.rank_cache.insert(1, alice);
        state.rank_cache.insert(2, bob.clone());

        submit(&state, 1, 100, "default").await.unwrap();

        assert!(state.rank_cache.get(&1).is_none());
        assert_eq!(state.rank_cache.get(&2), Some(bob));
    }
}
