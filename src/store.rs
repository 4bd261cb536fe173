//! # Score store
//!
//! Session abstraction over the transactional store holding players,
//! score events, and leaderboard entries.
//!
//! ## Locking discipline
//!
//! - One lock per leaderboard entry row. Concurrent submissions for the
//!   *same* player serialize on it, so no update is ever lost; different
//!   players proceed independently.
//! - Row acquisition is bounded by the configured timeout. A submission
//!   that cannot get the row in time fails with a retryable error instead
//!   of blocking its request slot indefinitely.
//! - Score events are append-only and need no locking beyond the
//!   enclosing submission unit.
//! - Lock order is always entries map, then row, then the event log.
//!
//! Rank write-back holds the entries map exclusively for its duration, so
//! listings never observe a half-written rank assignment.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{Mutex, RwLock},
    time::timeout,
};

use crate::{
    error::AppError,
    models::{EntryRow, LeaderboardEntry, LeaderboardPage, PlayerId, PlayerRank, ScoreEvent},
};

pub struct Store {
    players: RwLock<HashMap<PlayerId, String>>,
    events: Mutex<Vec<ScoreEvent>>,
    entries: RwLock<HashMap<PlayerId, Arc<Mutex<EntryRow>>>>,
    lock_timeout: Duration,
}

impl Store {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            entries: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Register a player. Identity is owned externally; this exists for
    /// seeding and tests, and mirrors the collaborator's duplicate rules.
    pub async fn create_player(&self, player_id: PlayerId, username: &str) -> Result<(), AppError> {
        let mut players = self.players.write().await;

        if players.contains_key(&player_id) {
            return Err(AppError::Conflict(format!(
                "Player {player_id} already registered"
            )));
        }
        if players.values().any(|name| name == username) {
            return Err(AppError::Conflict(format!(
                "Username {username} already taken"
            )));
        }

        players.insert(player_id, username.to_string());
        Ok(())
    }

    pub async fn player_exists(&self, player_id: PlayerId) -> bool {
        self.players.read().await.contains_key(&player_id)
    }

    /// One atomic submission unit: append the score event and add the
    /// delta to the player's total under the row lock. Nothing is
    /// observable if the row cannot be acquired. Returns the new total.
    pub async fn submit_score(
        &self,
        player_id: PlayerId,
        points: i64,
        mode: &str,
    ) -> Result<i64, AppError> {
        let row = {
            let mut entries = self.entries.write().await;
            entries
                .entry(player_id)
                .or_insert_with(|| Arc::new(Mutex::new(EntryRow::default())))
                .clone()
        };

        let mut row = timeout(self.lock_timeout, row.lock()).await.map_err(|_| {
            AppError::TransientStorage(format!(
                "Timed out waiting for the entry row of player {player_id}"
            ))
        })?;

        self.events.lock().await.push(ScoreEvent {
            player_id,
            points,
            mode: mode.to_string(),
            timestamp: Utc::now(),
        });

        row.total_score += points;
        Ok(row.total_score)
    }

    /// Committed totals at the instant of the call. Input to rank
    /// recomputation.
    pub async fn snapshot_totals(&self) -> Vec<(PlayerId, i64)> {
        let entries = self.entries.read().await;
        let mut totals = Vec::with_capacity(entries.len());
        for (&player_id, row) in entries.iter() {
            totals.push((player_id, row.lock().await.total_score));
        }
        totals
    }

    /// Replace every rank in one shot. Holds the entries map exclusively
    /// so no reader interleaves with a partial assignment.
    pub async fn write_ranks(&self, ranks: Vec<(PlayerId, i64)>) -> Result<(), AppError> {
        let entries = self.entries.write().await;
        for (player_id, rank) in ranks {
            if let Some(row) = entries.get(&player_id) {
                row.lock().await.rank = Some(rank);
            }
        }
        Ok(())
    }

    /// Rank-ordered page of the leaderboard joined with usernames, plus
    /// the total entry count. Entries not yet ranked are counted but not
    /// listed; they appear once the next recomputation lands.
    pub async fn list_top(&self, limit: u32, page: u32) -> Result<LeaderboardPage, AppError> {
        let entries = self.entries.read().await;
        let players = self.players.read().await;

        let total_entries = entries.len();
        let mut ranked = Vec::with_capacity(total_entries);
        for (&player_id, row) in entries.iter() {
            let row = row.lock().await;
            if let Some(rank) = row.rank {
                if let Some(username) = players.get(&player_id) {
                    ranked.push(LeaderboardEntry {
                        rank,
                        user_id: player_id,
                        username: username.clone(),
                        total_score: row.total_score,
                    });
                }
            }
        }

        // Stable pagination across equal ranks.
        ranked.sort_by(|a, b| a.rank.cmp(&b.rank).then(a.user_id.cmp(&b.user_id)));

        // page is 1-based; treat 0 as the first page rather than underflow.
        let offset = page.saturating_sub(1) as usize * limit as usize;
        let leaderboard = ranked
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok(LeaderboardPage {
            total_entries,
            leaderboard,
        })
    }

    /// A single player's rank, total, and username. Distinguishes an
    /// unknown player from one that exists but has no ranked entry yet.
    pub async fn player_rank(&self, player_id: PlayerId) -> Result<PlayerRank, AppError> {
        let username = self
            .players
            .read()
            .await
            .get(&player_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let row = self.entries.read().await.get(&player_id).cloned();
        let row = match row {
            Some(row) => row,
            None => {
                return Err(AppError::NotFound(
                    "Player has not yet been ranked".to_string(),
                ))
            }
        };

        let row = row.lock().await;
        match row.rank {
            Some(rank) => Ok(PlayerRank {
                user_id: player_id,
                username,
                rank,
                total_score: row.total_score,
            }),
            None => Err(AppError::NotFound(
                "Player has not yet been ranked".to_string(),
            )),
        }
    }

    #[cfg(test)]
    pub async fn event_count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<Store> {
        Arc::new(Store::new(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let store = store();
        store.create_player(1, "alice").await.unwrap();

        assert!(matches!(
            store.create_player(1, "bob").await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store.create_player(2, "alice").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn submission_creates_entry_and_event() {
        let store = store();
        store.create_player(1, "alice").await.unwrap();

        let total = store.submit_score(1, 250, "default").await.unwrap();
        assert_eq!(total, 250);
        assert_eq!(store.event_count().await, 1);

        let total = store.submit_score(1, 50, "ranked").await.unwrap();
        assert_eq!(total, 300);
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_player_submissions_lose_no_update() {
        let store = store();
        store.create_player(1, "alice").await.unwrap();
        store.submit_score(1, 100, "default").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.submit_score(1, 10, "default").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let totals = store.snapshot_totals().await;
        assert_eq!(totals, vec![(1, 100 + 50 * 10)]);
        assert_eq!(store.event_count().await, 51);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_players_do_not_contend() {
        let store = store();
        let mut handles = Vec::new();
        for player_id in 1..=20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    store.submit_score(player_id, 5, "default").await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut totals = store.snapshot_totals().await;
        totals.sort();
        assert_eq!(totals.len(), 20);
        assert!(totals.iter().all(|&(_, total)| total == 50));
    }

    #[tokio::test]
    async fn contended_row_times_out_as_retryable() {
        let store = Arc::new(Store::new(Duration::from_millis(20)));
        store.submit_score(1, 10, "default").await.unwrap();

        let row = store.entries.read().await.get(&1).unwrap().clone();
        let _held = row.lock().await;

        match store.submit_score(1, 10, "default").await {
            Err(AppError::TransientStorage(_)) => {}
            other => panic!("expected TransientStorage, got {other:?}"),
        }

        // The aborted submission left no event behind.
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_player_and_unranked_player_are_distinct() {
        let store = store();
        store.create_player(1, "alice").await.unwrap();

        match store.player_rank(99).await {
            Err(AppError::NotFound(detail)) => assert_eq!(detail, "User not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        match store.player_rank(1).await {
            Err(AppError::NotFound(detail)) => {
                assert_eq!(detail, "Player has not yet been ranked")
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn listing_counts_unranked_entries_without_listing_them() {
        let store = store();
        store.create_player(1, "alice").await.unwrap();
        store.create_player(2, "bob").await.unwrap();
        store.submit_score(1, 100, "default").await.unwrap();
        store.submit_score(2, 200, "default").await.unwrap();
        store.write_ranks(vec![(2, 1)]).await.unwrap();

        let page = store.list_top(10, 1).await.unwrap();
        assert_eq!(page.total_entries, 2);
        assert_eq!(page.leaderboard.len(), 1);
        assert_eq!(page.leaderboard[0].user_id, 2);
    }

    #[tokio::test]
    async fn listing_paginates_in_rank_order() {
        let store = store();
        for player_id in 1..=5 {
            store
                .create_player(player_id, &format!("player{player_id}"))
                .await
                .unwrap();
            store
                .submit_score(player_id, player_id * 100, "default")
                .await
                .unwrap();
        }
        store
            .write_ranks(vec![(5, 1), (4, 2), (3, 3), (2, 4), (1, 5)])
            .await
            .unwrap();

        let page = store.list_top(2, 2).await.unwrap();
        assert_eq!(page.total_entries, 5);
        let ids: Vec<_> = page.leaderboard.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn page_zero_reads_as_first_page() {
        let store = store();
        store.create_player(1, "alice").await.unwrap();
        store.submit_score(1, 100, "default").await.unwrap();
        store.write_ranks(vec![(1, 1)]).await.unwrap();

        let page = store.list_top(10, 0).await.unwrap();
        assert_eq!(page.leaderboard.len(), 1);
        assert_eq!(page.leaderboard[0].user_id, 1);
    }
}
