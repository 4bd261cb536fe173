use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PlayerId = i64;

/// Append-only audit record of a single submission. Never read by the
/// ranking path; rank is derived from the running totals only.
#[derive(Debug, Clone)]
pub struct ScoreEvent {
    pub player_id: PlayerId,
    pub points: i64,
    pub mode: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable per-player aggregate. `rank` stays `None` until the first
/// completed recomputation after the player's first submission.
#[derive(Debug, Clone, Default)]
pub struct EntryRow {
    pub total_score: i64,
    pub rank: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreSubmit {
    pub player_id: PlayerId,
    pub score: i64,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: PlayerId,
    pub username: String,
    pub total_score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub total_entries: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerRank {
    pub user_id: PlayerId,
    pub username: String,
    pub rank: i64,
    pub total_score: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitAck {
    pub success: bool,
    pub message: String,
    pub data: MessageResponse,
}

impl SubmitAck {
    pub fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: MessageResponse {
                message: message.to_string(),
            },
        }
    }
}
