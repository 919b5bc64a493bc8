//! High score persistence with Top 10 leaderboard.
//!
//! Scores are saved to a local JSON file in the user's data directory.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use super::{
    config::{Difficulty, GameMode},
    error::HighScoreError,
    state::GameEnded,
};

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<HighScores>();
    app.init_resource::<HighScoreStore>();

    // Load high scores on startup
    app.add_systems(Startup, load_high_scores);
}

/// Maximum number of high scores to keep.
const MAX_HIGH_SCORES: usize = 10;

/// A finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub score: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub mode: GameMode,
    pub difficulty: Difficulty,
}

impl ScoreRecord {
    pub fn new(score: u32, mode: GameMode, difficulty: Difficulty) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            score,
            timestamp,
            mode,
            difficulty,
        }
    }
}

/// Resource holding the top 10 high scores.
#[derive(Resource, Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScores {
    pub entries: Vec<ScoreRecord>,
}

/// Where the leaderboard lives on disk. `None` keeps scores in memory only.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct HighScoreStore(pub Option<PathBuf>);

impl Default for HighScoreStore {
    fn default() -> Self {
        Self(HighScores::default_path().ok())
    }
}

impl HighScores {
    /// Check if a score would make it into the top 10.
    pub fn is_high_score(&self, score: u32) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.entries
            .last()
            .is_none_or(|lowest| score > lowest.score)
    }

    /// Add a new score to the leaderboard (if it qualifies).
    /// Returns true if the score was added.
    pub fn add_score(&mut self, record: ScoreRecord) -> bool {
        if record.score == 0 {
            return false;
        }

        // Insert in sorted position (descending by score)
        let pos = self
            .entries
            .iter()
            .position(|e| record.score > e.score)
            .unwrap_or(self.entries.len());

        if pos >= MAX_HIGH_SCORES {
            return false;
        }

        self.entries.insert(pos, record);
        self.entries.truncate(MAX_HIGH_SCORES);
        true
    }

    pub fn best(&self) -> Option<&ScoreRecord> {
        self.entries.first()
    }

    /// `<data_local_dir>/bubble_field/highscores.json`
    pub fn default_path() -> Result<PathBuf, HighScoreError> {
        dirs::data_local_dir()
            .map(|dir| dir.join("bubble_field").join("highscores.json"))
            .ok_or(HighScoreError::NoDataDir)
    }

    /// Load high scores from `path`. A missing file is an empty leaderboard.
    pub fn load_from(path: &Path) -> Result<Self, HighScoreError> {
        if !path.exists() {
            info!("No high scores file found at {:?}, starting fresh", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| HighScoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scores: Self = serde_json::from_str(&contents)?;
        scores.entries.sort_by(|a, b| b.score.cmp(&a.score));
        scores.entries.truncate(MAX_HIGH_SCORES);
        info!("Loaded {} high scores from {:?}", scores.entries.len(), path);
        Ok(scores)
    }

    /// Save high scores to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), HighScoreError> {
        let io_error = |source| HighScoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_error)?;
        info!("Saved high scores to {:?}", path);
        Ok(())
    }
}

/// Load high scores on startup.
fn load_high_scores(store: Res<HighScoreStore>, mut high_scores: ResMut<HighScores>) {
    let Some(path) = &store.0 else {
        warn!("Could not determine data directory for high scores");
        return;
    };

    *high_scores = HighScores::load_from(path).unwrap_or_else(|e| {
        warn!("Failed to load high scores: {}", e);
        HighScores::default()
    });
}

/// Record finished games and write the leaderboard back when it changed.
pub(super) fn persist_high_scores(
    mut ended: MessageReader<GameEnded>,
    store: Res<HighScoreStore>,
    mut high_scores: ResMut<HighScores>,
) {
    let mut changed = false;
    for GameEnded { record, .. } in ended.read() {
        if high_scores.add_score(record.clone()) {
            info!("New high score: {}", record.score);
            changed = true;
        }
    }

    if !changed {
        return;
    }
    if let Some(path) = &store.0
        && let Err(e) = high_scores.save_to(path)
    {
        warn!("Failed to save high scores: {}", e);
    }
}
