use std::cmp::Reverse;

use cogbot_cache::{NamespacedCache, Result as CacheResult};
use eyre::Result;
use futures::TryStreamExt;

use crate::core::Context;

use super::Cog;

/// Points per user, surviving restarts when backed by redis.
pub struct TriviaScores {
    scores: NamespacedCache<i64>,
}

impl Cog for TriviaScores {
    const NAME: &'static str = "trivia";

    fn load(ctx: &Context) -> Result<Self> {
        Ok(Self {
            scores: ctx.cache("trivia_scores")?,
        })
    }
}

impl TriviaScores {
    /// Returns the user's new total.
    pub async fn award(&self, user: &str, points: i64) -> CacheResult<i64> {
        self.scores.increment(user, points).await
    }

    pub async fn score(&self, user: &str) -> CacheResult<i64> {
        self.scores.get_or(user, 0).await
    }

    pub async fn players(&self) -> CacheResult<usize> {
        self.scores.length().await
    }

    /// Returns how many users had a score.
    pub async fn reset(&self) -> CacheResult<usize> {
        self.scores.clear().await
    }

    /// Highest scores first, ties ordered by name.
    pub async fn leaderboard(&self, amount: usize) -> CacheResult<Vec<(String, i64)>> {
        let mut entries: Vec<_> = self.scores.items().try_collect().await?;
        entries.sort_unstable_by(|(a_name, a), (b_name, b)| {
            (Reverse(a), a_name).cmp(&(Reverse(b), b_name))
        });
        entries.truncate(amount);

        Ok(entries)
    }
}
