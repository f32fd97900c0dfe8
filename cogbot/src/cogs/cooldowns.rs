use cogbot_cache::{NamespacedCache, Result as CacheResult};
use eyre::Result;

use crate::core::Context;

use super::Cog;

/// Last time each user used a rate-limited command, in unix seconds.
pub struct Cooldowns {
    last_used: NamespacedCache<f64>,
}

impl Cog for Cooldowns {
    const NAME: &'static str = "cooldowns";

    fn load(ctx: &Context) -> Result<Self> {
        Ok(Self {
            last_used: ctx.cache("cooldowns")?,
        })
    }
}

impl Cooldowns {
    /// Seconds until the user may act again, if they are still on cooldown.
    pub async fn remaining(&self, user: &str, now: f64, period: f64) -> CacheResult<Option<f64>> {
        let last = self.last_used.get(user).await?;

        Ok(remaining(last, now, period))
    }

    /// Record a use at `now` unless the user is still on cooldown.
    ///
    /// Returns whether the use was recorded. Of several concurrent calls for
    /// the same user, only one succeeds.
    pub async fn try_acquire(&self, user: &str, now: f64, period: f64) -> CacheResult<bool> {
        loop {
            let last = self.last_used.get(user).await?;

            if let Some(remaining) = remaining(last, now, period) {
                trace!(user, remaining, "User is on cooldown");

                return Ok(false);
            }

            if self.last_used.compare_and_swap(user, last, now).await? {
                return Ok(true);
            }
        }
    }

    /// Returns whether the user had been on cooldown.
    pub async fn release(&self, user: &str) -> CacheResult<bool> {
        self.last_used.delete(user).await
    }
}

fn remaining(last: Option<f64>, now: f64, period: f64) -> Option<f64> {
    last.map(|last| last + period - now)
        .filter(|&remaining| remaining > 0.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eyre::Result;

    use crate::cogs::{tests::context, Cog, Cooldowns};

    #[tokio::test]
    async fn cooldown_expires() -> Result<()> {
        let ctx = context();
        let cooldowns = Cooldowns::load(&ctx)?;

        assert!(cooldowns.try_acquire("alice", 100.0, 30.0).await?);
        assert!(!cooldowns.try_acquire("alice", 110.0, 30.0).await?);
        assert_eq!(cooldowns.remaining("alice", 110.0, 30.0).await?, Some(20.0));
        assert!(cooldowns.try_acquire("bob", 110.0, 30.0).await?);

        assert!(cooldowns.try_acquire("alice", 130.0, 30.0).await?);
        assert_eq!(cooldowns.remaining("alice", 131.5, 30.0).await?, Some(28.5));

        Ok(())
    }

    #[tokio::test]
    async fn release_clears_cooldown() -> Result<()> {
        let ctx = context();
        let cooldowns = Cooldowns::load(&ctx)?;

        assert!(cooldowns.try_acquire("alice", 0.0, 60.0).await?);
        assert!(cooldowns.release("alice").await?);
        assert!(!cooldowns.release("alice").await?);
        assert!(cooldowns.try_acquire("alice", 1.0, 60.0).await?);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquire_succeeds_once() -> Result<()> {
        let ctx = context();
        let cooldowns = Arc::new(Cooldowns::load(&ctx)?);

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cooldowns = Arc::clone(&cooldowns);

                tokio::spawn(async move { cooldowns.try_acquire("alice", 100.0, 30.0).await })
            })
            .collect();

        let mut acquired = 0;

        for task in tasks {
            if task.await?? {
                acquired += 1;
            }
        }

        assert_eq!(acquired, 1);

        Ok(())
    }

    #[tokio::test]
    async fn stale_read_does_not_acquire() -> Result<()> {
        let ctx = context();
        let cooldowns = Cooldowns::load(&ctx)?;

        assert!(cooldowns.try_acquire("alice", 100.0, 30.0).await?);

        // Another task acquired right after this one saw no cooldown
        assert!(!cooldowns.last_used.compare_and_swap("alice", None, 101.0).await?);
        assert_eq!(cooldowns.remaining("alice", 101.0, 30.0).await?, Some(29.0));

        Ok(())
    }
}
