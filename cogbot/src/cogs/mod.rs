use eyre::{Result, WrapErr};

pub use self::{cooldowns::Cooldowns, trivia::TriviaScores};

use crate::core::Context;

mod cooldowns;
mod trivia;

/// Independently loadable feature module.
pub trait Cog: Sized {
    const NAME: &'static str;

    /// Create all caches the cog needs. Called once at startup.
    fn load(ctx: &Context) -> Result<Self>;
}

pub struct Cogs {
    pub trivia: TriviaScores,
    pub cooldowns: Cooldowns,
}

impl Cogs {
    pub fn load(ctx: &Context) -> Result<Self> {
        Ok(Self {
            trivia: load(ctx)?,
            cooldowns: load(ctx)?,
        })
    }
}

fn load<C: Cog>(ctx: &Context) -> Result<C> {
    let cog = C::load(ctx).wrap_err_with(|| format!("failed to load cog `{}`", C::NAME))?;
    debug!(cog = C::NAME, "Loaded cog");

    Ok(cog)
}
