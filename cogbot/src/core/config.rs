use std::{env, time::Duration};

use cogbot_cache::{RedisConfig, StoreConfig};
use eyre::Result;
use once_cell::sync::OnceCell;

static CONFIG: OnceCell<BotConfig> = OnceCell::new();

// No Debug derive; the redis url may contain credentials
pub struct BotConfig {
    pub cache: StoreConfig,
}

impl BotConfig {
    pub fn get() -> &'static Self {
        CONFIG
            .get()
            .expect("`BotConfig::init` must be called first")
    }

    pub fn init() -> Result<()> {
        let config = BotConfig {
            cache: Self::store_config()?,
        };

        if CONFIG.set(config).is_err() {
            warn!("CONFIG was already set");
        }

        Ok(())
    }

    fn store_config() -> Result<StoreConfig> {
        let kind = env_var_opt::<CacheBackend>("CACHE_BACKEND")?.unwrap_or_default();

        let config = match kind {
            CacheBackend::Memory => StoreConfig::InMemory,
            CacheBackend::Redis => {
                let mut redis = RedisConfig::new(env_var::<Box<str>>("REDIS_URL")?);

                if let Some(pool_size) = env_var_opt("REDIS_POOL_SIZE")? {
                    redis.pool_size = pool_size;
                }

                if let Some(timeout) = env_var_opt("REDIS_CONNECT_TIMEOUT")? {
                    redis.connect_timeout = timeout;
                }

                StoreConfig::Redis(redis)
            }
        };

        Ok(config)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum CacheBackend {
    Memory,
    #[default]
    Redis,
}

trait EnvKind: Sized {
    const EXPECTED: &'static str;

    fn from_str(s: String) -> Result<Self, String>;
}

macro_rules! env_kind {
    ($($ty:ty: |$arg:ident| $impl:block,)*) => {
        $(
            impl EnvKind for $ty {
                const EXPECTED: &'static str = stringify!($ty);

                fn from_str($arg: String) -> Result<Self, String> {
                    $impl
                }
            }
        )*
    };
}

env_kind! {
    Box<str>: |s| { Ok(s.into_boxed_str()) },
    u32: |s| { s.parse().map_err(|_| s) },
}

impl EnvKind for Duration {
    const EXPECTED: &'static str = "a whole amount of seconds";

    fn from_str(s: String) -> Result<Self, String> {
        s.parse().map(Duration::from_secs).map_err(|_| s)
    }
}

impl EnvKind for CacheBackend {
    const EXPECTED: &'static str = "`redis` or `memory`";

    fn from_str(s: String) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(s),
        }
    }
}

fn env_var<T: EnvKind>(name: &str) -> Result<T> {
    env_var_opt(name)?.ok_or_else(|| eyre!("missing env variable `{name}`"))
}

fn env_var_opt<T: EnvKind>(name: &str) -> Result<Option<T>> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };

    T::from_str(value).map(Some).map_err(|value| {
        eyre!(
            "failed to parse env variable `{name}={value}`; expected {expected}",
            expected = T::EXPECTED
        )
    })
}

#[cfg(test)]
mod tests {
    use std::{env, time::Duration};

    use super::*;

    #[test]
    fn parse_cache_backend() {
        assert_eq!(
            CacheBackend::from_str("Redis".to_owned()),
            Ok(CacheBackend::Redis)
        );
        assert_eq!(
            CacheBackend::from_str("memory".to_owned()),
            Ok(CacheBackend::Memory)
        );
        assert_eq!(
            CacheBackend::from_str("sqlite".to_owned()),
            Err("sqlite".to_owned())
        );
    }

    #[test]
    fn parse_timeout_seconds() {
        assert_eq!(
            <Duration as EnvKind>::from_str("3".to_owned()),
            Ok(Duration::from_secs(3))
        );
        assert!(<Duration as EnvKind>::from_str("3s".to_owned()).is_err());
    }

    #[test]
    fn missing_and_malformed_vars() {
        env::set_var("COGBOT_TEST_POOL_SIZE", "many");

        let err = env_var::<u32>("COGBOT_TEST_POOL_SIZE").unwrap_err();
        assert!(err.to_string().contains("COGBOT_TEST_POOL_SIZE=many"), "{err}");

        let err = env_var::<u32>("COGBOT_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");

        assert!(matches!(env_var_opt::<u32>("COGBOT_TEST_UNSET_VARIABLE"), Ok(None)));
    }
}
