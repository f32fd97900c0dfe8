use std::{
    collections::HashSet,
    mem,
    sync::atomic::{AtomicU8, Ordering},
};

use async_trait::async_trait;
use bb8_redis::{
    bb8::{Pool, RunError},
    redis::{
        self, aio::Connection, Cmd, ConnectionInfo, FromRedisValue, IntoConnectionInfo, Pipeline,
        RedisError, RedisResult, Script, ScriptInvocation,
    },
    RedisConnectionManager,
};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::{
    codec,
    error::{CacheError, Result},
    key::{CacheKey, Namespace},
    value::{Number, Value, ValueKind},
};

use super::{Backend, RedisConfig};

type RedisPool = Pool<RedisConnectionManager>;

/// Adds to a tagged float, treating a missing key as zero.
///
/// Fails with `WRONGKIND <record>` if the key holds anything but a float.
static INCREMENT_FLOAT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local current = redis.call('GET', KEYS[1])
local value = 0

if current then
    if string.sub(current, 1, 2) ~= 'f|' then
        return redis.error_reply('WRONGKIND ' .. current)
    end

    value = tonumber(string.sub(current, 3))

    if value == nil then
        return redis.error_reply('WRONGKIND ' .. current)
    end
end

local updated = 'f|' .. string.format('%.17g', value + tonumber(ARGV[1]))
redis.call('SET', KEYS[1], updated)

return updated
",
    )
});

/// Deletes every key matching the pattern in a single script execution so
/// that no other client observes a partially cleared namespace.
static CLEAR_NAMESPACE: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local cursor = '0'
local removed = 0

repeat
    local page = redis.call('SCAN', cursor, 'MATCH', ARGV[1], 'COUNT', 1000)
    cursor = page[1]

    if #page[2] > 0 then
        removed = removed + redis.call('DEL', unpack(page[2]))
    end
until cursor == '0'

return removed
",
    )
});

/// Deletes the key only if it still holds the record the caller decoded.
static DELETE_IF_UNCHANGED: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end

return 0
",
    )
});

/// Stores `ARGV[3]` only if the key still holds `ARGV[2]`, or is still
/// absent if `ARGV[1]` is `0`.
static SET_IF_UNCHANGED: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local current = redis.call('GET', KEYS[1])

if ARGV[1] == '1' then
    if current ~= ARGV[2] then
        return 0
    end
elseif current then
    return 0
end

redis.call('SET', KEYS[1], ARGV[3])

return 1
",
    )
});

/// Subtracts `i64::MIN` by adding `ARGV[1]` (`i64::MAX`) and then one.
///
/// `DECRBY` refuses that amount even if the result would fit. The key is
/// restored if the second step overflows.
static DECREMENT_BY_MIN: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local existed = redis.call('EXISTS', KEYS[1])

local first = redis.pcall('INCRBY', KEYS[1], ARGV[1])

if type(first) == 'table' and first.err then
    return first
end

local second = redis.pcall('INCRBY', KEYS[1], 1)

if type(second) == 'table' and second.err then
    if existed == 1 then
        redis.call('DECRBY', KEYS[1], ARGV[1])
    else
        redis.call('DEL', KEYS[1])
    end

    return second
end

return redis.call('GET', KEYS[1])
",
    )
});

const SCAN_COUNT: usize = 250;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// The last attempt failed due to connectivity.
    Degraded = 3,
}

impl ConnectionState {
    fn from_u8(state: u8) -> Self {
        match state {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Degraded,
            _ => Self::Disconnected,
        }
    }
}

enum PoolSlot {
    Unbuilt,
    Ready(RedisPool),
    Closed,
}

/// Whether a request may be sent again after the connection broke while it
/// was in flight.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Resend {
    Allowed,
    /// The request might have been applied already.
    Forbidden,
}

enum Request<'r> {
    Cmd(&'r Cmd),
    Pipeline(&'r Pipeline),
    Script(&'r ScriptInvocation<'r>),
}

impl Request<'_> {
    async fn send<T: FromRedisValue>(&self, conn: &mut Connection) -> RedisResult<T> {
        match self {
            Self::Cmd(cmd) => cmd.query_async(conn).await,
            Self::Pipeline(pipe) => pipe.query_async(conn).await,
            Self::Script(invocation) => invocation.invoke_async(conn).await,
        }
    }
}

/// Backend storing values in redis.
///
/// The connection pool is created on the first operation and shared by every
/// namespace using this backend. A failed operation is attempted once more
/// on a fresh connection before [`CacheError::BackendUnavailable`] is
/// returned.
pub struct RedisBackend {
    info: ConnectionInfo,
    config: RedisConfig,
    pool: Mutex<PoolSlot>,
    state: AtomicU8,
}

impl RedisBackend {
    /// Validates the url but does not connect yet.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let info = (&*config.url)
            .into_connection_info()
            .map_err(|err| CacheError::unavailable("invalid redis url", Some(err)))?;

        Ok(Self {
            info,
            config,
            pool: Mutex::new(PoolSlot::Unbuilt),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, state: ConnectionState) {
        let prev = ConnectionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));

        match (prev, state) {
            (prev, curr) if prev == curr => {}
            (ConnectionState::Degraded, ConnectionState::Connected) => {
                info!("Connection to redis recovered")
            }
            (_, ConnectionState::Degraded) => warn!("Connection to redis degraded"),
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                debug!("Connected to redis")
            }
            (prev, curr) => trace!(?prev, ?curr, "Redis connection state changed"),
        }
    }

    fn pool(&self) -> Result<RedisPool> {
        let mut slot = self.pool.lock();

        match &*slot {
            PoolSlot::Ready(pool) => return Ok(pool.clone()),
            PoolSlot::Closed => {
                return Err(CacheError::unavailable("backend has been torn down", None))
            }
            PoolSlot::Unbuilt => {}
        }

        let manager = RedisConnectionManager::new(self.info.clone())
            .map_err(|err| CacheError::unavailable("invalid redis url", Some(err)))?;

        // Does not connect yet; the first `get` will
        let pool = Pool::builder()
            .max_size(self.config.pool_size)
            .connection_timeout(self.config.connect_timeout)
            .build_unchecked(manager);

        debug!(
            max_size = self.config.pool_size,
            timeout = ?self.config.connect_timeout,
            "Created redis pool"
        );

        *slot = PoolSlot::Ready(pool.clone());

        Ok(pool)
    }

    /// Send a request, reconnecting at most once.
    async fn execute<T>(&self, request: Request<'_>, resend: Resend) -> Result<T>
    where
        T: FromRedisValue,
    {
        let mut retried = false;

        loop {
            let pool = self.pool()?;

            if self.state() == ConnectionState::Disconnected {
                self.transition(ConnectionState::Connecting);
            }

            let mut conn = match pool.get().await {
                Ok(conn) => conn,
                Err(err) => {
                    self.transition(ConnectionState::Degraded);

                    let source = match err {
                        RunError::User(err) => Some(err),
                        RunError::TimedOut => None,
                    };

                    if !mem::replace(&mut retried, true) {
                        warn!(err = ?source, "Failed to acquire redis connection, retrying once");

                        continue;
                    }

                    return Err(CacheError::unavailable("failed to connect to redis", source));
                }
            };

            self.transition(ConnectionState::Connected);

            match request.send(&mut conn).await {
                Ok(value) => return Ok(value),
                Err(err) if is_connection_error(&err) => {
                    self.transition(ConnectionState::Degraded);

                    if resend == Resend::Allowed && !mem::replace(&mut retried, true) {
                        warn!(?err, "Lost redis connection during request, retrying once");

                        continue;
                    }

                    return Err(CacheError::unavailable("lost connection to redis", Some(err)));
                }
                Err(err) => return Err(CacheError::Store(err)),
            }
        }
    }

    /// Determine what a key holds, only used to enrich mismatch errors.
    async fn kind_of(&self, key: &CacheKey) -> Option<ValueKind> {
        let cmd = redis::cmd("GET").arg(key).to_owned();
        let record: Option<String> = self.execute(Request::Cmd(&cmd), Resend::Allowed).await.ok()?;

        record
            .as_deref()
            .and_then(codec::decode_any)
            .map(|value| value.kind())
    }

    async fn scan_page(&self, cursor: u64, pattern: &str) -> Result<(u64, Vec<String>)> {
        let cmd = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .to_owned();

        self.execute(Request::Cmd(&cmd), Resend::Allowed).await
    }

    async fn items_page(
        &self,
        namespace: &Namespace,
        kind: ValueKind,
        keys: Vec<String>,
    ) -> Result<Vec<(String, Value)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let cmd = redis::cmd("MGET").arg(&keys).to_owned();
        let records = self.execute(Request::Cmd(&cmd), Resend::Allowed).await?;

        decode_page(namespace, kind, keys, records)
    }

    /// Add or subtract `amount`; a rejection by the store is mapped onto the
    /// matching cache error.
    async fn add(&self, key: &CacheKey, amount: Number, subtract: bool) -> Result<Number> {
        let res = match amount {
            Number::Int(i64::MIN) if subtract => {
                let mut invocation = DECREMENT_BY_MIN.prepare_invoke();
                invocation.key(key).arg(i64::MAX);

                self.execute::<String>(Request::Script(&invocation), Resend::Forbidden)
                    .await
                    .and_then(|record| decode_number(key, &record, ValueKind::Int))
            }
            Number::Int(amount) => {
                let name = if subtract { "DECRBY" } else { "INCRBY" };
                let cmd = redis::cmd(name).arg(key).arg(amount).to_owned();

                self.execute(Request::Cmd(&cmd), Resend::Forbidden)
                    .await
                    .map(Number::Int)
            }
            Number::Float(amount) => {
                let amount = if subtract { -amount } else { amount };

                let mut invocation = INCREMENT_FLOAT.prepare_invoke();
                invocation.key(key).arg(amount.to_string());

                self.execute::<String>(Request::Script(&invocation), Resend::Forbidden)
                    .await
                    .and_then(|record| decode_number(key, &record, ValueKind::Float))
            }
        };

        match res {
            Err(CacheError::Store(err)) => Err(self.rejected(key, amount.kind(), err).await),
            res => res,
        }
    }

    /// Turn an error reply caused by the stored value into a cache error.
    async fn rejected(&self, key: &CacheKey, expected: ValueKind, err: RedisError) -> CacheError {
        match Rejection::of(&err) {
            Some(Rejection::WrongKind(found)) => CacheError::TypeMismatch {
                key: Box::from(key.key()),
                expected,
                found,
            },
            Some(Rejection::Overflow) => CacheError::Overflow {
                key: Box::from(key.key()),
            },
            Some(Rejection::NotAnInteger) => CacheError::TypeMismatch {
                key: Box::from(key.key()),
                expected,
                found: self.kind_of(key).await,
            },
            None => CacheError::Store(err),
        }
    }
}

/// Error replies that stem from the stored value rather than the store.
#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    /// Raised by the scripts; carries the kind of the offending record.
    WrongKind(Option<ValueKind>),
    Overflow,
    /// Raised by `INCRBY`/`DECRBY` on anything but an integer.
    NotAnInteger,
}

impl Rejection {
    fn of(err: &RedisError) -> Option<Self> {
        if err.code() == Some("WRONGKIND") {
            let found = err.detail().and_then(codec::decode_any).map(|v| v.kind());

            return Some(Self::WrongKind(found));
        }

        let detail = err.detail()?;

        if detail.contains("overflow") {
            Some(Self::Overflow)
        } else if detail.contains("not an integer") {
            Some(Self::NotAnInteger)
        } else {
            None
        }
    }
}

/// Pair up `MGET` records with their keys. Keys deleted since the scan have
/// no record and are skipped.
fn decode_page(
    namespace: &Namespace,
    kind: ValueKind,
    keys: Vec<String>,
    records: Vec<Option<String>>,
) -> Result<Vec<(String, Value)>> {
    keys.into_iter()
        .zip(records)
        .filter_map(|(full, record)| Some((full, record?)))
        .filter_map(|(full, record)| {
            let key = namespace.strip(&full)?.to_owned();

            let res = codec::decode(&record, kind)
                .map(|value| (key.clone(), value))
                .map_err(|mismatch| mismatch.with_key(&key));

            Some(res)
        })
        .collect()
}

fn decode_number(key: &CacheKey, record: &str, kind: ValueKind) -> Result<Number> {
    match codec::decode(record, kind) {
        Ok(Value::Int(n)) => Ok(Number::Int(n)),
        Ok(Value::Float(n)) => Ok(Number::Float(n)),
        Ok(value) => Err(CacheError::TypeMismatch {
            key: Box::from(key.key()),
            expected: kind,
            found: Some(value.kind()),
        }),
        Err(mismatch) => Err(mismatch.with_key(key.key())),
    }
}

fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

fn decode_record(key: &CacheKey, record: Option<&str>, kind: ValueKind) -> Result<Option<Value>> {
    match record {
        Some(record) => codec::decode(record, kind)
            .map(Some)
            .map_err(|mismatch| mismatch.with_key(key.key())),
        None => Ok(None),
    }
}

#[async_trait]
impl Backend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &CacheKey, kind: ValueKind) -> Result<Option<Value>> {
        let cmd = redis::cmd("GET").arg(key).to_owned();
        let record: Option<String> = self.execute(Request::Cmd(&cmd), Resend::Allowed).await?;

        decode_record(key, record.as_deref(), kind)
    }

    async fn set(&self, key: &CacheKey, value: &Value) -> Result<()> {
        let cmd = redis::cmd("SET").arg(key).arg(codec::encode(value)).to_owned();

        self.execute(Request::Cmd(&cmd), Resend::Allowed).await
    }

    async fn set_many(&self, _: &Namespace, entries: &[(CacheKey, Value)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();

        for (key, value) in entries {
            pipe.set(key, codec::encode(value)).ignore();
        }

        self.execute(Request::Pipeline(&pipe), Resend::Allowed).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let cmd = redis::cmd("DEL").arg(key).to_owned();
        let removed: usize = self.execute(Request::Cmd(&cmd), Resend::Allowed).await?;

        Ok(removed > 0)
    }

    async fn pop(&self, key: &CacheKey, kind: ValueKind) -> Result<Option<Value>> {
        loop {
            let cmd = redis::cmd("GET").arg(key).to_owned();
            let record: Option<String> = self.execute(Request::Cmd(&cmd), Resend::Allowed).await?;

            let Some(record) = record else {
                return Ok(None);
            };

            // Checked before deleting so that a mismatch keeps the record
            let value = codec::decode(&record, kind)
                .map_err(|mismatch| mismatch.with_key(key.key()))?;

            let mut invocation = DELETE_IF_UNCHANGED.prepare_invoke();
            invocation.key(key).arg(&record);

            // A lost reply would mean the value is gone for good, so don't resend
            let removed: bool = self
                .execute(Request::Script(&invocation), Resend::Forbidden)
                .await?;

            if removed {
                return Ok(Some(value));
            }

            trace!(%key, "Record changed before it could be popped");
        }
    }

    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        let cmd = redis::cmd("EXISTS").arg(key).to_owned();
        let count: usize = self.execute(Request::Cmd(&cmd), Resend::Allowed).await?;

        Ok(count > 0)
    }

    async fn increment(&self, key: &CacheKey, amount: Number) -> Result<Number> {
        self.add(key, amount, false).await
    }

    async fn decrement(&self, key: &CacheKey, amount: Number) -> Result<Number> {
        self.add(key, amount, true).await
    }

    async fn compare_and_swap(
        &self,
        key: &CacheKey,
        current: Option<&Value>,
        new: &Value,
    ) -> Result<bool> {
        let replacement = codec::encode(new);

        loop {
            let cmd = redis::cmd("GET").arg(key).to_owned();
            let record: Option<String> = self.execute(Request::Cmd(&cmd), Resend::Allowed).await?;
            let stored = decode_record(key, record.as_deref(), new.kind())?;

            let unchanged = match (&stored, current) {
                (None, None) => true,
                (Some(stored), Some(current)) => stored.same_as(current),
                _ => false,
            };

            if !unchanged {
                return Ok(false);
            }

            let mut invocation = SET_IF_UNCHANGED.prepare_invoke();
            invocation.key(key);

            match &record {
                Some(record) => invocation.arg(1).arg(record),
                None => invocation.arg(0).arg(""),
            };

            invocation.arg(&replacement);

            let swapped: bool = self
                .execute(Request::Script(&invocation), Resend::Forbidden)
                .await?;

            if swapped {
                return Ok(true);
            }

            trace!(%key, "Record changed before it could be swapped");
        }
    }

    fn items<'a>(
        &'a self,
        namespace: &'a Namespace,
        kind: ValueKind,
    ) -> BoxStream<'a, Result<(String, Value)>> {
        struct ScanState {
            cursor: Option<u64>,
            seen: HashSet<String>,
        }

        let pattern = namespace.scan_pattern();

        let init = ScanState {
            cursor: Some(0),
            seen: HashSet::new(),
        };

        stream::try_unfold(init, move |mut state| {
            let pattern = pattern.clone();

            async move {
                let Some(cursor) = state.cursor else {
                    return Ok::<_, CacheError>(None);
                };

                let (next, keys) = self.scan_page(cursor, &pattern).await?;

                // SCAN may return a key more than once
                let keys: Vec<_> = keys
                    .into_iter()
                    .filter(|key| state.seen.insert(key.clone()))
                    .collect();

                let page = self.items_page(namespace, kind, keys).await?;
                state.cursor = (next != 0).then_some(next);

                Ok(Some((page, state)))
            }
        })
        .map_ok(|page| stream::iter(page).map(Ok))
        .try_flatten()
        .boxed()
    }

    async fn length(&self, namespace: &Namespace) -> Result<usize> {
        let pattern = namespace.scan_pattern();
        let mut seen = HashSet::new();
        let mut cursor = 0;

        loop {
            let (next, keys) = self.scan_page(cursor, &pattern).await?;
            seen.extend(keys);

            if next == 0 {
                return Ok(seen.len());
            }

            cursor = next;
        }
    }

    async fn clear(&self, namespace: &Namespace) -> Result<usize> {
        let mut invocation = CLEAR_NAMESPACE.prepare_invoke();
        invocation.arg(namespace.scan_pattern());

        self.execute(Request::Script(&invocation), Resend::Allowed).await
    }

    async fn disconnect(&self) -> Result<()> {
        let prev = mem::replace(&mut *self.pool.lock(), PoolSlot::Closed);

        if let PoolSlot::Ready(pool) = prev {
            let state = pool.state();
            debug!(
                connections = state.connections,
                idle = state.idle_connections,
                "Closing redis pool"
            );
        }

        self.transition(ConnectionState::Disconnected);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eyre::Result;

    use super::*;

    fn unreachable() -> RedisBackend {
        let config = RedisConfig {
            // Nothing listens on port 1
            url: Box::from("redis://127.0.0.1:1/"),
            pool_size: 1,
            connect_timeout: Duration::from_millis(250),
        };

        RedisBackend::new(config).unwrap()
    }

    #[test]
    fn invalid_url() {
        let err = RedisBackend::new(RedisConfig::new("definitely not a url"))
            .err()
            .unwrap();

        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn unreachable_store_is_unavailable() -> Result<()> {
        let backend = unreachable();
        let key = Namespace::new("scores")?.key("alice");

        assert_eq!(backend.state(), ConnectionState::Disconnected);

        let err = backend.set(&key, &Value::Int(1)).await.unwrap_err();
        assert!(err.is_unavailable(), "{err:?}");
        assert_eq!(backend.state(), ConnectionState::Degraded);

        let err = backend.increment(&key, Number::Int(1)).await.unwrap_err();
        assert!(err.is_unavailable(), "{err:?}");

        Ok(())
    }

    #[tokio::test]
    async fn closed_backend_is_unavailable() -> Result<()> {
        let backend = unreachable();
        let key = Namespace::new("scores")?.key("alice");

        backend.disconnect().await?;
        backend.disconnect().await?;

        let err = backend.get(&key, ValueKind::Int).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(backend.state(), ConnectionState::Disconnected);

        Ok(())
    }

    fn error_reply(reply: &str) -> RedisError {
        redis::parse_redis_value(reply.as_bytes()).unwrap_err()
    }

    #[test]
    fn wrong_kind_carries_the_record() {
        let err = error_reply("-WRONGKIND s|two words\r\n");
        assert_eq!(
            Rejection::of(&err),
            Some(Rejection::WrongKind(Some(ValueKind::Str)))
        );

        let err = error_reply("-WRONGKIND b|true\r\n");
        assert_eq!(
            Rejection::of(&err),
            Some(Rejection::WrongKind(Some(ValueKind::Bool)))
        );

        let err = error_reply("-WRONGKIND 007\r\n");
        assert_eq!(Rejection::of(&err), Some(Rejection::WrongKind(None)));
    }

    #[test]
    fn integer_command_rejections() {
        let err = error_reply("-ERR increment or decrement would overflow\r\n");
        assert_eq!(Rejection::of(&err), Some(Rejection::Overflow));

        let err = error_reply("-ERR value is not an integer or out of range\r\n");
        assert_eq!(Rejection::of(&err), Some(Rejection::NotAnInteger));

        let err = error_reply("-ERR unknown command 'GETDEL'\r\n");
        assert_eq!(Rejection::of(&err), None);

        let err = error_reply("-NOSCRIPT No matching script\r\n");
        assert_eq!(Rejection::of(&err), None);
    }

    #[tokio::test]
    async fn unrelated_rejection_stays_a_store_error() {
        let backend = unreachable();
        let key = Namespace::new("scores").unwrap().key("alice");
        let err = error_reply("-ERR unknown command 'DECRBY'\r\n");

        let err = backend.rejected(&key, ValueKind::Int, err).await;
        assert!(matches!(err, CacheError::Store(_)), "{err:?}");

        let err = error_reply("-WRONGKIND f|1.5\r\n");

        match backend.rejected(&key, ValueKind::Int, err).await {
            CacheError::TypeMismatch {
                key,
                expected,
                found,
            } => {
                assert_eq!(&*key, "alice");
                assert_eq!(expected, ValueKind::Int);
                assert_eq!(found, Some(ValueKind::Float));
            }
            err => panic!("expected type mismatch, got {err:?}"),
        }
    }

    #[test]
    fn page_skips_vanished_keys() -> Result<()> {
        let namespace = Namespace::new("scores")?;
        let keys = vec![
            "scores:alice".to_owned(),
            "scores:bob".to_owned(),
            "scores:carol".to_owned(),
        ];
        let records = vec![Some("5".to_owned()), None, Some("-2".to_owned())];

        let page = decode_page(&namespace, ValueKind::Int, keys, records)?;

        assert_eq!(
            page,
            [
                ("alice".to_owned(), Value::Int(5)),
                ("carol".to_owned(), Value::Int(-2)),
            ]
        );

        Ok(())
    }

    #[test]
    fn page_reports_mismatch_with_short_key() -> Result<()> {
        let namespace = Namespace::new("scores")?;
        let keys = vec!["scores:alice".to_owned(), "scores:bob".to_owned()];
        let records = vec![Some("5".to_owned()), Some("s|five".to_owned())];

        match decode_page(&namespace, ValueKind::Int, keys, records) {
            Err(CacheError::TypeMismatch { key, found, .. }) => {
                assert_eq!(&*key, "bob");
                assert_eq!(found, Some(ValueKind::Str));
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn script_results_decode_into_numbers() -> Result<()> {
        let key = Namespace::new("scores")?.key("alice");

        assert_eq!(
            decode_number(&key, "9223372036854775807", ValueKind::Int)?,
            Number::Int(i64::MAX)
        );
        assert_eq!(
            decode_number(&key, "f|7.5e-05", ValueKind::Float)?,
            Number::Float(7.5e-5)
        );
        assert!(decode_number(&key, "f|0.5", ValueKind::Int)
            .unwrap_err()
            .is_type_mismatch());

        Ok(())
    }
}
