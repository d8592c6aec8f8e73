use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use redis::{Client, Connection, RedisResult};

use crate::error::{Result, ServiceError};

/// How long a bound captcha answer survives in the Redis backend.
const CAPTCHA_TTL_SECONDS: u64 = 300;

/// Per-client key-value state holding at most one outstanding captcha
/// answer at a time.
///
/// The in-memory backend is the default; a Redis backend can be selected
/// so sessions survive restarts and are shared across replicas. Memory
/// entries carry no TTL, so an abandoned captcha lingers until the same
/// session requests a new one.
pub enum SessionStore {
    Memory(DashMap<String, String>),
    Redis(RedisSessionClient),
}

impl SessionStore {
    pub fn memory() -> Self {
        SessionStore::Memory(DashMap::new())
    }

    pub fn redis(redis_url: &str) -> Result<Self> {
        let client = RedisSessionClient::new(redis_url)?;
        client.connect()?;
        Ok(SessionStore::Redis(client))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            SessionStore::Memory(map) => Ok(map.get(key).map(|entry| entry.value().clone())),
            SessionStore::Redis(client) => client.get(key),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            SessionStore::Memory(map) => {
                map.insert(key.to_string(), value.to_string());
                Ok(())
            }
            SessionStore::Redis(client) => client.set_with_expiry(key, value, CAPTCHA_TTL_SECONDS),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            SessionStore::Memory(map) => {
                map.remove(key);
                Ok(())
            }
            SessionStore::Redis(client) => client.delete(key).map(|_| ()),
        }
    }
}

/// Handle to one caller's session, passed explicitly down the call chain.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<SessionStore>,
}

impl Session {
    pub fn new(id: String, store: Arc<SessionStore>) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn captcha_key(&self) -> String {
        format!("captcha:{}", self.id)
    }

    /// The captcha answer currently bound to this session, if any.
    pub async fn captcha(&self) -> Result<Option<String>> {
        self.store.get(&self.captcha_key()).await
    }

    /// Binds a fresh captcha answer, replacing any outstanding one.
    pub async fn set_captcha(&self, answer: &str) -> Result<()> {
        self.store.set(&self.captcha_key(), answer).await
    }

    pub async fn clear_captcha(&self) -> Result<()> {
        self.store.delete(&self.captcha_key()).await
    }
}

/// Thin synchronous Redis client for session state.
pub struct RedisSessionClient {
    client: Client,
    connection: Mutex<Option<Connection>>,
}

impl RedisSessionClient {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            ServiceError::Internal(format!("failed to create Redis client: {}", e))
        })?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    pub fn connect(&self) -> Result<()> {
        let conn = self
            .client
            .get_connection()
            .map_err(|e| ServiceError::Internal(format!("failed to connect to Redis: {}", e)))?;

        let mut connection_guard = self
            .connection
            .lock()
            .map_err(|_| ServiceError::Internal("failed to acquire connection lock".into()))?;
        *connection_guard = Some(conn);

        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection_guard = self
            .connection
            .lock()
            .map_err(|_| ServiceError::Internal("failed to acquire connection lock".into()))?;

        if let Some(ref mut conn) = *connection_guard {
            let result: RedisResult<Option<String>> = redis::cmd("GET").arg(key).query(conn);
            result.map_err(|e| ServiceError::Internal(format!("GET failed: {}", e)))
        } else {
            Err(ServiceError::Internal("no Redis connection available".into()))
        }
    }

    pub fn set_with_expiry(&self, key: &str, value: &str, expiry_seconds: u64) -> Result<()> {
        let mut connection_guard = self
            .connection
            .lock()
            .map_err(|_| ServiceError::Internal("failed to acquire connection lock".into()))?;

        if let Some(ref mut conn) = *connection_guard {
            let result: RedisResult<String> = redis::cmd("SETEX")
                .arg(key)
                .arg(expiry_seconds)
                .arg(value)
                .query(conn);

            result
                .map(|_| ())
                .map_err(|e| ServiceError::Internal(format!("SETEX failed: {}", e)))
        } else {
            Err(ServiceError::Internal("no Redis connection available".into()))
        }
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut connection_guard = self
            .connection
            .lock()
            .map_err(|_| ServiceError::Internal("failed to acquire connection lock".into()))?;

        if let Some(ref mut conn) = *connection_guard {
            let result: RedisResult<i32> = redis::cmd("DEL").arg(key).query(conn);
            result
                .map(|deleted_count| deleted_count > 0)
                .map_err(|e| ServiceError::Internal(format!("DEL failed: {}", e)))
        } else {
            Err(ServiceError::Internal("no Redis connection available".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session::new(id.to_string(), Arc::new(SessionStore::memory()))
    }

    #[tokio::test]
    async fn test_captcha_round_trip() {
        let session = session("s1");
        assert_eq!(session.captcha().await.unwrap(), None);

        session.set_captcha("aB3x9Z").await.unwrap();
        assert_eq!(session.captcha().await.unwrap().as_deref(), Some("aB3x9Z"));

        session.clear_captcha().await.unwrap();
        assert_eq!(session.captcha().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_new_answer_replaces_outstanding_one() {
        let session = session("s1");
        session.set_captcha("first1").await.unwrap();
        session.set_captcha("second").await.unwrap();
        assert_eq!(session.captcha().await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = Arc::new(SessionStore::memory());
        let a = Session::new("a".into(), Arc::clone(&store));
        let b = Session::new("b".into(), Arc::clone(&store));

        a.set_captcha("onlyA1").await.unwrap();
        assert_eq!(b.captcha().await.unwrap(), None);

        b.clear_captcha().await.unwrap();
        assert_eq!(a.captcha().await.unwrap().as_deref(), Some("onlyA1"));
    }
}
