use crate::session::store::{Result, SessionStore};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

const DEFAULT_PREFIX: &str = "mid-demo:session:";
const SCAN_BATCH: usize = 1000;

/// A Redis session store.
///
/// Keys are namespaced with a prefix so the database can be shared; only
/// keys under that prefix are counted.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Creates a new Redis store from a connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    fn key(&self, session_id: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + session_id.len());
        key.extend_from_slice(self.prefix.as_bytes());
        key.extend_from_slice(session_id);
        key
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn save(&self, session_id: &[u8], data: &[u8], ttl: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.key(session_id);
        match ttl {
            // SETEX rejects a zero ttl
            Some(ttl) => {
                let _: () = conn.set_ex(key, data, ttl.max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, data).await?;
            }
        }
        Ok(())
    }

    async fn load(&self, session_id: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result = conn.get(self.key(session_id)).await?;
        Ok(result)
    }

    async fn exists(&self, session_id: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists = conn.exists(self.key(session_id)).await?;
        Ok(exists)
    }

    async fn delete(&self, session_id: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(session_id)).await?;
        Ok(())
    }

    async fn take(&self, session_id: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result = conn.get_del(self.key(session_id)).await?;
        Ok(result)
    }

    async fn count(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let pattern = key_pattern(&self.prefix);
        let mut cursor: u64 = 0;
        let mut count = 0;
        loop {
            let (next, keys): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            count += keys.len();
            if next == 0 {
                return Ok(count);
            }
            cursor = next;
        }
    }
}

/// SCAN pattern matching every key under `prefix`.
fn key_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
