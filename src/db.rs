use std::future::Future;
use std::time::Duration;

use async_std::task;
use async_trait::async_trait;
use log::*;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Connection, PgConnection};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database unreachable after {attempts} attempts")]
    Unreachable { attempts: u32, source: sqlx::Error },
}

/**
 * Bounded retry with a fixed delay between attempts
 */
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /**
     * A policy that never sleeps between attempts
     */
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::from_millis(0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(3))
    }
}

/**
 * The failure returned once a retry budget has been spent
 */
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/**
 * Drive `op` until it succeeds or the policy's budget runs out
 */
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("Connection attempt {} of {}", attempt, policy.max_attempts);

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!("Attempt {} failed: {}", attempt, err);

                if attempt >= policy.max_attempts {
                    return Err(Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                task::sleep(policy.delay).await;
            }
        }
    }
}

/**
 * Hands out store connections to request handlers
 *
 * The default implementation opens a fresh connection per call; a pooled
 * provider can be slotted in here without touching any handler.
 */
#[async_trait]
pub trait ConnectionProvider: Send + Sync + 'static {
    async fn acquire(&self) -> Result<PgConnection, DbError>;
}

/**
 * Opens direct PostgreSQL connections, retrying per the configured policy
 */
pub struct PgConnector {
    options: PgConnectOptions,
    retry: RetryPolicy,
}

impl PgConnector {
    pub fn new(config: &Config, retry: RetryPolicy) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.db_host)
            .database(&config.db_name)
            .username(&config.db_user)
            .password(&config.db_password)
            .ssl_mode(PgSslMode::Require);

        Self { options, retry }
    }
}

#[async_trait]
impl ConnectionProvider for PgConnector {
    async fn acquire(&self) -> Result<PgConnection, DbError> {
        match with_retry(&self.retry, || PgConnection::connect_with(&self.options)).await {
            Ok(conn) => {
                info!("Database connection successful");
                Ok(conn)
            }
            Err(exhausted) => {
                error!(
                    "Could not connect to database after {} attempts",
                    exhausted.attempts
                );
                Err(DbError::Unreachable {
                    attempts: exhausted.attempts,
                    source: exhausted.last,
                })
            }
        }
    }
}

/**
 * Create the votes table if it does not exist yet
 *
 * Safe to run on every startup.
 */
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("CREATE TABLE IF NOT EXISTS votes (id SERIAL PRIMARY KEY, choice TEXT NOT NULL)")
        .execute(conn)
        .await?;
    Ok(())
}
