use crate::{
    config::SimulatorConfig,
    error::Result,
    record::Record,
    source::{Source, SourceError},
};
use core::time::Duration;
use portable_atomic::{AtomicU64, Ordering};
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Budget of a single [`SimulatedDatabase::health_check`] probe.
const HEALTH_CHECK_BUDGET: Duration = Duration::from_secs(2);

/// Query counters of a [`SimulatedDatabase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub queries: u64,
    /// Failed, timed out, and cancelled queries.
    pub errors: u64,
}

/// A stand-in for a slow database: sleeps for a random delay, then either
/// fails or generates the record for the key.
#[derive(Debug)]
pub struct SimulatedDatabase {
    config: SimulatorConfig,
    queries: AtomicU64,
    errors: AtomicU64,
}

impl SimulatedDatabase {
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `config` is out of
    /// range.
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            queries: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            queries: self.queries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.queries.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }

    /// Issues one probe query with a short budget. The probe is subject to the
    /// configured error rate like any other query.
    pub async fn health_check(&self) -> core::result::Result<(), SourceError> {
        let cancel = CancellationToken::new();
        match tokio::time::timeout(HEALTH_CHECK_BUDGET, self.fetch("health-check", &cancel)).await
        {
            Ok(outcome) => outcome.map(|_| ()),
            Err(_) => Err(SourceError::TimedOut),
        }
    }

    /// Fetches `keys` one after another. The first failure aborts the batch.
    pub async fn batch_fetch(
        &self,
        keys: &[&str],
        cancel: &CancellationToken,
    ) -> core::result::Result<Vec<Record>, SourceError> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            records.push(self.fetch(key, cancel).await?);
        }
        Ok(records)
    }

    /// Draws the delay and the failure decision for one query.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let min = self.config.min_latency;
        let max = self.config.max_latency;
        let delay = if max > min {
            let span = u64::try_from((max - min).as_nanos()).unwrap_or(u64::MAX);
            min + Duration::from_nanos(rng.random_range(0..span))
        } else {
            min
        };
        (delay, rng.random_bool(self.config.error_rate))
    }
}

impl Source for SimulatedDatabase {
    async fn fetch(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> core::result::Result<Record, SourceError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let (delay, fail) = self.roll();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SourceError::Cancelled),
            elapsed = tokio::time::timeout(self.config.query_timeout, tokio::time::sleep(delay)) => {
                match elapsed {
                    Err(_) => Err(SourceError::TimedOut),
                    Ok(()) if fail => Err(SourceError::Unavailable { key: key.to_string() }),
                    Ok(()) => Ok(Record::generate(key)),
                }
            }
        };

        if outcome.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }
}
