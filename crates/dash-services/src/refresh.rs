//! Periodic influence-score refresh.
//!
//! Each tick refreshes exactly one handle: the one whose score was checked
//! longest ago, never-checked handles first. Errors are logged and absorbed;
//! the next tick simply picks the next candidate. A failed fetch still stamps
//! the handle's check time so a broken identity cannot monopolise the job.

use std::{sync::Arc, time::Duration};

use dash_core::{
  model::{Id, NewKloutScore},
  service::InfluenceService,
  store::DashboardStore,
};
use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
  /// No handle has an influence identity yet.
  Idle,
  Refreshed { handle_id: Id, score: f64 },
  /// `handle_id` is `None` when selection itself failed.
  Failed { handle_id: Option<Id> },
}

pub struct ScoreRefresher<S> {
  store:     Arc<S>,
  influence: Arc<dyn InfluenceService>,
  every:     Duration,
}

impl<S> ScoreRefresher<S>
where
  S: DashboardStore + 'static,
{
  pub fn new(store: Arc<S>, influence: Arc<dyn InfluenceService>, every: Duration) -> Self {
    Self { store, influence, every }
  }

  /// Spawn the refresh loop. Returns `None` (and spawns nothing) when the
  /// interval is zero.
  pub fn start(self) -> Option<RefreshHandle> {
    if self.every.is_zero() {
      info!("klout refresh disabled");
      return None;
    }

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let every = self.every;
    let task = tokio::spawn(async move {
      let mut timer = interval(every);
      timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = timer.tick() => {
            self.tick().await;
          }
          changed = stop_rx.changed() => {
            if changed.is_err() || *stop_rx.borrow() {
              break;
            }
          }
        }
      }
      debug!("klout refresh stopped");
    });

    info!(interval_secs = every.as_secs_f64(), "klout refresh started");
    Some(RefreshHandle { stop: stop_tx, task })
  }

  /// Refresh the next candidate handle.
  pub async fn tick(&self) -> TickOutcome {
    let handle = match self.store.next_refresh_candidate().await {
      Ok(Some(handle)) => handle,
      Ok(None) => {
        debug!("no handles to refresh");
        return TickOutcome::Idle;
      }
      Err(e) => {
        error!(error = %e, "selecting handle for refresh failed");
        return TickOutcome::Failed { handle_id: None };
      }
    };
    let handle_id = handle.id;
    let Some(klout_id) = handle.klout_id.as_deref() else {
      return TickOutcome::Idle;
    };

    let fetched = match self.influence.score(klout_id).await {
      Ok(fetched) => fetched,
      Err(e) => {
        warn!(handle_id, username = %handle.username, error = %e, "klout fetch failed");
        if let Err(e) = self.store.mark_refresh_attempt(handle_id).await {
          error!(handle_id, error = %e, "stamping refresh attempt failed");
        }
        return TickOutcome::Failed { handle_id: Some(handle_id) };
      }
    };

    let sample = NewKloutScore {
      value:       fetched.score,
      delta_day:   fetched.day_change,
      delta_week:  fetched.week_change,
      delta_month: fetched.month_change,
    };
    match self.store.record_klout_score(handle_id, sample).await {
      Ok(recorded) => {
        info!(handle_id, score = recorded.value, "recorded klout score");
        TickOutcome::Refreshed { handle_id, score: recorded.value }
      }
      Err(e) => {
        error!(handle_id, error = %e, "saving klout score failed");
        TickOutcome::Failed { handle_id: Some(handle_id) }
      }
    }
  }
}

/// Owner of a running refresh loop.
pub struct RefreshHandle {
  stop: watch::Sender<bool>,
  task: JoinHandle<()>,
}

impl RefreshHandle {
  /// Signal the loop to stop and wait for it. An in-flight tick finishes
  /// first.
  pub async fn stop(self) {
    let _ = self.stop.send(true);
    if let Err(e) = self.task.await {
      warn!(error = %e, "klout refresh task ended abnormally");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, sync::Mutex};

  use async_trait::async_trait;
  use dash_core::{
    ServiceError,
    model::NewHandle,
    query::HandleRelation,
    service::InfluenceScore,
  };
  use dash_store_sqlite::SqliteStore;

  use super::*;

  /// Scores keyed by identity; identities not listed fail with `RateLimited`.
  #[derive(Default)]
  struct FakeKlout {
    scores: Mutex<HashMap<String, f64>>,
  }

  impl FakeKlout {
    fn with(scores: &[(&str, f64)]) -> Arc<Self> {
      let map = scores.iter().map(|(k, v)| (k.to_string(), *v)).collect();
      Arc::new(Self { scores: Mutex::new(map) })
    }
  }

  #[async_trait]
  impl InfluenceService for FakeKlout {
    async fn identity(&self, username: &str) -> Result<Option<String>, ServiceError> {
      Ok(Some(format!("k-{username}")))
    }

    async fn score(&self, identity: &str) -> Result<InfluenceScore, ServiceError> {
      let score = self.scores.lock().unwrap().get(identity).copied();
      match score {
        Some(score) => Ok(InfluenceScore {
          score,
          day_change: 0.1,
          week_change: 0.2,
          month_change: 0.3,
        }),
        None => Err(ServiceError::RateLimited),
      }
    }
  }

  async fn store_with(handles: &[(&str, Option<&str>)]) -> (Arc<SqliteStore>, Vec<Id>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut ids = Vec::new();
    for (i, (username, klout_id)) in handles.iter().enumerate() {
      let handle = store
        .create_handle(NewHandle {
          uid:      i as i64 + 1,
          username: username.to_string(),
          name:     username.to_string(),
          profile:  serde_json::json!({}),
          camp_id:  None,
          klout_id: klout_id.map(str::to_owned),
        })
        .await
        .unwrap();
      ids.push(handle.id);
    }
    (Arc::new(store), ids)
  }

  fn refresher(
    store: &Arc<SqliteStore>,
    klout: Arc<FakeKlout>,
    every: Duration,
  ) -> ScoreRefresher<SqliteStore> {
    ScoreRefresher::new(store.clone(), klout, every)
  }

  #[tokio::test]
  async fn idle_without_identities() {
    let (store, _) = store_with(&[("noklout", None)]).await;
    let job = refresher(&store, FakeKlout::with(&[]), Duration::from_secs(60));
    assert_eq!(job.tick().await, TickOutcome::Idle);
  }

  #[tokio::test]
  async fn tick_records_score_and_deltas() {
    let (store, ids) = store_with(&[("a", Some("ka"))]).await;
    let job = refresher(&store, FakeKlout::with(&[("ka", 42.0)]), Duration::from_secs(60));

    assert_eq!(job.tick().await, TickOutcome::Refreshed { handle_id: ids[0], score: 42.0 });

    let view = store
      .get_handle(ids[0], &[HandleRelation::KloutScores])
      .await
      .unwrap()
      .unwrap();
    assert_eq!(view.handle.klout_score, Some(42.0));
    let samples = view.klout_scores.unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].delta_week, 0.2);
  }

  #[tokio::test]
  async fn failing_handle_does_not_block_the_next() {
    let (store, ids) = store_with(&[("a", Some("ka")), ("b", Some("kb"))]).await;
    // Only B has a score; A's fetch fails.
    let job = refresher(&store, FakeKlout::with(&[("kb", 10.0)]), Duration::from_secs(60));

    assert_eq!(job.tick().await, TickOutcome::Failed { handle_id: Some(ids[0]) });
    assert_eq!(job.tick().await, TickOutcome::Refreshed { handle_id: ids[1], score: 10.0 });

    let a = store.get_handle(ids[0], &[]).await.unwrap().unwrap();
    assert!(a.handle.klout_score.is_none());
    assert!(a.handle.klout_checked_at.is_some());
  }

  #[tokio::test]
  async fn zero_interval_disables_the_job() {
    let (store, _) = store_with(&[]).await;
    let job = refresher(&store, FakeKlout::with(&[]), Duration::ZERO);
    assert!(job.start().is_none());
  }

  #[tokio::test]
  async fn started_job_refreshes_until_stopped() {
    let (store, ids) = store_with(&[("a", Some("ka"))]).await;
    let job = refresher(&store, FakeKlout::with(&[("ka", 7.5)]), Duration::from_millis(10));
    let handle = job.start().expect("enabled");

    tokio::time::timeout(Duration::from_secs(5), async {
      loop {
        let view = store.get_handle(ids[0], &[]).await.unwrap().unwrap();
        if view.handle.klout_score.is_some() {
          break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
    })
    .await
    .expect("score recorded");

    handle.stop().await;
  }
}
