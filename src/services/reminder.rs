//! Reminder scheduling and delivery
//!
//! One background task per active session walks that session's reminder
//! checkpoints in order: sleep until the checkpoint's trigger time, re-check
//! that the session is still active, deliver the notification, record the
//! delivery in the ledger, and at the final (expiry) checkpoint mark the
//! session completed.
//!
//! The ledger consultation at the top of each iteration is what makes
//! restarts safe: a re-spawned task skips checkpoints that were already
//! delivered and fires overdue ones immediately, so recovery behaves as if
//! the process had never stopped.
//!
//! Exactly one task must exist per session at a time. Tasks are spawned from
//! two places only: session creation, and the startup recovery sweep - which
//! runs once, before the HTTP server starts accepting requests.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::time::Instant;

use crate::db::repositories::{
    CarRepository, ParkingLocationRepository, ParkingSessionRepository, UserRepository,
};
use crate::dedup::DedupStore;
use crate::models::{ParkingSession, ParkingSessionStatus};
use crate::services::intervals::plan_checkpoints;
use crate::services::telegram::Notifier;

/// Per-session reminder orchestrator.
///
/// Holds shared handles only, so cloning is cheap; the per-session state
/// lives on the stack of each spawned task.
#[derive(Clone)]
pub struct ReminderScheduler {
    sessions: Arc<dyn ParkingSessionRepository>,
    cars: Arc<dyn CarRepository>,
    locations: Arc<dyn ParkingLocationRepository>,
    users: Arc<dyn UserRepository>,
    dedup: Arc<dyn DedupStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderScheduler {
    pub fn new(
        sessions: Arc<dyn ParkingSessionRepository>,
        cars: Arc<dyn CarRepository>,
        locations: Arc<dyn ParkingLocationRepository>,
        users: Arc<dyn UserRepository>,
        dedup: Arc<dyn DedupStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            cars,
            locations,
            users,
            dedup,
            notifier,
        }
    }

    /// Spawn the reminder task for one session.
    ///
    /// Fire-and-forget: the task owns its own error handling. A ledger or
    /// session-store failure aborts this session's task and is logged; it
    /// never affects other sessions or the process.
    pub fn spawn(&self, chat_id: String, end_time: DateTime<Utc>, session_id: String) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            if let Err(error) = scheduler.run(&chat_id, end_time, &session_id).await {
                tracing::error!(session_id = %session_id, %error, "reminder task aborted");
            }
        });
    }

    /// Walk one session's checkpoints to completion.
    ///
    /// Returns when all checkpoints are handled, when the session leaves
    /// `active`, or with an error on a store failure. Notifier failures are
    /// logged and swallowed; the checkpoint is still recorded as sent so a
    /// later recovery cannot double-send it.
    pub async fn run(
        &self,
        chat_id: &str,
        end_time: DateTime<Utc>,
        session_id: &str,
    ) -> Result<()> {
        // Trigger instants are anchored to the monotonic clock once at
        // planning; wall-clock reads after this point only render text.
        let planned_at = Utc::now();
        let anchor = Instant::now();

        let total_minutes = (end_time - planned_at).num_seconds() as f64 / 60.0;
        let checkpoints = plan_checkpoints(total_minutes);
        tracing::debug!(session_id, ?checkpoints, "planned reminder checkpoints");

        for minutes_left in checkpoints {
            if self.dedup.is_sent(session_id, minutes_left).await? {
                continue;
            }

            let trigger_time = end_time - Duration::minutes(minutes_left);
            if let Ok(offset) = (trigger_time - planned_at).to_std() {
                tokio::time::sleep_until(anchor + offset).await;
            }
            // An offset in the past fails the conversion above; the
            // checkpoint is overdue and fires immediately.

            let Some(session) = self.sessions.get_by_id(session_id).await? else {
                tracing::warn!(session_id, "session disappeared, stopping reminders");
                return Ok(());
            };
            if session.status != ParkingSessionStatus::Active {
                tracing::debug!(
                    session_id,
                    status = %session.status,
                    "session ended early, stopping reminders"
                );
                return Ok(());
            }

            let text = self.render_reminder(&session, minutes_left).await?;
            if let Err(error) = self.notifier.send(chat_id, &text).await {
                tracing::warn!(session_id, minutes_left, %error, "reminder delivery failed");
            }

            self.dedup.mark_sent(session_id, minutes_left).await?;

            if minutes_left == 0 {
                self.sessions
                    .update_status(session_id, ParkingSessionStatus::Completed)
                    .await?;
                tracing::info!(session_id, "session expired, marked completed");
                return Ok(());
            }
        }

        // Every plan ends in the expiry checkpoint, so getting here means it
        // was already recorded as sent; leave the session alone.
        Ok(())
    }

    /// Re-attach reminder tasks to every session orphaned by a restart.
    ///
    /// Spawns a task for each active session whose user has a linked chat,
    /// using the session's current end time; already-delivered checkpoints
    /// are skipped through the ledger. Returns the number of re-attached
    /// tasks. A store failure here is returned to the caller - the process
    /// cannot start safely without the sweep.
    pub async fn recover_active_sessions(&self) -> Result<usize> {
        let active = self
            .sessions
            .find_active()
            .await
            .context("Failed to query active sessions for the recovery sweep")?;

        let mut reattached = 0;
        for session in active {
            let user = self.users.get_by_id(session.user_id).await?;
            let Some(chat_id) = user.and_then(|u| u.telegram_chat_id) else {
                continue;
            };
            self.spawn(chat_id, session.end_time, session.id.clone());
            reattached += 1;
        }

        if reattached > 0 {
            tracing::info!(count = reattached, "re-attached reminder tasks");
        }
        Ok(reattached)
    }

    /// Render the reminder text for one checkpoint.
    ///
    /// The expiry checkpoint gets distinct wording. Car and location rows
    /// that have been deleted fall back to generic text; the session's raw
    /// coordinates stand in for a missing location.
    async fn render_reminder(&self, session: &ParkingSession, minutes_left: i64) -> Result<String> {
        let car = self.cars.get_by_id(session.car_id).await?;
        let plate = car
            .map(|c| c.license_plate)
            .unwrap_or_else(|| "your car".to_string());

        let location = match session.parking_location_id {
            Some(id) => self.locations.get_by_id(id).await?,
            None => None,
        };
        let place = location
            .map(|l| l.location_name)
            .unwrap_or_else(|| format!("{}, {}", session.latitude, session.longitude));

        Ok(if minutes_left == 0 {
            format!("🚨 Your parking of {} at {} has expired!", plate, place)
        } else {
            format!(
                "⚠️ <b>{}m left!</b> at {} for your {} car!",
                minutes_left, place, plate
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCarRepository, SqlxParkingLocationRepository, SqlxParkingSessionRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::dedup::MemoryDedup;
    use crate::models::{CreateParkingLocationInput, FeeClassification};
    use async_trait::async_trait;

    /// Notifier fake that records every attempt with its virtual-time offset
    struct RecordingNotifier {
        base: Instant,
        sent: tokio::sync::Mutex<Vec<(String, std::time::Duration)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new(fail: bool) -> Self {
            Self {
                base: Instant::now(),
                sent: tokio::sync::Mutex::new(Vec::new()),
                fail,
            }
        }

        async fn attempts(&self) -> Vec<(String, std::time::Duration)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _target: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .await
                .push((text.to_string(), self.base.elapsed()));
            if self.fail {
                anyhow::bail!("channel down");
            }
            Ok(())
        }
    }

    struct Harness {
        scheduler: Arc<ReminderScheduler>,
        users: Arc<dyn UserRepository>,
        cars: Arc<dyn CarRepository>,
        locations: Arc<dyn ParkingLocationRepository>,
        sessions: Arc<dyn ParkingSessionRepository>,
        dedup: Arc<dyn DedupStore>,
        notifier: Arc<RecordingNotifier>,
    }

    async fn harness(fail_delivery: bool) -> Harness {
        let pool = create_test_pool().await.expect("test pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let users: Arc<dyn UserRepository> = Arc::new(SqlxUserRepository::new(pool.clone()));
        let cars: Arc<dyn CarRepository> = Arc::new(SqlxCarRepository::new(pool.clone()));
        let locations: Arc<dyn ParkingLocationRepository> =
            Arc::new(SqlxParkingLocationRepository::new(pool.clone()));
        let sessions: Arc<dyn ParkingSessionRepository> =
            Arc::new(SqlxParkingSessionRepository::new(pool.clone()));
        let dedup: Arc<dyn DedupStore> = Arc::new(MemoryDedup::new());
        let notifier = Arc::new(RecordingNotifier::new(fail_delivery));

        let scheduler = Arc::new(ReminderScheduler::new(
            sessions.clone(),
            cars.clone(),
            locations.clone(),
            users.clone(),
            dedup.clone(),
            notifier.clone(),
        ));

        Harness {
            scheduler,
            users,
            cars,
            locations,
            sessions,
            dedup,
            notifier,
        }
    }

    /// Seed a linked user, a car, and an active session ending `end_in_secs`
    /// from now. Returns the session and the chat id to notify.
    async fn seed_session(h: &Harness, email: &str, end_in_secs: i64) -> (ParkingSession, String) {
        let user = h.users.create(email).await.expect("user");
        h.users
            .link_telegram(user.id, &format!("chat-{}", user.id))
            .await
            .expect("link");
        let car = h.cars.create(user.id, "AB12 CDE").await.expect("car");

        let now = Utc::now();
        let session = ParkingSession::new(
            user.id,
            car.id,
            None,
            51.5074,
            -0.1278,
            now,
            now + Duration::seconds(end_in_secs),
        );
        let session = h.sessions.create(&session).await.expect("session");
        (session, format!("chat-{}", user.id))
    }

    fn assert_close(actual: std::time::Duration, expected_secs: u64) {
        let actual = actual.as_secs_f64();
        let expected = expected_secs as f64;
        assert!(
            (actual - expected).abs() < 5.0,
            "expected ~{}s, got {}s",
            expected,
            actual
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thirty_one_minute_session_delivers_three_reminders() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", 31 * 60).await;

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        let attempts = h.notifier.attempts().await;
        assert_eq!(attempts.len(), 3);

        assert!(attempts[0].0.contains("20m left"));
        assert!(attempts[1].0.contains("10m left"));
        assert!(attempts[2].0.contains("expired"));
        assert!(attempts[2].0.contains("AB12 CDE"));

        // 20, 10 and 0 minutes before a deadline 31 minutes out
        assert_close(attempts[0].1, 11 * 60);
        assert_close(attempts[1].1, 21 * 60);
        assert_close(attempts[2].1, 31 * 60);

        let session = h
            .sessions
            .get_by_id(&session.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(session.status, ParkingSessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eight_minute_session_uses_scaled_checkpoints() {
        let h = harness(false).await;
        // A couple of spare seconds keep the measured runway above 8 minutes
        // when the scheduler plans a moment after the session was created
        let (session, chat_id) = seed_session(&h, "driver@example.com", 8 * 60 + 2).await;

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        let attempts = h.notifier.attempts().await;
        assert_eq!(attempts.len(), 3);
        assert!(attempts[0].0.contains("4m left"));
        assert!(attempts[1].0.contains("1m left"));
        assert!(attempts[2].0.contains("expired"));

        assert_close(attempts[0].1, 4 * 60);
        assert_close(attempts[1].1, 7 * 60);
        assert_close(attempts[2].1, 8 * 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_skips_checkpoints_already_in_ledger() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", 35 * 60).await;

        // As if a previous process delivered the 20-minute reminder and died
        h.dedup.mark_sent(&session.id, 20).await.expect("mark");

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        let attempts = h.notifier.attempts().await;
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].0.contains("10m left"));
        assert!(attempts[1].0.contains("expired"));

        assert_close(attempts[0].1, 25 * 60);
        assert_close(attempts[1].1, 35 * 60);

        let session = h
            .sessions
            .get_by_id(&session.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(session.status, ParkingSessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_completion_suppresses_remaining_reminders() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", 20 * 60).await;

        let scheduler = h.scheduler.clone();
        let end_time = session.end_time;
        let session_id = session.id.clone();
        let handle =
            tokio::spawn(async move { scheduler.run(&chat_id, end_time, &session_id).await });

        // User leaves the spot before the first checkpoint triggers
        tokio::time::sleep(std::time::Duration::from_secs(6 * 60)).await;
        assert!(h
            .sessions
            .update_status(&session.id, ParkingSessionStatus::Completed)
            .await
            .expect("update"));

        handle.await.expect("join").expect("run");

        assert!(h.notifier.attempts().await.is_empty());
        assert!(!h.dedup.is_sent(&session.id, 10).await.expect("is_sent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ended_before_start_sends_nothing() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", -60).await;
        h.sessions
            .update_status(&session.id, ParkingSessionStatus::Cancelled)
            .await
            .expect("update");

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        assert!(h.notifier.attempts().await.is_empty());
        assert!(!h.dedup.is_sent(&session.id, 0).await.expect("is_sent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_gets_immediate_expiry_notice() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", -5 * 60).await;

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        let attempts = h.notifier.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].0.contains("expired"));
        assert_close(attempts[0].1, 0);

        let session = h
            .sessions
            .get_by_id(&session.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(session.status, ParkingSessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_still_records_and_completes() {
        let h = harness(true).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", -60).await;

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        // Delivery was attempted, recorded, and the session still expired
        assert_eq!(h.notifier.attempts().await.len(), 1);
        assert!(h.dedup.is_sent(&session.id, 0).await.expect("is_sent"));

        let session = h
            .sessions
            .get_by_id(&session.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(session.status, ParkingSessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fully_recorded_plan_is_a_no_op() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", -60).await;

        // Expiry already recorded by a previous run that died before exiting
        h.dedup.mark_sent(&session.id, 0).await.expect("mark");

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");

        // Nothing is sent and the session is left untouched
        assert!(h.notifier.attempts().await.is_empty());
        let session = h
            .sessions
            .get_by_id(&session.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(session.status, ParkingSessionStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_renders_location_name() {
        let h = harness(false).await;
        let user = h.users.create("driver@example.com").await.expect("user");
        h.users.link_telegram(user.id, "chat-loc").await.expect("link");
        let car = h.cars.create(user.id, "ZZ99 ZZZ").await.expect("car");
        let location = h
            .locations
            .create(
                user.id,
                &CreateParkingLocationInput {
                    location_name: "Tesco car park".to_string(),
                    latitude: 51.5,
                    longitude: -0.1,
                    fee_classification: FeeClassification::Free,
                    max_stay: Some(60),
                    no_return_time: None,
                    is_public: false,
                },
            )
            .await
            .expect("location");

        let now = Utc::now();
        let session = ParkingSession::new(
            user.id,
            car.id,
            Some(location.id),
            51.5,
            -0.1,
            now,
            now - Duration::minutes(1),
        );
        let session = h.sessions.create(&session).await.expect("session");

        h.scheduler
            .run("chat-loc", session.end_time, &session.id)
            .await
            .expect("run");

        let attempts = h.notifier.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].0.contains("Tesco car park"));
        assert!(attempts[0].0.contains("ZZ99 ZZZ"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recovery_sweep_reattaches_linked_sessions_only() {
        let h = harness(false).await;

        // One linked user with an overdue session, one unlinked user
        let (linked_session, _) = seed_session(&h, "linked@example.com", -60).await;

        let unlinked = h.users.create("unlinked@example.com").await.expect("user");
        let unlinked_car = h.cars.create(unlinked.id, "CD34 EFG").await.expect("car");
        let now = Utc::now();
        let unlinked_session = ParkingSession::new(
            unlinked.id,
            unlinked_car.id,
            None,
            51.5,
            -0.1,
            now,
            now - Duration::seconds(60),
        );
        h.sessions.create(&unlinked_session).await.expect("session");

        let reattached = h
            .scheduler
            .recover_active_sessions()
            .await
            .expect("recover");
        assert_eq!(reattached, 1);

        // The spawned task is overdue, so it should finish promptly; the
        // status write is its last step
        let mut linked_status = ParkingSessionStatus::Active;
        for _ in 0..100 {
            linked_status = h
                .sessions
                .get_by_id(&linked_session.id)
                .await
                .expect("get")
                .expect("row")
                .status;
            if linked_status != ParkingSessionStatus::Active {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(linked_status, ParkingSessionStatus::Completed);

        let attempts = h.notifier.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].0.contains("expired"));

        let unlinked_session = h
            .sessions
            .get_by_id(&unlinked_session.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(unlinked_session.status, ParkingSessionStatus::Active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_sweep_after_completion_does_not_double_send() {
        let h = harness(false).await;
        let (session, chat_id) = seed_session(&h, "driver@example.com", -60).await;

        h.scheduler
            .run(&chat_id, session.end_time, &session.id)
            .await
            .expect("run");
        assert_eq!(h.notifier.attempts().await.len(), 1);

        // A second sweep finds no active sessions at all
        let reattached = h
            .scheduler
            .recover_active_sessions()
            .await
            .expect("recover");
        assert_eq!(reattached, 0);
        assert_eq!(h.notifier.attempts().await.len(), 1);
    }
}
