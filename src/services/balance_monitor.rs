// src/services/balance_monitor.rs
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::ledger::LedgerRecorder;
use crate::models::{
    AccountId, EndReason, InteractionKind, MonitoredSession, RateCategory, SessionStatus,
    SessionSummary, SessionTransition, TickOutcome, TopUpTicket, WarningKind,
};
use crate::services::collaborators::{BillingEvent, NotificationSink, PaymentBridge};
use crate::services::RateCatalog;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

type SessionHandle = Arc<Mutex<MonitoredSession>>;

struct MonitorInner {
    config: BillingConfig,
    recorder: Arc<LedgerRecorder>,
    catalog: Arc<RateCatalog>,
    notifier: Arc<dyn NotificationSink>,
    payment_bridge: Arc<dyn PaymentBridge>,
    /// Active set. One lock per session keeps ticks serialized within a
    /// session while sessions tick in parallel.
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    /// Spawned timer tasks, keyed by session id, aborted on close.
    timers: parking_lot::Mutex<HashMap<Uuid, JoinHandle<()>>>,
    /// Active sessions per payer, for the concurrent-session guard.
    payer_counts: parking_lot::Mutex<HashMap<AccountId, usize>>,
    history: parking_lot::RwLock<HashMap<Uuid, SessionSummary>>,
}

/// Continuous-billing state machine for calls and room occupancy.
/// Owns the periodic ticks, threshold warnings, pause-for-payment flow,
/// and exhaustion termination for every monitored session.
#[derive(Clone)]
pub struct BalanceMonitor {
    inner: Arc<MonitorInner>,
}

impl BalanceMonitor {
    pub fn new(
        config: BillingConfig,
        recorder: Arc<LedgerRecorder>,
        catalog: Arc<RateCatalog>,
        notifier: Arc<dyn NotificationSink>,
        payment_bridge: Arc<dyn PaymentBridge>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                config,
                recorder,
                catalog,
                notifier,
                payment_bridge,
                sessions: RwLock::new(HashMap::new()),
                timers: parking_lot::Mutex::new(HashMap::new()),
                payer_counts: parking_lot::Mutex::new(HashMap::new()),
                history: parking_lot::RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Open a monitored session at the operator's catalog rate.
    pub async fn open_session(
        &self,
        payer_id: AccountId,
        payee_id: AccountId,
        category: RateCategory,
    ) -> Result<Uuid, BillingError> {
        let rate = self.inner.catalog.resolve(payee_id, category)?;
        self.open_session_with_rate(payer_id, payee_id, category, rate.amount)
            .await
    }

    /// Open a monitored session at an explicit per-minute rate.
    pub async fn open_session_with_rate(
        &self,
        payer_id: AccountId,
        payee_id: AccountId,
        category: RateCategory,
        rate_per_minute: Decimal,
    ) -> Result<Uuid, BillingError> {
        if !category.is_metered() {
            return Err(BillingError::InvalidRequest(format!(
                "category {category} is discrete, use the interaction biller"
            )));
        }
        self.inner.catalog.validate(category, rate_per_minute)?;

        let initial_balance = self.inner.recorder.balance(payer_id)?;
        // Payee must hold a ledger before the first commit.
        self.inner.recorder.balance(payee_id)?;

        {
            let mut counts = self.inner.payer_counts.lock();
            let count = counts.entry(payer_id).or_insert(0);
            if *count >= self.inner.config.max_concurrent_sessions {
                warn!(
                    payer = payer_id,
                    active = *count,
                    "Concurrent session limit reached"
                );
                return Err(BillingError::ConcurrentLimitExceeded);
            }
            *count += 1;
        }

        let session = MonitoredSession::new(
            payer_id,
            payee_id,
            category,
            rate_per_minute,
            initial_balance,
            self.inner.config.tick_interval_secs,
            Utc::now(),
        );
        let session_id = session.id;

        self.inner
            .sessions
            .write()
            .await
            .insert(session_id, Arc::new(Mutex::new(session)));

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            MonitorInner::run_timer(inner, session_id).await;
        });
        self.inner.timers.lock().insert(session_id, handle);

        info!(
            %session_id,
            payer = payer_id,
            payee = payee_id,
            category = category.as_str(),
            rate_per_minute = %rate_per_minute,
            initial_balance = %initial_balance,
            "✅ Monitored session opened"
        );
        Ok(session_id)
    }

    /// Process one billing tick. Normally driven by the session's timer
    /// task; callable directly with an explicit sequence number so a
    /// retried tick is detected instead of double-charged.
    pub async fn tick(
        &self,
        session_id: Uuid,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, BillingError> {
        let handle = self.inner.session_handle(session_id).await?;
        let mut session = handle.lock().await;
        self.inner.tick_locked(&mut session, seq, now).await
    }

    /// Customer signalled intent to add funds (DTMF, UI action). Bills
    /// the interval consumed so far, pauses the cadence, and hands off
    /// to the payment collaborator.
    pub async fn request_top_up(
        &self,
        session_id: Uuid,
        suggested_amount: Decimal,
    ) -> Result<TopUpTicket, BillingError> {
        let handle = self.inner.session_handle(session_id).await?;
        {
            let mut session = handle.lock().await;
            if !session.status.is_billable() {
                return Err(BillingError::InvalidRequest(format!(
                    "session is {}, cannot pause for payment",
                    session.status.as_str()
                )));
            }

            // Bill the consumed partial interval before suspending so
            // no elapsed second is lost or billed twice on resume.
            let now = Utc::now();
            let seq = session.next_tick_seq;
            self.inner.charge_elapsed(&mut session, seq, now)?;

            session.status = SessionStatus::PausedForPayment;
            session.pause_reason = Some("payment_topup_requested".to_string());

            info!(
                %session_id,
                balance = %session.current_balance,
                "⏸ Session paused for payment"
            );
        }

        self.inner
            .payment_bridge
            .request_top_up(session_id, suggested_amount)
            .await
    }

    /// Payment collaborator reports a completed top-up. Credits the
    /// balance, re-arms satisfied warning thresholds, and resumes the
    /// cadence with the paused interval excluded from billing.
    pub async fn resume_after_payment(
        &self,
        session_id: Uuid,
        amount_credited: Decimal,
    ) -> Result<Decimal, BillingError> {
        let handle = self.inner.session_handle(session_id).await?;
        let mut session = handle.lock().await;

        if session.status != SessionStatus::PausedForPayment {
            return Err(BillingError::InvalidRequest(format!(
                "session is {}, not paused for payment",
                session.status.as_str()
            )));
        }

        session.topup_count += 1;
        let reference = format!("{}:topup:{}", session_id, session.topup_count);
        let (_, new_balance) =
            self.inner
                .recorder
                .credit(session.payer_id, amount_credited, &reference)?;

        session.current_balance = new_balance;
        session.total_topped_up += amount_credited;
        session.rearm_warnings(
            self.inner.config.low_balance_threshold,
            self.inner.config.critical_balance_threshold,
        );
        session.status = SessionStatus::Active;
        session.pause_reason = None;
        // The paused interval is never retroactively billed.
        session.last_tick_at = Utc::now();

        info!(
            %session_id,
            credited = %amount_credited,
            new_balance = %new_balance,
            "▶️ Session resumed after payment"
        );
        self.inner
            .notifier
            .notify(
                session_id,
                BillingEvent::PaymentAdded,
                format!("Payment of {amount_credited} received. Your session has resumed."),
            )
            .await;

        Ok(new_balance)
    }

    /// Caller hung up or left the room. Flushes one final partial tick
    /// so every consumed second is billed exactly once, then archives.
    pub async fn close_session(
        &self,
        session_id: Uuid,
    ) -> Result<SessionSummary, BillingError> {
        let handle = self.inner.session_handle(session_id).await?;
        let mut session = handle.lock().await;

        let now = Utc::now();
        if session.status.is_billable() {
            let seq = session.next_tick_seq;
            self.inner.charge_elapsed(&mut session, seq, now)?;
        }

        let summary = self
            .inner
            .archive_locked(&mut session, EndReason::Normal, now)
            .await;

        if let Some(timer) = self.inner.timers.lock().remove(&session_id) {
            timer.abort();
        }

        Ok(summary)
    }

    pub async fn session_snapshot(
        &self,
        session_id: Uuid,
    ) -> Result<MonitoredSession, BillingError> {
        let handle = self.inner.session_handle(session_id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Summary of an archived session, if it ever existed.
    pub fn summary(&self, session_id: Uuid) -> Option<SessionSummary> {
        self.inner.history.read().get(&session_id).cloned()
    }

    pub async fn active_session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Abort every timer task. Sessions stay in the active set; intended
    /// for shutdown paths where the process is going away.
    pub fn shutdown(&self) {
        let mut timers = self.inner.timers.lock();
        for (session_id, handle) in timers.drain() {
            handle.abort();
            info!(%session_id, "🛑 Billing timer stopped");
        }
    }
}

impl MonitorInner {
    async fn session_handle(&self, session_id: Uuid) -> Result<SessionHandle, BillingError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(BillingError::SessionNotFound(session_id))
    }

    async fn run_timer(inner: Arc<MonitorInner>, session_id: Uuid) {
        let mut ticker = interval(Duration::from_secs(inner.config.tick_interval_secs));
        // The first tick completes immediately; consume it so the first
        // charge covers a full interval.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let handle = match inner.session_handle(session_id).await {
                Ok(h) => h,
                // Archived underneath us, nothing left to bill.
                Err(_) => break,
            };
            let outcome = {
                let mut session = handle.lock().await;
                let seq = session.next_tick_seq;
                inner.tick_locked(&mut session, seq, Utc::now()).await
            };

            match outcome {
                Ok(TickOutcome::Charged {
                    transition: Some(SessionTransition::Terminated(_)),
                    ..
                }) => break,
                Ok(_) => {}
                Err(BillingError::SessionNotFound(_)) => break,
                Err(e) => {
                    error!(%session_id, error = %e, "Billing tick failed, stopping timer");
                    break;
                }
            }
        }

        inner.timers.lock().remove(&session_id);
    }

    /// One serialized tick: charge the elapsed interval, then evaluate
    /// thresholds against the balance that commit just returned.
    async fn tick_locked(
        &self,
        session: &mut MonitoredSession,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, BillingError> {
        if session.status == SessionStatus::Terminated {
            return Err(BillingError::SessionNotFound(session.id));
        }
        if session.status == SessionStatus::PausedForPayment {
            return Ok(TickOutcome::SkippedPaused);
        }

        if seq < session.next_tick_seq {
            warn!(
                session_id = %session.id,
                seq,
                expected = session.next_tick_seq,
                "Replayed billing tick ignored"
            );
            return Ok(TickOutcome::DuplicateIgnored);
        }
        if seq > session.next_tick_seq {
            return Err(BillingError::InvalidRequest(format!(
                "tick sequence {seq} is ahead of expected {}",
                session.next_tick_seq
            )));
        }

        let amount = match self.charge_elapsed(session, seq, now) {
            Ok(amount) => amount,
            // A replay that slipped past the sequence guard (e.g. state
            // restored from an older snapshot) is ignored, not billed.
            Err(BillingError::DuplicateTick(reference)) => {
                warn!(session_id = %session.id, %reference, "Duplicate tick commit ignored");
                return Ok(TickOutcome::DuplicateIgnored);
            }
            Err(e) => return Err(e),
        };

        let transition = self.evaluate_thresholds(session, now).await;

        Ok(TickOutcome::Charged {
            amount,
            balance: session.current_balance,
            transition,
        })
    }

    /// Commit the elapsed-interval charge, capped at the remaining
    /// balance, and refresh the session's advisory state.
    fn charge_elapsed(
        &self,
        session: &mut MonitoredSession,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Result<Decimal, BillingError> {
        let elapsed = session.elapsed_since_last_tick(now);
        let nominal = (Decimal::from(elapsed) * session.rate_per_minute / Decimal::from(60))
            .round_dp(2);

        let kind = match session.category {
            RateCategory::Room => InteractionKind::RoomTick {
                session_id: session.id,
                tick_seq: seq,
                seconds_billed: elapsed,
            },
            _ => InteractionKind::CallTick {
                session_id: session.id,
                tick_seq: seq,
                seconds_billed: elapsed,
            },
        };
        let reference = format!("{}:tick:{}", session.id, seq);

        let result = self.recorder.commit_capped(
            session.payer_id,
            session.payee_id,
            nominal,
            kind,
            &reference,
        )?;

        session.last_tick_at = now;
        session.next_tick_seq = seq + 1;
        session.total_charged += result.record.gross;
        session.current_balance = result.new_payer_balance;

        Ok(result.record.gross)
    }

    /// Runs synchronously after each commit, on the balance that commit
    /// returned. Warnings are one-shot until a top-up re-arms them.
    async fn evaluate_thresholds(
        &self,
        session: &mut MonitoredSession,
        now: DateTime<Utc>,
    ) -> Option<SessionTransition> {
        let balance = session.current_balance;

        if balance <= Decimal::ZERO {
            let session_id = session.id;
            warn!(
                %session_id,
                total_charged = %session.total_charged,
                "🛑 Balance exhausted, terminating session"
            );
            self.archive_locked(session, EndReason::InsufficientFunds, now)
                .await;
            self.notifier
                .notify(
                    session_id,
                    BillingEvent::Terminated,
                    "Your balance is exhausted. The session has ended.".to_string(),
                )
                .await;
            return Some(SessionTransition::Terminated(EndReason::InsufficientFunds));
        }

        if balance <= self.config.critical_balance_threshold && !session.critical_warning_fired {
            session.status = SessionStatus::WarnedCritical;
            // Crossing critical implies the low threshold was passed;
            // the low warning must never fire after this one.
            session.low_warning_fired = true;
            session.record_warning(WarningKind::Critical, now);
            warn!(session_id = %session.id, %balance, "⚠️ Critical balance warning");
            self.notifier
                .notify(
                    session.id,
                    BillingEvent::CriticalBalance,
                    format!("Your balance is almost exhausted ({balance}). The session will end soon."),
                )
                .await;
            return Some(SessionTransition::WarnedCritical);
        }

        if balance <= self.config.low_balance_threshold
            && !session.low_warning_fired
            && session.status != SessionStatus::WarnedCritical
        {
            session.status = SessionStatus::WarnedLow;
            session.record_warning(WarningKind::Low, now);
            info!(session_id = %session.id, %balance, "Low balance warning");
            self.notifier
                .notify(
                    session.id,
                    BillingEvent::LowBalance,
                    format!("Your balance is low ({balance}). Please add funds to continue."),
                )
                .await;
            return Some(SessionTransition::WarnedLow);
        }

        None
    }

    /// Move a session out of the active set into history. Caller holds
    /// the session lock; the timer task notices the removal and exits.
    async fn archive_locked(
        &self,
        session: &mut MonitoredSession,
        end_reason: EndReason,
        now: DateTime<Utc>,
    ) -> SessionSummary {
        session.status = SessionStatus::Terminated;

        let duration_secs = (now - session.started_at).num_seconds().max(0);
        let summary = SessionSummary {
            session_id: session.id,
            payer_id: session.payer_id,
            payee_id: session.payee_id,
            category: session.category,
            started_at: session.started_at,
            ended_at: now,
            duration_minutes: (Decimal::from(duration_secs) / Decimal::from(60)).round_dp(2),
            total_charged: session.total_charged,
            final_balance: session.current_balance,
            end_reason,
        };

        self.sessions.write().await.remove(&session.id);
        {
            let mut counts = self.payer_counts.lock();
            if let Some(count) = counts.get_mut(&session.payer_id) {
                *count = count.saturating_sub(1);
            }
        }
        self.history.write().insert(session.id, summary.clone());

        info!(
            session_id = %session.id,
            end_reason = end_reason.as_str(),
            duration_minutes = %summary.duration_minutes,
            total_charged = %summary.total_charged,
            final_balance = %summary.final_balance,
            "Session archived"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerStore;
    use crate::models::OperatorTier;
    use crate::services::collaborators::{MockNotificationSink, MockPaymentBridge};
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    const CUSTOMER: AccountId = 1;
    const OPERATOR: AccountId = 2;

    fn monitor_with(
        balance: Decimal,
        notifier: Arc<dyn NotificationSink>,
        bridge: Arc<dyn PaymentBridge>,
    ) -> BalanceMonitor {
        let store = Arc::new(LedgerStore::new());
        store.open_account(CUSTOMER, balance);
        store.open_account(OPERATOR, Decimal::ZERO);
        let catalog = Arc::new(RateCatalog::new(dec!(0.65)));
        catalog.register_operator(OPERATOR, OperatorTier::Premium);
        let recorder = Arc::new(LedgerRecorder::new(store, catalog.clone()));
        BalanceMonitor::new(
            BillingConfig::default(),
            recorder,
            catalog,
            notifier,
            bridge,
        )
    }

    fn quiet_notifier() -> Arc<MockNotificationSink> {
        let mut mock = MockNotificationSink::new();
        mock.expect_notify().returning(|_, _, _| ());
        Arc::new(mock)
    }

    fn unused_bridge() -> Arc<MockPaymentBridge> {
        Arc::new(MockPaymentBridge::new())
    }

    #[tokio::test]
    async fn two_tick_exhaustion_scenario() {
        // initialBalance=5.00, rate=3.00/min, 60s ticks:
        // tick 1 charges 3.00 (low warning), tick 2 caps at 2.00 and
        // terminates with insufficient_funds.
        let mut mock = MockNotificationSink::new();
        mock.expect_notify()
            .withf(|_, event, _| *event == BillingEvent::LowBalance)
            .times(1)
            .returning(|_, _, _| ());
        mock.expect_notify()
            .withf(|_, event, _| *event == BillingEvent::Terminated)
            .times(1)
            .returning(|_, _, _| ());
        let monitor = monitor_with(dec!(5.00), Arc::new(mock), unused_bridge());

        let id = monitor
            .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(3.00))
            .await
            .unwrap();
        let opened = monitor.session_snapshot(id).await.unwrap();

        let t1 = opened.last_tick_at + ChronoDuration::seconds(60);
        match monitor.tick(id, 1, t1).await.unwrap() {
            TickOutcome::Charged {
                amount,
                balance,
                transition,
            } => {
                assert_eq!(amount, dec!(3.00));
                assert_eq!(balance, dec!(2.00));
                assert_eq!(transition, Some(SessionTransition::WarnedLow));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let t2 = t1 + ChronoDuration::seconds(60);
        match monitor.tick(id, 2, t2).await.unwrap() {
            TickOutcome::Charged {
                amount,
                balance,
                transition,
            } => {
                assert_eq!(amount, dec!(2.00));
                assert_eq!(balance, dec!(0.00));
                assert_eq!(
                    transition,
                    Some(SessionTransition::Terminated(EndReason::InsufficientFunds))
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let summary = monitor.summary(id).expect("archived summary");
        assert_eq!(summary.total_charged, dec!(5.00));
        assert_eq!(summary.end_reason, EndReason::InsufficientFunds);
        assert_eq!(monitor.active_session_count().await, 0);
        assert!(matches!(
            monitor.tick(id, 3, t2).await,
            Err(BillingError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn replayed_tick_does_not_double_charge() {
        let monitor = monitor_with(dec!(50.00), quiet_notifier(), unused_bridge());
        let id = monitor
            .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(3.00))
            .await
            .unwrap();
        let opened = monitor.session_snapshot(id).await.unwrap();

        let t1 = opened.last_tick_at + ChronoDuration::seconds(60);
        monitor.tick(id, 1, t1).await.unwrap();
        let balance_after = monitor.session_snapshot(id).await.unwrap().current_balance;

        let replay = monitor.tick(id, 1, t1 + ChronoDuration::seconds(60)).await.unwrap();
        assert!(matches!(replay, TickOutcome::DuplicateIgnored));
        assert_eq!(
            monitor.session_snapshot(id).await.unwrap().current_balance,
            balance_after
        );
    }

    #[tokio::test]
    async fn critical_warning_fires_once_until_rearmed() {
        let monitor = monitor_with(dec!(3.40), quiet_notifier(), unused_bridge());
        // 0.30 per 60s tick keeps the drops small enough to cross both
        // thresholds on separate ticks.
        let id = monitor
            .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(0.30))
            .await
            .unwrap();
        let mut at = monitor.session_snapshot(id).await.unwrap().last_tick_at;

        let mut seen_critical = 0;
        for seq in 1..=10 {
            at += ChronoDuration::seconds(60);
            if let TickOutcome::Charged { transition, .. } =
                monitor.tick(id, seq, at).await.unwrap()
            {
                if transition == Some(SessionTransition::WarnedCritical) {
                    seen_critical += 1;
                }
                if matches!(transition, Some(SessionTransition::Terminated(_))) {
                    break;
                }
            }
        }
        assert_eq!(seen_critical, 1);
    }

    #[tokio::test]
    async fn skipping_low_threshold_never_downgrades_from_critical() {
        // One tick drops the balance straight past both thresholds:
        // critical fires, and no late low warning may follow it.
        let mut mock = MockNotificationSink::new();
        mock.expect_notify()
            .withf(|_, event, _| *event == BillingEvent::CriticalBalance)
            .times(1)
            .returning(|_, _, _| ());
        let monitor = monitor_with(dec!(5.00), Arc::new(mock), unused_bridge());

        let id = monitor
            .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(4.60))
            .await
            .unwrap();
        let opened = monitor.session_snapshot(id).await.unwrap();

        // 60s at 4.60/min: balance 5.00 -> 0.40, below critical.
        let t1 = opened.last_tick_at + ChronoDuration::seconds(60);
        match monitor.tick(id, 1, t1).await.unwrap() {
            TickOutcome::Charged { transition, balance, .. } => {
                assert_eq!(balance, dec!(0.40));
                assert_eq!(transition, Some(SessionTransition::WarnedCritical));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // A further small charge stays critical: no WarnedLow regression.
        let t2 = t1 + ChronoDuration::seconds(2);
        match monitor.tick(id, 2, t2).await.unwrap() {
            TickOutcome::Charged { transition, .. } => assert_eq!(transition, None),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let session = monitor.session_snapshot(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::WarnedCritical);
        assert!(session.low_warning_fired);
    }

    #[tokio::test]
    async fn pause_bills_partial_interval_and_resume_skips_paused_time() {
        let mut bridge = MockPaymentBridge::new();
        bridge.expect_request_top_up().returning(|session_id, _| {
            Ok(TopUpTicket {
                accepted: true,
                session_handle: session_id.to_string(),
            })
        });
        let monitor = monitor_with(dec!(5.00), quiet_notifier(), Arc::new(bridge));

        let id = monitor
            .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Room, dec!(3.00))
            .await
            .unwrap();

        let ticket = monitor.request_top_up(id, dec!(10.00)).await.unwrap();
        assert!(ticket.accepted);

        let paused = monitor.session_snapshot(id).await.unwrap();
        assert_eq!(paused.status, SessionStatus::PausedForPayment);

        // Ticks do not accrue while paused.
        let skipped = monitor
            .tick(id, paused.next_tick_seq, Utc::now())
            .await
            .unwrap();
        assert!(matches!(skipped, TickOutcome::SkippedPaused));

        let new_balance = monitor.resume_after_payment(id, dec!(10.00)).await.unwrap();
        let resumed = monitor.session_snapshot(id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
        assert_eq!(resumed.current_balance, new_balance);
        assert_eq!(resumed.total_topped_up, dec!(10.00));
        // Balance identity holds across the pause/resume cycle.
        assert_eq!(
            resumed.current_balance,
            resumed.initial_balance - resumed.total_charged + resumed.total_topped_up
        );
    }

    #[tokio::test]
    async fn normal_close_flushes_final_partial_tick() {
        let monitor = monitor_with(dec!(50.00), quiet_notifier(), unused_bridge());
        let id = monitor
            .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(3.00))
            .await
            .unwrap();

        let summary = monitor.close_session(id).await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Normal);
        assert_eq!(monitor.active_session_count().await, 0);
        // The final flush tick committed, even at (near) zero amount.
        assert!(matches!(
            monitor.close_session(id).await,
            Err(BillingError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn open_session_uses_catalog_rate() {
        let monitor = monitor_with(dec!(50.00), quiet_notifier(), unused_bridge());
        // Premium tier default call rate applies when no custom rate is set.
        let id = monitor
            .open_session(CUSTOMER, OPERATOR, RateCategory::Call)
            .await
            .unwrap();
        let session = monitor.session_snapshot(id).await.unwrap();
        assert_eq!(session.rate_per_minute, dec!(2.99));

        let t1 = session.last_tick_at + ChronoDuration::seconds(60);
        match monitor.tick(id, 1, t1).await.unwrap() {
            TickOutcome::Charged { amount, .. } => assert_eq!(amount, dec!(2.99)),
            other => panic!("unexpected outcome: {other:?}"),
        }
        monitor.close_session(id).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_session_limit_is_enforced() {
        let monitor = monitor_with(dec!(500.00), quiet_notifier(), unused_bridge());
        for _ in 0..BillingConfig::default().max_concurrent_sessions {
            monitor
                .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(1.00))
                .await
                .unwrap();
        }
        assert!(matches!(
            monitor
                .open_session_with_rate(CUSTOMER, OPERATOR, RateCategory::Call, dec!(1.00))
                .await,
            Err(BillingError::ConcurrentLimitExceeded)
        ));
        monitor.shutdown();
    }
}
