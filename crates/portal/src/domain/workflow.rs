//! Registration workflow state machine
//!
//! One `RegistrationSession` per open form, held in memory by the
//! `SessionManager` and keyed by a v7 uuid the browser carries in its
//! fragment URLs. The phase graph:
//!
//! ```text
//! Idle -> Editing -> Submitting -> AwaitingPayment -> {reset | PaymentPending | PaymentFailed}
//! ```
//!
//! A submit failure drops back to Editing with the draft intact. A payment
//! failure or closed popup lands in PaymentFailed with the token retained,
//! so "pay now" can re-invoke the widget without resubmitting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info};
use portal_core::{
    rules, validate_draft, Competition, CoreError, OfficialField, OfficialRole, PersonField,
    RegistrationDraft, Roster,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Workflow violations. Like [`CoreError`], the messages double as the
/// user-facing form notices.
#[derive(Error, Debug)]
pub enum Error {
    #[error("formulir tidak dapat diubah saat ini")]
    NotEditing,

    #[error("pengiriman sedang berlangsung, mohon tunggu")]
    SubmitInFlight,

    #[error("formulir tidak dapat ditutup selama proses berlangsung")]
    DismissBlocked,

    #[error("tidak ada pembayaran yang sedang menunggu")]
    NoPaymentSession,

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Where a session is in the registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Editing,
    Submitting,
    AwaitingPayment,
    PaymentPending,
    PaymentFailed,
}

/// Terminal report from the payment widget. The widget's four callbacks
/// collapse into this one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Pending,
    Error,
    Closed,
}

/// Token issued by the backend after a stored registration, consumed by
/// the widget. Lives until the payment succeeds or the form is reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub token: String,
    pub settled: bool,
}

#[derive(Debug)]
pub struct RegistrationSession {
    pub id: Uuid,
    pub phase: Phase,
    pub competition: Option<Competition>,
    pub team_name: String,
    pub school: String,
    pub email: String,
    pub whatsapp: String,
    pub roster: Roster,
    pub payment: Option<PaymentSession>,
    touched_at: Instant,
}

impl RegistrationSession {
    /// Opening the form takes the session straight from Idle to Editing.
    pub fn open() -> Self {
        Self {
            id: Uuid::now_v7(),
            phase: Phase::Editing,
            competition: None,
            team_name: String::new(),
            school: String::new(),
            email: String::new(),
            whatsapp: String::new(),
            roster: Roster::default(),
            payment: None,
            touched_at: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.touched_at = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.touched_at.elapsed()
    }

    fn ensure_editing(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Editing => Ok(()),
            Phase::Submitting => Err(Error::SubmitInFlight),
            _ => Err(Error::NotEditing),
        }
    }

    /// Selecting a different competition invalidates every prior roster
    /// entry: caps and the school exemption differ between competitions.
    pub fn select_competition(&mut self, competition: Option<Competition>) -> Result<(), Error> {
        self.ensure_editing()?;
        if self.competition == competition {
            return Ok(());
        }
        debug!(
            "session {}: competition changed to {:?}, clearing roster",
            self.id,
            competition.as_ref().map(|c| c.name.as_str())
        );
        self.competition = competition;
        self.roster.clear();
        Ok(())
    }

    pub fn add_member(&mut self) -> Result<(), Error> {
        self.ensure_editing()?;
        let competition = self.competition.as_ref().ok_or_else(|| {
            Error::Core(CoreError::Validation(
                "pilih kompetisi terlebih dahulu".into(),
            ))
        })?;
        self.roster.add_member(competition).map_err(Error::Core)
    }

    pub fn remove_member(&mut self, index: usize) -> Result<(), Error> {
        self.ensure_editing()?;
        self.roster.remove_member(index);
        Ok(())
    }

    pub fn add_official(&mut self, role: OfficialRole) -> Result<(), Error> {
        self.ensure_editing()?;
        self.roster.add_official(role);
        Ok(())
    }

    pub fn remove_official(&mut self, index: usize) -> Result<(), Error> {
        self.ensure_editing()?;
        self.roster.remove_official(index);
        Ok(())
    }

    pub fn update_leader(&mut self, field: PersonField) {
        self.roster.update_leader(field);
    }

    pub fn update_member(&mut self, index: usize, field: PersonField) {
        self.roster.update_member(index, field);
    }

    pub fn update_official(&mut self, index: usize, field: OfficialField) {
        self.roster.update_official(index, field);
    }

    pub fn total_fee(&self) -> u64 {
        rules::total_fee(self.competition.as_ref(), self.roster.members.len())
    }

    /// Assembles the aggregate the submission client sends.
    pub fn draft(&self) -> RegistrationDraft {
        RegistrationDraft {
            competition: self.competition.clone(),
            team_name: self.team_name.clone(),
            leader: self.roster.leader.clone(),
            members: self.roster.members.clone(),
            officials: self.roster.officials.clone(),
            school: match self.school.trim() {
                "" => None,
                school => Some(school.to_string()),
            },
            email: self.email.clone(),
            whatsapp: self.whatsapp.clone(),
            total_fee: self.total_fee(),
        }
    }

    /// Editing -> Submitting, after the draft passes required-field
    /// validation. Returns the validated draft for the submission client.
    pub fn begin_submit(&mut self) -> Result<RegistrationDraft, Error> {
        self.ensure_editing()?;
        let draft = self.draft();
        validate_draft(&draft)?;
        self.phase = Phase::Submitting;
        Ok(draft)
    }

    /// Submitting -> Editing. Everything entered is retained for a retry.
    pub fn submit_failed(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::Editing;
        }
    }

    /// Submitting -> AwaitingPayment with a live payment session.
    pub fn submit_succeeded(&mut self, token: String) {
        self.payment = Some(PaymentSession {
            token,
            settled: false,
        });
        self.phase = Phase::AwaitingPayment;
    }

    /// Applies the widget's terminal report. Success resets the whole
    /// session; pending and failure keep the draft and token around.
    pub fn payment_outcome(&mut self, outcome: PaymentOutcome) -> Result<(), Error> {
        if self.phase != Phase::AwaitingPayment {
            return Err(Error::NoPaymentSession);
        }
        match outcome {
            PaymentOutcome::Success => {
                if let Some(payment) = &mut self.payment {
                    payment.settled = true;
                }
                info!("session {}: payment confirmed, resetting form", self.id);
                self.reset();
            }
            PaymentOutcome::Pending => self.phase = Phase::PaymentPending,
            PaymentOutcome::Error | PaymentOutcome::Closed => self.phase = Phase::PaymentFailed,
        }
        Ok(())
    }

    /// Re-invokes the widget with the retained token.
    pub fn retry_payment(&mut self) -> Result<String, Error> {
        match (self.phase, &self.payment) {
            (Phase::PaymentPending | Phase::PaymentFailed, Some(payment)) => {
                self.phase = Phase::AwaitingPayment;
                Ok(payment.token.clone())
            }
            _ => Err(Error::NoPaymentSession),
        }
    }

    /// The modal may not be dismissed while a submission or payment
    /// attempt is in flight.
    pub fn can_dismiss(&self) -> bool {
        !matches!(self.phase, Phase::Submitting | Phase::AwaitingPayment)
    }

    pub fn dismiss(&self) -> Result<(), Error> {
        if self.can_dismiss() {
            Ok(())
        } else {
            Err(Error::DismissBlocked)
        }
    }

    /// Back to the empty initial state: selection, roster, contact fields,
    /// and token all cleared.
    pub fn reset(&mut self) {
        self.competition = None;
        self.team_name.clear();
        self.school.clear();
        self.email.clear();
        self.whatsapp.clear();
        self.roster.clear();
        self.payment = None;
        self.phase = Phase::Idle;
    }
}

/// All open registration sessions. Single process, no persistence; a
/// dropped session just means the visitor starts the form over.
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, RegistrationSession>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> Uuid {
        let session = RegistrationSession::open();
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        id
    }

    pub fn sessions(&self) -> &RwLock<HashMap<Uuid, RegistrationSession>> {
        &self.sessions
    }

    pub async fn remove(&self, id: &Uuid) {
        self.sessions.write().await.remove(id);
    }

    /// Drops sessions idle past the cutoff. Returns how many were removed.
    pub async fn sweep(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for() < max_idle);
        before - sessions.len()
    }
}

/// Background task that periodically drops abandoned sessions, so the
/// in-memory attachments do not accumulate for the whole event window.
pub struct SessionSweeper {
    sessions: std::sync::Arc<SessionManager>,
    cancel_token: CancellationToken,
    interval: Duration,
    max_idle: Duration,
}

impl SessionSweeper {
    pub fn new(
        sessions: std::sync::Arc<SessionManager>,
        cancel_token: CancellationToken,
        interval: Duration,
        max_idle: Duration,
    ) -> Self {
        Self {
            sessions,
            cancel_token,
            interval,
            max_idle,
        }
    }

    pub async fn watch(&self) -> Result<(), anyhow::Error> {
        info!("Starting session sweeper");
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Session sweeper shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {
                    let dropped = self.sessions.sweep(self.max_idle).await;
                    if dropped > 0 {
                        debug!("dropped {dropped} idle registration sessions");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::Attachment;

    fn competition(name: &str) -> Competition {
        Competition::named(name, 150_000)
    }

    fn attachment() -> Attachment {
        Attachment::new("doc.pdf", "application/pdf", vec![0u8; 8])
    }

    fn filled_session(comp_name: &str) -> RegistrationSession {
        let mut session = RegistrationSession::open();
        session
            .select_competition(Some(competition(comp_name)))
            .unwrap();
        session.team_name = "Garuda".into();
        session.school = "SMA 3".into();
        session.email = "kapten@example.com".into();
        session.whatsapp = "0812000".into();
        session.update_leader(PersonField::Name("Sinta".into()));
        session.update_leader(PersonField::Phone("0812111".into()));
        session.update_leader(PersonField::Photo(attachment()));
        session.update_leader(PersonField::Surat(attachment()));
        session.update_leader(PersonField::Pakta(attachment()));
        session
    }

    #[test]
    fn test_switching_competition_clears_roster_unconditionally() {
        let mut session = filled_session("Band");
        session.add_member().unwrap();
        session.add_official(OfficialRole::Coach).unwrap();

        session
            .select_competition(Some(competition("Basket Putra")))
            .unwrap();

        assert!(session.roster.leader.name.is_empty());
        assert!(session.roster.members.is_empty());
        assert!(session.roster.officials.is_empty());
    }

    #[test]
    fn test_reselecting_same_competition_keeps_roster() {
        let mut session = filled_session("Band");
        session.add_member().unwrap();

        session.select_competition(Some(competition("Band"))).unwrap();

        assert_eq!(session.roster.members.len(), 1);
        assert_eq!(session.roster.leader.name, "Sinta");
    }

    #[test]
    fn test_member_cap_rejection_leaves_roster_unchanged() {
        let mut session = filled_session("E-sport MLBB SMA");
        for _ in 0..6 {
            session.add_member().unwrap();
        }

        assert!(session.add_member().is_err());
        assert_eq!(session.roster.members.len(), 6);
    }

    #[test]
    fn test_submit_failure_retains_draft() {
        let mut session = filled_session("Band");
        session.add_member().unwrap();
        session.update_member(0, PersonField::Name("Joko".into()));
        session.update_member(0, PersonField::Phone("0812222".into()));
        session.update_member(0, PersonField::Photo(attachment()));
        session.update_member(0, PersonField::Surat(attachment()));
        session.update_member(0, PersonField::Pakta(attachment()));

        let before = session.draft();
        session.begin_submit().unwrap();
        assert_eq!(session.phase, Phase::Submitting);

        session.submit_failed();

        assert_eq!(session.phase, Phase::Editing);
        let after = session.draft();
        assert_eq!(after.team_name, before.team_name);
        assert_eq!(after.members.len(), before.members.len());
        assert_eq!(after.leader, before.leader);
    }

    #[test]
    fn test_double_submit_is_rejected() {
        let mut session = filled_session("Band");
        session.begin_submit().unwrap();
        assert!(matches!(session.begin_submit(), Err(Error::SubmitInFlight)));
    }

    #[test]
    fn test_incomplete_draft_cannot_be_submitted() {
        let mut session = filled_session("Basket Putra");
        session.school.clear();
        assert!(session.begin_submit().is_err());
        assert_eq!(session.phase, Phase::Editing);
    }

    #[test]
    fn test_successful_payment_resets_everything() {
        let mut session = filled_session("Band");
        session.begin_submit().unwrap();
        session.submit_succeeded("tok-1".into());
        assert_eq!(session.phase, Phase::AwaitingPayment);

        session.payment_outcome(PaymentOutcome::Success).unwrap();

        assert_eq!(session.phase, Phase::Idle);
        assert!(session.competition.is_none());
        assert!(session.team_name.is_empty());
        assert!(session.roster.members.is_empty());
        assert!(session.payment.is_none());
    }

    #[test]
    fn test_pending_and_failed_retain_token_for_retry() {
        for outcome in [PaymentOutcome::Pending, PaymentOutcome::Closed] {
            let mut session = filled_session("Band");
            session.begin_submit().unwrap();
            session.submit_succeeded("tok-1".into());
            session.payment_outcome(outcome).unwrap();

            let token = session.retry_payment().unwrap();
            assert_eq!(token, "tok-1");
            assert_eq!(session.phase, Phase::AwaitingPayment);
            assert_eq!(session.team_name, "Garuda");
        }
    }

    #[test]
    fn test_dismissal_blocked_while_in_flight() {
        let mut session = filled_session("Band");
        session.begin_submit().unwrap();
        assert!(session.dismiss().is_err());

        session.submit_succeeded("tok-1".into());
        assert!(session.dismiss().is_err());

        session.payment_outcome(PaymentOutcome::Error).unwrap();
        assert!(session.dismiss().is_ok());
    }

    #[test]
    fn test_editing_locked_while_submitting() {
        let mut session = filled_session("Band");
        session.begin_submit().unwrap();
        assert!(matches!(session.add_member(), Err(Error::SubmitInFlight)));
        assert!(matches!(
            session.select_competition(None),
            Err(Error::SubmitInFlight)
        ));
    }

    #[tokio::test]
    async fn test_sweep_drops_only_idle_sessions() {
        let manager = SessionManager::new();
        let id = manager.create().await;

        assert_eq!(manager.sweep(Duration::from_secs(60)).await, 0);
        assert_eq!(manager.sweep(Duration::ZERO).await, 1);
        assert!(!manager.sessions().read().await.contains_key(&id));
    }
}
