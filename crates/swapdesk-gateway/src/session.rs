//! OTP session gate.
//!
//! Issues and verifies the short-lived sessions that gate logins and
//! value-moving operations. A session only exists once its code has
//! been mailed; verification consumes it; expiry is lazy, checked at
//! verification time rather than by a sweeper. Expired, consumed, and
//! never-issued sessions are indistinguishable to callers.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use swapdesk_types::{
    Result, Session, SessionConfig, SessionId, SessionKind, SwapdeskError, UserId,
    WithdrawalReason, constants,
};
use tracing::{info, warn};

use crate::notify::DynMailSink;

/// Outcome of the first login verification stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Login is done; the session is consumed.
    Complete,
    /// A fresh code was mailed; call `verify_second_factor` next.
    SecondFactorRequired,
}

/// Issues, verifies, and consumes OTP sessions.
pub struct SessionGate {
    mail: DynMailSink,
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
    config: SessionConfig,
}

impl SessionGate {
    #[must_use]
    pub fn new(mail: DynMailSink, config: SessionConfig) -> Self {
        Self {
            mail,
            sessions: DashMap::new(),
            config,
        }
    }

    /// Start a login session: mail a code, then store the session.
    /// Nothing is stored if the mail fails.
    ///
    /// # Errors
    /// `ExternalNetwork` if the code could not be mailed.
    pub async fn start_login(
        &self,
        user_id: UserId,
        email: impl Into<String>,
        requires_second_factor: bool,
    ) -> Result<SessionId> {
        self.issue(
            user_id,
            email.into(),
            SessionKind::Login {
                requires_second_factor,
            },
        )
        .await
    }

    /// Start a withdrawal session for the given reason.
    ///
    /// # Errors
    /// `ExternalNetwork` if the code could not be mailed.
    pub async fn start_withdrawal(
        &self,
        user_id: UserId,
        email: impl Into<String>,
        reason: WithdrawalReason,
    ) -> Result<SessionId> {
        self.issue(user_id, email.into(), SessionKind::Withdrawal { reason })
            .await
    }

    /// First login stage. On a match, either consumes the session or
    /// mails a second-stage code.
    ///
    /// # Errors
    /// `SessionExpiredOrMissing`, `InvalidCode`, `OtpAttemptsExhausted`,
    /// or `ExternalNetwork` if the second-stage code could not be mailed.
    pub async fn verify_login(&self, session_id: SessionId, code: &str) -> Result<LoginOutcome> {
        let handle = self.usable_handle(session_id)?;

        // First stage entirely under the lock. The guard must not
        // survive into the mail send below.
        let email = {
            let mut session = handle.lock();
            if !session.is_usable_at(Utc::now()) {
                return Err(SwapdeskError::SessionExpiredOrMissing(session_id));
            }
            let SessionKind::Login {
                requires_second_factor,
            } = session.kind
            else {
                return Err(SwapdeskError::unauthorized(
                    "session does not authorize login",
                ));
            };

            self.check_code(&mut session, code)?;
            session.code_verified = true;

            if !requires_second_factor || session.second_factor_verified {
                session.active = false;
                info!(session = %session_id, user = %session.user_id, "login verified");
                return Ok(LoginOutcome::Complete);
            }
            session.email.clone()
        };

        // Fresh code for the second stage; the attempt counter is
        // shared across both stages.
        let next_code = generate_code();
        if let Err(err) = self.mail.send_otp(email, next_code.clone()).await {
            // Roll back the first stage, otherwise the already-known
            // first code would satisfy verify_second_factor.
            handle.lock().code_verified = false;
            return Err(SwapdeskError::ExternalNetwork { reason: err.reason });
        }
        handle.lock().code = next_code;
        Ok(LoginOutcome::SecondFactorRequired)
    }

    /// Second login stage. Consumes the session on success.
    ///
    /// # Errors
    /// `SessionExpiredOrMissing`, `Validation` if the first stage has
    /// not passed, `InvalidCode`, or `OtpAttemptsExhausted`.
    pub fn verify_second_factor(&self, session_id: SessionId, code: &str) -> Result<()> {
        let handle = self.usable_handle(session_id)?;
        let mut session = handle.lock();
        if !session.is_usable_at(Utc::now()) {
            return Err(SwapdeskError::SessionExpiredOrMissing(session_id));
        }
        if !session.code_verified {
            return Err(SwapdeskError::validation(
                "first login stage has not been verified",
            ));
        }

        self.check_code(&mut session, code)?;
        session.second_factor_verified = true;
        session.active = false;
        info!(session = %session_id, user = %session.user_id, "second factor verified");
        Ok(())
    }

    /// Verify and consume a withdrawal session. The session must belong
    /// to `user_id` and carry exactly `reason`.
    ///
    /// # Errors
    /// `SessionExpiredOrMissing`, `Unauthorized` on a user or reason
    /// mismatch, `InvalidCode`, or `OtpAttemptsExhausted`.
    pub fn verify_withdrawal(
        &self,
        session_id: SessionId,
        user_id: UserId,
        reason: WithdrawalReason,
        code: &str,
    ) -> Result<()> {
        let handle = self.usable_handle(session_id)?;
        let mut session = handle.lock();
        if !session.is_usable_at(Utc::now()) {
            return Err(SwapdeskError::SessionExpiredOrMissing(session_id));
        }
        if session.user_id != user_id {
            return Err(SwapdeskError::unauthorized(
                "session belongs to a different user",
            ));
        }
        if session.kind != (SessionKind::Withdrawal { reason }) {
            return Err(SwapdeskError::unauthorized(format!(
                "session does not authorize {reason}"
            )));
        }

        self.check_code(&mut session, code)?;
        session.code_verified = true;
        session.active = false;
        info!(session = %session_id, user = %user_id, %reason, "withdrawal session verified");
        Ok(())
    }

    /// Drop expired and consumed sessions from the store. Purely a
    /// memory reclaim; lazy expiry makes it optional for correctness.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions
            .retain(|_, handle| handle.lock().is_usable_at(now));
    }

    /// Snapshot of a session, expired or not. Test and admin use.
    #[must_use]
    pub fn session(&self, session_id: SessionId) -> Option<Session> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.lock().clone())
    }

    async fn issue(&self, user_id: UserId, email: String, kind: SessionKind) -> Result<SessionId> {
        let code = generate_code();
        self.mail
            .send_otp(email.clone(), code.clone())
            .await
            .map_err(|err| SwapdeskError::ExternalNetwork { reason: err.reason })?;

        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            user_id,
            email,
            kind,
            code,
            code_verified: false,
            second_factor_verified: false,
            active: true,
            attempts: 0,
            expires_at: now + self.config.ttl(),
            created_at: now,
        };
        let id = session.id;
        info!(session = %id, user = %user_id, "session issued");
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        Ok(id)
    }

    fn usable_handle(&self, session_id: SessionId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.clone())
            .ok_or(SwapdeskError::SessionExpiredOrMissing(session_id))
    }

    /// Case-sensitive code check, counting failures against the shared
    /// attempt budget. Must be called with the session lock held.
    fn check_code(&self, session: &mut Session, code: &str) -> Result<()> {
        if session.code == code {
            return Ok(());
        }
        session.attempts += 1;
        if session.attempts >= self.config.max_attempts {
            session.active = false;
            warn!(session = %session.id, "otp attempts exhausted");
            return Err(SwapdeskError::OtpAttemptsExhausted(session.id));
        }
        Err(SwapdeskError::InvalidCode)
    }
}

/// A fresh numeric one-time code.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..constants::OTP_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
