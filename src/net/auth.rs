//! Signup step machine and login validation.
//!
//! Signup walks three linear steps: identity fields, code verification, final
//! submission. The machine itself is pure — every network result is applied
//! through an explicit `apply_*` transition, so the flow is testable without
//! a service. [`AuthFlow`] wires the machine to the live API and the session
//! store.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::app::session::{SessionError, SessionStore};
use crate::net::client::{
    Ack, ApiClient, ApiError, RegisterRequest, RegisterResponse, SendOtpRequest, VerifyOtpRequest,
};

/// Exact length of a verification code.
pub const OTP_LEN: usize = 6;

/// Seconds counted down after a successful registration before control
/// returns to the caller.
pub const REDIRECT_COUNTDOWN_SECS: u64 = 5;

/// Status message after the code was dispatched.
const OTP_SENT_MESSAGE: &str = "OTP sent successfully! Please check your email.";
/// Status message when dispatching the code failed. Non-blocking: the user
/// can still go back or retry.
const OTP_SEND_FAILED_MESSAGE: &str = "Could not send OTP. Please try again.";
/// Status message on a positive verification.
const OTP_VERIFIED_MESSAGE: &str = "OTP VERIFIED";
/// Status message on a negative verification.
const OTP_FAILED_MESSAGE: &str = "OTP VERIFICATION FAILED";
/// Login validation message for missing fields.
const LOGIN_MISSING_FIELDS: &str = "Please enter username and password.";
/// Fallback when registration fails without a server message.
const REGISTER_FAILED_MESSAGE: &str = "Registration failed. Please try again.";

/// Errors surfaced by signup and login drivers.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// A transition was attempted that the current step refuses.
    #[error("invalid step transition: {0}")]
    InvalidTransition(&'static str),

    /// Screen-level validation failed; the message is user-facing.
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What applying a registration response decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The service accepted the registration; the token (if any) must be
    /// persisted and the redirect countdown follows.
    Accepted { token: Option<String> },
    /// The service refused; the failure message is on the form.
    Refused,
}

/// The three signup steps, strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignupStep {
    #[default]
    Info,
    Verify,
    Submit,
}

/// Where the verification code stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtpStatus {
    /// No code requested yet (or the request failed).
    #[default]
    Idle,
    /// Code dispatched, awaiting entry.
    Sent,
    /// Code accepted; the forward transition is unlocked.
    Success,
    /// Code rejected; the user must retry.
    Error,
}

/// The signup form and its step machine.
#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub otp_code: String,

    step: SignupStep,
    otp_status: OtpStatus,
    message: Option<String>,
    submitting: bool,
}

impl SignupForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the current step.
    #[inline]
    #[must_use]
    pub fn step(&self) -> SignupStep {
        self.step
    }

    /// Gets the verification status.
    #[inline]
    #[must_use]
    pub fn otp_status(&self) -> OtpStatus {
        self.otp_status
    }

    /// The current user-facing status message, if any.
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true while the final submission is in flight.
    #[inline]
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Identity fields are complete and the passwords agree.
    #[must_use]
    pub fn info_valid(&self) -> bool {
        !self.username.is_empty()
            && !self.name.is_empty()
            && !self.email.is_empty()
            && !self.password.is_empty()
            && !self.confirm_password.is_empty()
            && self.password == self.confirm_password
    }

    /// The verify action is enabled only for a full-length code.
    #[inline]
    #[must_use]
    pub fn can_verify(&self) -> bool {
        self.otp_code.len() == OTP_LEN
    }

    /// Advances `Info → Verify`. Refused until [`Self::info_valid`] holds.
    /// The caller dispatches the send-code request on success.
    pub fn next_from_info(&mut self) -> Result<SendOtpRequest, AuthError> {
        if self.step != SignupStep::Info {
            return Err(AuthError::InvalidTransition("not at the identity step"));
        }
        if !self.info_valid() {
            return Err(AuthError::Validation(
                "all fields are required and passwords must match",
            ));
        }
        self.step = SignupStep::Verify;
        Ok(SendOtpRequest {
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }

    /// Advances `Verify → Submit`. Refused until the code was accepted.
    pub fn next_from_verify(&mut self) -> Result<(), AuthError> {
        if self.step != SignupStep::Verify {
            return Err(AuthError::InvalidTransition("not at the verification step"));
        }
        if self.otp_status != OtpStatus::Success {
            return Err(AuthError::Validation("verify the code first"));
        }
        self.step = SignupStep::Submit;
        Ok(())
    }

    /// Steps back one step, clearing verification status and message.
    pub fn previous(&mut self) {
        self.step = match self.step {
            SignupStep::Info | SignupStep::Verify => SignupStep::Info,
            SignupStep::Submit => SignupStep::Verify,
        };
        self.otp_status = OtpStatus::Idle;
        self.message = None;
    }

    /// Builds the verification payload. Refused for a partial code.
    pub fn verify_request(&self) -> Result<VerifyOtpRequest, AuthError> {
        if !self.can_verify() {
            return Err(AuthError::Validation("enter the full 6-digit code"));
        }
        Ok(VerifyOtpRequest {
            otpcode: self.otp_code.clone(),
            email: self.email.clone(),
        })
    }

    /// Builds the registration payload.
    #[must_use]
    pub fn register_request(&self) -> RegisterRequest {
        RegisterRequest {
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            password_confirmation: self.confirm_password.clone(),
        }
    }

    /// Applies the outcome of the send-code request.
    ///
    /// Failures do not block the machine; the user sees a notice and can
    /// retry or go back.
    pub fn apply_send_result(&mut self, result: Result<Ack, ApiError>) {
        match result {
            Ok(ack) if ack.success => {
                self.otp_status = OtpStatus::Sent;
                self.message = Some(OTP_SENT_MESSAGE.to_string());
            }
            Ok(ack) => {
                warn!(message = ?ack.message, "send-otp refused by service");
                self.message = Some(
                    ack.message
                        .unwrap_or_else(|| OTP_SEND_FAILED_MESSAGE.to_string()),
                );
            }
            Err(e) => {
                warn!(error = %e, "send-otp request failed");
                self.message = Some(OTP_SEND_FAILED_MESSAGE.to_string());
            }
        }
    }

    /// Applies the outcome of the verification request.
    pub fn apply_verify_result(&mut self, result: Result<Ack, ApiError>) {
        match result {
            Ok(ack) if ack.success => {
                self.otp_status = OtpStatus::Success;
                self.message = Some(OTP_VERIFIED_MESSAGE.to_string());
            }
            Ok(_) | Err(_) => {
                self.otp_status = OtpStatus::Error;
                self.message = Some(OTP_FAILED_MESSAGE.to_string());
            }
        }
    }

    /// Applies the outcome of the registration request.
    ///
    /// Acceptance keeps `submitting` raised — the overlay stays up through
    /// the redirect countdown. Refusal and transport errors lower it so the
    /// user can correct and resubmit; refusal puts the server-provided (or
    /// generic) message on the form, transport errors propagate.
    pub fn apply_register_result(
        &mut self,
        result: Result<RegisterResponse, ApiError>,
    ) -> Result<RegisterOutcome, ApiError> {
        match result {
            Ok(response) if response.success => Ok(RegisterOutcome::Accepted {
                token: response.data.and_then(|d| d.token),
            }),
            Ok(response) => {
                self.submitting = false;
                self.message = Some(
                    response
                        .message
                        .unwrap_or_else(|| REGISTER_FAILED_MESSAGE.to_string()),
                );
                Ok(RegisterOutcome::Refused)
            }
            Err(e) => {
                self.submitting = false;
                Err(e)
            }
        }
    }
}

/// The login form. Validation is screen-level only; the service has no login
/// endpoint yet.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    /// Both fields present, or the fixed error message.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation(LOGIN_MISSING_FIELDS));
        }
        Ok(())
    }
}

/// Drives the signup machine against the live API and session store.
#[derive(Debug, Clone)]
pub struct AuthFlow {
    client: ApiClient,
    session: SessionStore,
}

impl AuthFlow {
    #[must_use]
    pub fn new(client: ApiClient, session: SessionStore) -> Self {
        Self { client, session }
    }

    /// Advances past the identity step and dispatches the code.
    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn advance_to_verify(&self, form: &mut SignupForm) -> Result<(), AuthError> {
        let request = form.next_from_info()?;
        let result = self.client.send_otp(&request).await;
        form.apply_send_result(result);
        Ok(())
    }

    /// Verifies the entered code.
    #[instrument(skip_all)]
    pub async fn verify_code(&self, form: &mut SignupForm) -> Result<(), AuthError> {
        let request = form.verify_request()?;
        let result = self.client.verify_otp(&request).await;
        form.apply_verify_result(result);
        Ok(())
    }

    /// Submits the registration, persists the returned token, and runs the
    /// redirect countdown. `on_tick` sees the seconds remaining, from
    /// [`REDIRECT_COUNTDOWN_SECS`] down to 1, once per second.
    #[instrument(skip_all, fields(username = %form.username))]
    pub async fn submit(
        &self,
        form: &mut SignupForm,
        on_tick: impl Fn(u64),
    ) -> Result<(), AuthError> {
        if form.step() != SignupStep::Submit {
            return Err(AuthError::InvalidTransition("not at the submission step"));
        }
        if form.submitting {
            return Err(AuthError::InvalidTransition("submission already in flight"));
        }

        form.submitting = true;
        let result = self.client.register(&form.register_request()).await;
        match form.apply_register_result(result)? {
            RegisterOutcome::Refused => Ok(()),
            RegisterOutcome::Accepted { token } => {
                if let Some(token) = token {
                    self.session.set_token(token).await?;
                }
                info!(username = %form.username, "registration complete");

                run_redirect_countdown(on_tick).await;
                form.submitting = false;
                Ok(())
            }
        }
    }

    /// Validates the login form and records the identity locally.
    #[instrument(skip_all, fields(username = %form.username))]
    pub async fn login(&self, form: &LoginForm) -> Result<(), AuthError> {
        form.validate()?;
        self.session
            .set_user(form.username.clone(), form.username.clone())
            .await?;
        info!("logged in");
        Ok(())
    }
}

/// Ticks the post-registration countdown once per second. Uninterruptible;
/// the overlay stays up until it runs out.
async fn run_redirect_countdown(on_tick: impl Fn(u64)) {
    for remaining in (1..=REDIRECT_COUNTDOWN_SECS).rev() {
        on_tick(remaining);
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> SignupForm {
        SignupForm {
            username: "ada".into(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            password: "secret".into(),
            confirm_password: "secret".into(),
            ..SignupForm::default()
        }
    }

    fn ok_ack() -> Result<Ack, ApiError> {
        Ok(Ack {
            success: true,
            message: None,
        })
    }

    fn refused_ack() -> Result<Ack, ApiError> {
        Ok(Ack {
            success: false,
            message: None,
        })
    }

    #[test]
    fn info_step_requires_matching_passwords() {
        let mut form = filled_form();
        form.confirm_password = "different".into();
        assert!(!form.info_valid());
        assert!(form.next_from_info().is_err());
        assert_eq!(form.step(), SignupStep::Info);
    }

    #[test]
    fn info_step_requires_every_field() {
        for field in ["username", "name", "email", "password", "confirm"] {
            let mut form = filled_form();
            match field {
                "username" => form.username.clear(),
                "name" => form.name.clear(),
                "email" => form.email.clear(),
                "password" => form.password.clear(),
                _ => form.confirm_password.clear(),
            }
            assert!(!form.info_valid(), "{field} should be required");
        }
    }

    #[test]
    fn valid_info_advances_and_builds_send_payload() {
        let mut form = filled_form();
        let request = form.next_from_info().unwrap();
        assert_eq!(form.step(), SignupStep::Verify);
        assert_eq!(request.email, "ada@example.com");
        assert_eq!(request.username, "ada");
    }

    #[test]
    fn verify_refused_for_partial_code() {
        let mut form = filled_form();
        form.next_from_info().unwrap();

        form.otp_code = "12345".into();
        assert!(!form.can_verify());
        assert!(form.verify_request().is_err());

        form.otp_code = "1234567".into();
        assert!(form.verify_request().is_err());

        form.otp_code = "123456".into();
        assert!(form.verify_request().is_ok());
    }

    #[test]
    fn negative_verification_keeps_step_at_verify() {
        let mut form = filled_form();
        form.next_from_info().unwrap();
        form.otp_code = "123456".into();

        form.apply_verify_result(refused_ack());
        assert_eq!(form.otp_status(), OtpStatus::Error);
        assert_eq!(form.step(), SignupStep::Verify);
        assert_eq!(form.message(), Some(OTP_FAILED_MESSAGE));
        assert!(form.next_from_verify().is_err());
    }

    #[test]
    fn positive_verification_unlocks_submit() {
        let mut form = filled_form();
        form.next_from_info().unwrap();
        form.apply_verify_result(ok_ack());

        assert_eq!(form.otp_status(), OtpStatus::Success);
        assert_eq!(form.message(), Some(OTP_VERIFIED_MESSAGE));
        form.next_from_verify().unwrap();
        assert_eq!(form.step(), SignupStep::Submit);
    }

    #[test]
    fn send_failure_leaves_machine_usable() {
        let mut form = filled_form();
        form.next_from_info().unwrap();

        form.apply_send_result(Err(ApiError::Transport("connection refused".into())));
        assert_eq!(form.step(), SignupStep::Verify);
        assert_eq!(form.otp_status(), OtpStatus::Idle);
        assert_eq!(form.message(), Some(OTP_SEND_FAILED_MESSAGE));
    }

    #[test]
    fn send_refusal_surfaces_service_message() {
        let mut form = filled_form();
        form.next_from_info().unwrap();
        form.apply_send_result(Ok(Ack {
            success: false,
            message: Some("email already registered".into()),
        }));
        assert_eq!(form.message(), Some("email already registered"));
        assert_eq!(form.otp_status(), OtpStatus::Idle);
    }

    #[test]
    fn previous_clears_verification_state() {
        let mut form = filled_form();
        form.next_from_info().unwrap();
        form.apply_verify_result(ok_ack());
        form.next_from_verify().unwrap();

        form.previous();
        assert_eq!(form.step(), SignupStep::Verify);
        assert_eq!(form.otp_status(), OtpStatus::Idle);
        assert_eq!(form.message(), None);

        form.previous();
        assert_eq!(form.step(), SignupStep::Info);
    }

    #[test]
    fn register_payload_carries_confirmation() {
        let form = filled_form();
        let request = form.register_request();
        assert_eq!(request.password_confirmation, "secret");
        assert_eq!(request.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn accepted_registration_hands_back_token_for_persistence() {
        use crate::app::session::SessionStore;
        use crate::net::client::{RegisterData, RegisterResponse};
        use tempfile::TempDir;

        let mut form = filled_form();
        form.submitting = true;

        let outcome = form
            .apply_register_result(Ok(RegisterResponse {
                success: true,
                data: Some(RegisterData {
                    token: Some("fresh-token".into()),
                }),
                message: None,
            }))
            .unwrap();

        let RegisterOutcome::Accepted { token } = outcome else {
            panic!("registration should be accepted");
        };
        // The overlay stays up through the countdown.
        assert!(form.is_submitting());

        let dir = TempDir::new().unwrap();
        let session = SessionStore::load_from(dir.path()).await.unwrap();
        session.set_token(token.unwrap()).await.unwrap();
        assert_eq!(session.token().as_deref(), Some("fresh-token"));
    }

    #[test]
    fn refused_registration_falls_back_to_generic_message() {
        use crate::net::client::RegisterResponse;

        let mut form = filled_form();
        form.submitting = true;

        let outcome = form
            .apply_register_result(Ok(RegisterResponse {
                success: false,
                data: None,
                message: None,
            }))
            .unwrap();
        assert_eq!(outcome, RegisterOutcome::Refused);
        assert!(!form.is_submitting());
        assert_eq!(form.message(), Some(REGISTER_FAILED_MESSAGE));
    }

    #[test]
    fn refused_registration_surfaces_service_message() {
        use crate::net::client::RegisterResponse;

        let mut form = filled_form();
        form.submitting = true;

        form.apply_register_result(Ok(RegisterResponse {
            success: false,
            data: None,
            message: Some("username taken".into()),
        }))
        .unwrap();
        assert_eq!(form.message(), Some("username taken"));
    }

    #[test]
    fn transport_error_lowers_submitting_flag() {
        let mut form = filled_form();
        form.submitting = true;

        let err = form
            .apply_register_result(Err(ApiError::Transport("connection reset".into())))
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(!form.is_submitting());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_five_times_over_five_seconds() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;
        use tokio::time::Instant;

        let ticks = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let ticks_cb = ticks.clone();
        let last = Arc::new(AtomicU64::new(u64::MAX));
        let last_cb = last.clone();
        let started = Instant::now();

        run_redirect_countdown(move |remaining| {
            ticks_cb.lock().push(remaining);
            last_cb.store(remaining, Ordering::SeqCst);
        })
        .await;

        assert_eq!(*ticks.lock(), vec![5, 4, 3, 2, 1]);
        assert_eq!(last.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= std::time::Duration::from_secs(5));
    }

    #[test]
    fn login_requires_both_fields() {
        let form = LoginForm::default();
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), LOGIN_MISSING_FIELDS);

        let form = LoginForm {
            username: "ada".into(),
            password: String::new(),
        };
        assert!(form.validate().is_err());

        let form = LoginForm {
            username: "ada".into(),
            password: "secret".into(),
        };
        assert!(form.validate().is_ok());
    }
}
