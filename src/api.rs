use crate::telemetry::{Breadcrumb, Level, LogRecord, Span, TelemetryMessage, TelemetrySink};
use crate::validation::{has_errors, validate_signup, SignupFields, ValidationErrors};
use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Body posted to the signup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Declared HTTP response: status plus the fields the endpoint may return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupResponse {
    pub status: u16,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
}

impl SignupResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn created(user_id: String) -> Self {
        Self {
            status: 201,
            user_id: Some(user_id),
            error: None,
            details: None,
        }
    }

    fn declared_error(status: u16, error: &str) -> Self {
        Self {
            status,
            user_id: None,
            error: Some(error.to_string()),
            details: None,
        }
    }
}

/// The request never completed: no status line, no body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// The remote signup endpoint as the orchestrator sees it. The call is the
/// session's only suspension point; implementations may block.
pub trait SignupApi {
    fn call(&mut self, req: &SignupRequest) -> Result<SignupResponse, TransportError>;
}

/// In-process stand-in for the signup backend. Runs the same pipeline the
/// real route would (parse, re-validate, persist, welcome email) with a
/// configurable delay and a synthetic duplicate-email conflict.
pub struct SimulatedApi {
    sink: Arc<dyn TelemetrySink>,
    rng: StdRng,
    persist_delay: Duration,
    email_delay: Duration,
    conflict_rate: f64,
    force_fault: bool,
    force_malformed: bool,
    fail_transport: bool,
}

impl SimulatedApi {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink,
            rng: StdRng::from_entropy(),
            persist_delay: Duration::from_millis(150),
            email_delay: Duration::from_millis(50),
            conflict_rate: 0.1,
            force_fault: false,
            force_malformed: false,
            fail_transport: false,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_conflict_rate(mut self, rate: f64) -> Self {
        self.conflict_rate = rate;
        self
    }

    pub fn without_delays(mut self) -> Self {
        self.persist_delay = Duration::ZERO;
        self.email_delay = Duration::ZERO;
        self
    }

    pub fn with_persist_delay(mut self, delay: Duration) -> Self {
        self.persist_delay = delay;
        self
    }

    pub fn with_email_delay(mut self, delay: Duration) -> Self {
        self.email_delay = delay;
        self
    }

    /// Every call ends in a 500.
    pub fn with_server_fault(mut self) -> Self {
        self.force_fault = true;
        self
    }

    /// The request body arrives undecodable; every call ends in a 400.
    pub fn with_malformed_body(mut self) -> Self {
        self.force_malformed = true;
        self
    }

    /// The request never reaches the server.
    pub fn with_transport_failure(mut self) -> Self {
        self.fail_transport = true;
        self
    }

    fn emit(&self, msg: TelemetryMessage) {
        self.sink.emit(msg);
    }

    fn root_span(&self, outcome: &str) -> Span {
        Span::new("POST /api/signup", "http.server").attr("signup.outcome", outcome)
    }
}

impl SignupApi for SimulatedApi {
    fn call(&mut self, req: &SignupRequest) -> Result<SignupResponse, TransportError> {
        if self.fail_transport {
            return Err(TransportError("connection reset by peer".into()));
        }

        self.emit(TelemetryMessage::Span(Span::new(
            "signup.parse_body",
            "serialize.parse",
        )));
        if self.force_malformed {
            self.emit(TelemetryMessage::Log(LogRecord::warn(
                "Signup API received malformed JSON",
            )));
            self.emit(TelemetryMessage::Span(self.root_span("bad_request")));
            return Ok(SignupResponse::declared_error(400, "Invalid request body."));
        }

        // Server-side re-validation, confirm mirrored from password.
        let fields = SignupFields {
            name: req.name.clone(),
            email: req.email.clone(),
            password: req.password.clone(),
            confirm_password: req.password.clone(),
        };
        self.emit(TelemetryMessage::Span(
            Span::new("signup.server_validate", "validate")
                .attr("validate.has_name", !req.name.is_empty())
                .attr("validate.has_email", !req.email.is_empty())
                .attr("validate.has_password", !req.password.is_empty()),
        ));
        let validation_errors = validate_signup(&fields);
        if has_errors(&validation_errors) {
            let failed = validation_errors.keys().join(",");
            self.emit(TelemetryMessage::Breadcrumb(
                Breadcrumb::new(
                    "signup.server_validation",
                    "Server-side validation failed",
                    Level::Warning,
                )
                .datum("fields", failed.clone()),
            ));
            self.emit(TelemetryMessage::Log(
                LogRecord::warn("signup.server_validation_failure").field("fields", failed.clone()),
            ));
            self.emit(TelemetryMessage::Span(
                self.root_span("validation_error")
                    .attr("signup.validation_errors", failed),
            ));
            return Ok(SignupResponse {
                status: 422,
                user_id: None,
                error: Some("Validation failed.".to_string()),
                details: Some(validation_errors),
            });
        }

        // Persist phase: fixed latency plus a synthetic duplicate roll.
        if !self.persist_delay.is_zero() {
            std::thread::sleep(self.persist_delay);
        }
        self.emit(TelemetryMessage::Span(
            Span::new("signup.persist_user", "db").attr("db.system", "simulated"),
        ));

        if self.force_fault {
            self.emit(TelemetryMessage::Log(
                LogRecord::error("signup.persist_failed")
                    .field("flow", "signup")
                    .field("step", "persist_user"),
            ));
            self.emit(TelemetryMessage::Span(self.root_span("internal_error")));
            return Ok(SignupResponse::declared_error(
                500,
                "An unexpected error occurred.",
            ));
        }

        if self.rng.gen::<f64>() < self.conflict_rate {
            self.emit(TelemetryMessage::Breadcrumb(Breadcrumb::new(
                "signup.conflict",
                "Duplicate email detected",
                Level::Warning,
            )));
            self.emit(TelemetryMessage::Log(
                LogRecord::warn("signup.duplicate_email").field("email", req.email.clone()),
            ));
            self.emit(TelemetryMessage::Span(self.root_span("conflict")));
            return Ok(SignupResponse::declared_error(
                409,
                "A user with this email already exists.",
            ));
        }

        let user_id = format!("user_{:08x}", self.rng.gen::<u32>());

        if !self.email_delay.is_zero() {
            std::thread::sleep(self.email_delay);
        }
        self.emit(TelemetryMessage::Span(Span::new(
            "signup.send_welcome_email",
            "email.send",
        )));

        self.emit(TelemetryMessage::Breadcrumb(Breadcrumb::new(
            "signup.complete",
            format!("New user created: {user_id}"),
            Level::Info,
        )));
        self.emit(TelemetryMessage::Log(
            LogRecord::info("signup.user_created").field("userId", user_id.clone()),
        ));
        self.emit(TelemetryMessage::Span(
            self.root_span("success").attr("signup.user_id", user_id.clone()),
        ));

        Ok(SignupResponse::created(user_id))
    }
}
