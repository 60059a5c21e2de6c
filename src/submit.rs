use crate::api::{SignupApi, SignupRequest};
use crate::clock::Clock;
use crate::metrics::{FormMetrics, FormOutcome};
use crate::telemetry::{Breadcrumb, Level, LogRecord, Span, TelemetryMessage, TelemetrySink};
use crate::validation::{has_errors, validate_signup, SignupFields, ValidationErrors, FIELD_NAMES};
use itertools::Itertools;
use std::sync::Arc;

pub const GENERIC_API_ERROR: &str = "Something went wrong. Please try again.";
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Where the form sits between user actions. `Submitting` exists so a
/// second submit arriving while one is in flight can be rejected;
/// `Succeeded` is the terminal navigated-away state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SubmitState {
    Idle,
    Submitting,
    Succeeded,
}

/// Result of one submit action as the caller sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Ignored: a submission is in flight or the form already succeeded.
    Rejected,
    ValidationFailed(ValidationErrors),
    Success { user_id: String },
    ApiError { status: u16, message: String },
    NetworkError { message: String },
}

/// Drives validation, the remote call and outcome handling for one signup
/// session. Owns the field values, the currently displayed errors and the
/// session metrics; telemetry goes through the injected sink.
pub struct SignupForm<A: SignupApi> {
    fields: SignupFields,
    errors: ValidationErrors,
    server_error: Option<String>,
    state: SubmitState,
    metrics: FormMetrics,
    api: A,
    sink: Arc<dyn TelemetrySink>,
}

impl<A: SignupApi> SignupForm<A> {
    pub fn new(api: A, sink: Arc<dyn TelemetrySink>, clock: Arc<dyn Clock>) -> Self {
        let metrics = FormMetrics::new(&FIELD_NAMES, Arc::clone(&sink), clock);
        Self {
            fields: SignupFields::default(),
            errors: ValidationErrors::new(),
            server_error: None,
            state: SubmitState::Idle,
            metrics,
            api,
            sink,
        }
    }

    pub fn with_sample_every(mut self, sample_every: u32) -> Self {
        self.metrics = self.metrics.with_sample_every(sample_every);
        self
    }

    pub fn with_form_name(mut self, name: impl Into<String>) -> Self {
        self.metrics = self.metrics.with_form_name(name);
        self
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    pub fn fields(&self) -> &SignupFields {
        &self.fields
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn server_error(&self) -> Option<&str> {
        self.server_error.as_deref()
    }

    pub fn metrics(&self) -> &FormMetrics {
        &self.metrics
    }

    /* ---------- UI event stream ---------------------------------- */

    pub fn focus(&mut self, field: &str) {
        self.metrics.track_focus(field);
    }

    pub fn blur(&mut self, field: &str) {
        let value = self.fields.get(field).unwrap_or_default().to_string();
        self.metrics.track_blur(field, &value);
    }

    /// One keystroke's worth of input: store the value, track the change,
    /// and clear any displayed error on the field so the next error diff
    /// observes the correction.
    pub fn input(&mut self, field: &str, value: &str) {
        self.fields.set(field, value);
        self.metrics.track_change(field, value);

        if self.errors.remove(field).is_some() {
            let current = self.errors.clone();
            self.metrics.sync_errors(&current);
        }
    }

    pub fn paste(&mut self, field: &str) {
        self.metrics.track_paste(field);
    }

    /* ---------- submit ------------------------------------------- */

    pub fn submit(&mut self) -> SubmitOutcome {
        if self.state != SubmitState::Idle {
            return SubmitOutcome::Rejected;
        }

        self.server_error = None;
        self.metrics.track_submission_attempt();

        let form = self.metrics.form_name().to_string();

        self.sink.emit(TelemetryMessage::Span(
            Span::new(format!("{form}.validate"), "ui.validate")
                .attr("form.fields_filled", self.fields.filled_count())
                .attr("form.total_fields", FIELD_NAMES.len()),
        ));
        let validation_errors = validate_signup(&self.fields);

        if has_errors(&validation_errors) {
            self.errors = validation_errors.clone();
            self.metrics.sync_errors(&self.errors);

            let error_fields = validation_errors.keys().cloned().collect::<Vec<_>>();
            self.sink.emit(TelemetryMessage::Breadcrumb(
                Breadcrumb::new(
                    format!("{form}.validation"),
                    format!(
                        "Validation failed on fields: {}",
                        error_fields.iter().join(", ")
                    ),
                    Level::Warning,
                )
                .datum("errorFields", error_fields.iter().join(","))
                .datum("errorCount", error_fields.len()),
            ));
            self.sink.emit(TelemetryMessage::Log(
                LogRecord::warn(format!("{form}.validation_failure"))
                    .field("fields", error_fields.iter().sorted().join(","))
                    .field("errorCount", error_fields.len()),
            ));

            return SubmitOutcome::ValidationFailed(validation_errors);
        }

        // Validation passed; any lingering shown-error state resolves now.
        self.errors.clear();
        self.metrics.sync_errors(&ValidationErrors::new());

        self.state = SubmitState::Submitting;
        self.sink.emit(TelemetryMessage::Breadcrumb(Breadcrumb::new(
            format!("{form}.submit"),
            "Submitting signup form to API",
            Level::Info,
        )));

        let request = SignupRequest {
            name: self.fields.name.clone(),
            email: self.fields.email.clone(),
            password: self.fields.password.clone(),
        };
        let result = self.api.call(&request);

        match result {
            Ok(response) => {
                self.sink.emit(TelemetryMessage::Span(
                    Span::new(format!("{form}.api_call"), "http.client")
                        .attr("http.status_code", u64::from(response.status)),
                ));

                if !response.ok() {
                    let message = response
                        .error
                        .clone()
                        .unwrap_or_else(|| GENERIC_API_ERROR.to_string());
                    self.server_error = Some(message.clone());

                    self.sink.emit(TelemetryMessage::Log(
                        LogRecord::error("Signup API returned an error")
                            .field("status", u64::from(response.status)),
                    ));
                    self.sink.emit(TelemetryMessage::Log(
                        LogRecord::error(format!("{form}.api_error"))
                            .field("status", u64::from(response.status))
                            .field("error", message.clone()),
                    ));

                    self.metrics.emit_final_metrics(FormOutcome::ApiError);
                    self.state = SubmitState::Idle;
                    return SubmitOutcome::ApiError {
                        status: response.status,
                        message,
                    };
                }

                let user_id = response.user_id.unwrap_or_default();
                self.sink.emit(TelemetryMessage::Breadcrumb(
                    Breadcrumb::new(
                        format!("{form}.success"),
                        "Signup completed successfully",
                        Level::Info,
                    )
                    .datum("userId", user_id.clone()),
                ));
                self.sink.emit(TelemetryMessage::Log(
                    LogRecord::info(format!("{form}.success")).field("userId", user_id.clone()),
                ));

                self.metrics.emit_final_metrics(FormOutcome::Success);
                // Terminal navigation; session metrics stay intact until an
                // explicit reset.
                self.state = SubmitState::Succeeded;
                SubmitOutcome::Success { user_id }
            }
            Err(err) => {
                // Request never completed: span without a status code plus
                // an exception-level capture.
                self.sink.emit(TelemetryMessage::Span(Span::new(
                    format!("{form}.api_call"),
                    "http.client",
                )));
                self.sink.emit(TelemetryMessage::Log(
                    LogRecord::error(format!("{form}.network_error"))
                        .field("error", err.to_string())
                        .field("flow", "signup")
                        .field("step", "api_call"),
                ));

                self.server_error = Some(NETWORK_ERROR_MESSAGE.to_string());
                self.metrics.emit_final_metrics(FormOutcome::NetworkError);
                self.state = SubmitState::Idle;
                SubmitOutcome::NetworkError {
                    message: NETWORK_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }

    /// Start over for a new signup in the same process: clears values,
    /// errors and the whole metrics session.
    pub fn reset(&mut self) {
        self.fields = SignupFields::default();
        self.errors.clear();
        self.server_error = None;
        self.state = SubmitState::Idle;
        self.metrics.reset();
    }
}
