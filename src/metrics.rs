use crate::clock::Clock;
use crate::field::{EventContext, FieldEvent, FieldMetrics};
use crate::telemetry::{Breadcrumb, Level, LogRecord, Span, TelemetryMessage, TelemetrySink};
use crate::validation::ValidationErrors;
use chrono::{DateTime, Local, TimeZone};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_FORM_NAME: &str = "signup";
pub const DEFAULT_CHANGE_SAMPLE_EVERY: u32 = 10;

/// Terminal outcome of a submission that reached the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FormOutcome {
    Success,
    ApiError,
    NetworkError,
}

/// Point-in-time snapshot of a session. Building one never mutates the
/// session, so it is safe to take repeatedly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSummary {
    pub form_started_at: Option<u64>,
    pub form_ended_at: u64,
    pub total_duration_ms: u64,
    pub field_visit_sequence: Vec<String>,
    pub submission_attempts: u32,
    pub fields: BTreeMap<String, FieldMetrics>,
}

impl FormSummary {
    /// Visit order rendered the way the completion span reports it,
    /// e.g. `"email -> name -> confirmPassword -> password"`.
    pub fn visit_sequence_joined(&self) -> String {
        self.field_visit_sequence.iter().join(" -> ")
    }

    pub fn unique_fields_visited(&self) -> usize {
        self.field_visit_sequence.iter().unique().count()
    }

    /// Session start as local wall-clock time, when the session started
    /// and the epoch-millisecond timestamp is representable.
    pub fn started_at_local(&self) -> Option<DateTime<Local>> {
        self.form_started_at
            .and_then(|ms| Local.timestamp_millis_opt(ms as i64).single())
    }
}

/// Per-session aggregator: owns one `FieldMetrics` per known field, the
/// visit sequence and the submission-attempt counter, and emits telemetry
/// through the injected sink.
///
/// Sessions are explicit objects rather than ambient state so several can
/// coexist in one process (multi-tab, server-rendered).
pub struct FormMetrics {
    form_name: String,
    sample_every: u32,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
    form_started_at: Option<u64>,
    visit_sequence: Vec<String>,
    submission_attempts: u32,
    fields: BTreeMap<String, FieldMetrics>,
    prev_errors: ValidationErrors,
}

impl FormMetrics {
    pub fn new(
        field_names: &[&str],
        sink: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            form_name: DEFAULT_FORM_NAME.to_string(),
            sample_every: DEFAULT_CHANGE_SAMPLE_EVERY,
            clock,
            sink,
            form_started_at: None,
            visit_sequence: Vec::new(),
            submission_attempts: 0,
            fields: field_names
                .iter()
                .map(|n| (n.to_string(), FieldMetrics::default()))
                .collect(),
            prev_errors: ValidationErrors::new(),
        }
    }

    pub fn with_form_name(mut self, name: impl Into<String>) -> Self {
        self.form_name = name.into();
        self
    }

    pub fn with_sample_every(mut self, sample_every: u32) -> Self {
        self.sample_every = sample_every;
        self
    }

    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetrics> {
        self.fields.get(name)
    }

    pub fn submission_attempts(&self) -> u32 {
        self.submission_attempts
    }

    fn emit_all(&self, messages: Vec<TelemetryMessage>) {
        for msg in messages {
            self.sink.emit(msg);
        }
    }

    fn ensure_form_started(&mut self) {
        if self.form_started_at.is_some() {
            return;
        }
        let now = self.clock.now_ms();
        self.form_started_at = Some(now);
        self.sink.emit(TelemetryMessage::Breadcrumb(
            Breadcrumb::new(
                format!("{}.lifecycle", self.form_name),
                "Form interaction started",
                Level::Info,
            )
            .datum("timestamp", now),
        ));
        self.sink.emit(TelemetryMessage::Log(LogRecord::info(format!(
            "{}.form_started",
            self.form_name
        ))));
    }

    /// Dispatch one event into a field tracker. Unknown field names are
    /// ignored, matching the fixed-at-creation key set.
    fn track(&mut self, field: &str, event: FieldEvent<'_>) {
        let visit_index = self.visit_sequence.len();
        let now_ms = self.clock.now_ms();
        let ctx = EventContext {
            form: &self.form_name,
            field,
            now_ms,
            visit_index,
            sample_every: self.sample_every,
        };
        let Some(fm) = self.fields.get_mut(field) else {
            return;
        };
        let out = fm.apply(event, &ctx);
        self.emit_all(out);
    }

    pub fn track_focus(&mut self, field: &str) {
        if !self.fields.contains_key(field) {
            return;
        }
        self.ensure_form_started();
        self.visit_sequence.push(field.to_string());
        self.track(field, FieldEvent::Focus);
    }

    pub fn track_blur(&mut self, field: &str, current_value: &str) {
        self.track(
            field,
            FieldEvent::Blur {
                value: current_value,
            },
        );
    }

    pub fn track_change(&mut self, field: &str, value: &str) {
        self.track(field, FieldEvent::Change { value });
    }

    pub fn track_paste(&mut self, field: &str) {
        self.track(field, FieldEvent::Paste);
    }

    pub fn track_error_shown(&mut self, field: &str) {
        self.track(field, FieldEvent::ErrorShown);
    }

    pub fn track_error_corrected(&mut self, field: &str) {
        self.track(field, FieldEvent::ErrorCorrected);
    }

    /// Diff the freshly rendered error set against the previous one: a
    /// field whose error vanished was corrected, a field whose error
    /// appeared gets error-shown.
    pub fn sync_errors(&mut self, next: &ValidationErrors) {
        let names: Vec<String> = self.fields.keys().cloned().collect();
        let prev = std::mem::take(&mut self.prev_errors);
        for name in names {
            let had = prev.contains_key(&name);
            let has = next.contains_key(&name);
            if had && !has {
                self.track_error_corrected(&name);
            } else if !had && has {
                self.track_error_shown(&name);
            }
        }
        self.prev_errors = next.clone();
    }

    /// Counted once per submit action, before validation runs.
    pub fn track_submission_attempt(&mut self) -> u32 {
        self.submission_attempts += 1;
        let attempt = self.submission_attempts;

        self.sink.emit(TelemetryMessage::Breadcrumb(
            Breadcrumb::new(
                format!("{}.submit_attempt", self.form_name),
                format!("Submit attempt #{attempt}"),
                Level::Info,
            )
            .datum("attempt", attempt),
        ));
        self.sink.emit(TelemetryMessage::Log(
            LogRecord::info(format!("{}.submit_attempt", self.form_name))
                .field("attempt", attempt),
        ));

        attempt
    }

    pub fn build_summary(&self) -> FormSummary {
        let now = self.clock.now_ms();
        FormSummary {
            form_started_at: self.form_started_at,
            form_ended_at: now,
            total_duration_ms: self
                .form_started_at
                .map(|start| now.saturating_sub(start))
                .unwrap_or(0),
            field_visit_sequence: self.visit_sequence.clone(),
            submission_attempts: self.submission_attempts,
            fields: self.fields.clone(),
        }
    }

    /// Single terminal emission point for a submission outcome: one
    /// completion span, one per-field breakdown span, one structured log
    /// with everything flattened.
    pub fn emit_final_metrics(&self, outcome: FormOutcome) {
        let summary = self.build_summary();
        let sequence = summary.visit_sequence_joined();

        self.sink.emit(TelemetryMessage::Span(
            Span::new(
                format!("{}.form_completed", self.form_name),
                "ui.form.complete",
            )
            .attr("form.outcome", outcome.to_string())
            .attr("form.total_duration_ms", summary.total_duration_ms)
            .attr("form.submission_attempts", summary.submission_attempts)
            .attr("form.unique_fields_visited", summary.unique_fields_visited())
            .attr("form.total_field_visits", summary.field_visit_sequence.len())
            .attr("form.visit_sequence", sequence.clone()),
        ));

        let mut breakdown = Span::new(
            format!("{}.field_breakdown", self.form_name),
            "ui.form.field_breakdown",
        );
        for (name, fm) in &summary.fields {
            breakdown = breakdown
                .attr(format!("form.field.{name}.focus_count"), fm.focus_count)
                .attr(format!("form.field.{name}.change_count"), fm.change_count)
                .attr(format!("form.field.{name}.paste_count"), fm.paste_count)
                .attr(format!("form.field.{name}.total_focus_ms"), fm.total_focus_ms)
                .attr(
                    format!("form.field.{name}.correction_count"),
                    fm.correction_count,
                );
        }
        self.sink.emit(TelemetryMessage::Span(breakdown));

        let mut log = LogRecord::info(format!("{}.form_metrics", self.form_name))
            .field("outcome", outcome.to_string())
            .field("totalDurationMs", summary.total_duration_ms)
            .field("submissionAttempts", summary.submission_attempts)
            .field("visitSequence", sequence);
        for (name, fm) in &summary.fields {
            log = log
                .field(format!("{name}_focusCount"), fm.focus_count)
                .field(format!("{name}_changeCount"), fm.change_count)
                .field(format!("{name}_pasteCount"), fm.paste_count)
                .field(format!("{name}_totalFocusMs"), fm.total_focus_ms)
                .field(format!("{name}_correctionCount"), fm.correction_count);
        }
        self.sink.emit(TelemetryMessage::Log(log));
    }

    /// Return to the unstarted state for reuse within the same process.
    /// Field keys stay fixed; everything else zeroes out.
    pub fn reset(&mut self) {
        self.form_started_at = None;
        self.visit_sequence.clear();
        self.submission_attempts = 0;
        self.prev_errors.clear();
        for fm in self.fields.values_mut() {
            *fm = FieldMetrics::default();
        }
    }
}
