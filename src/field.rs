use crate::telemetry::{Breadcrumb, Level, LogRecord, Span, TelemetryMessage};
use serde::Serialize;

/// Interaction counters for a single tracked field.
///
/// `last_focus_start` is set exactly while the field is focused; each blur
/// matched to an open focus adds one dwell measurement to `total_focus_ms`
/// and clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldMetrics {
    pub focus_count: u32,
    pub blur_count: u32,
    pub change_count: u32,
    pub paste_count: u32,
    pub total_focus_ms: u64,
    pub first_focus_at: Option<u64>,
    pub last_blur_at: Option<u64>,
    pub last_focus_start: Option<u64>,
    pub had_error_shown: bool,
    pub correction_count: u32,
}

/// One user interaction with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEvent<'a> {
    Focus,
    Blur { value: &'a str },
    Change { value: &'a str },
    Paste,
    ErrorShown,
    ErrorCorrected,
}

/// Session-level context the per-field transition needs to compose
/// telemetry: names, the current time, the 1-based visit index of the
/// focus being applied, and the change-sampling interval.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub form: &'a str,
    pub field: &'a str,
    pub now_ms: u64,
    pub visit_index: usize,
    pub sample_every: u32,
}

impl FieldMetrics {
    /// Advance the field state by one event and return the telemetry it
    /// produces. Pure with respect to everything but `self`, so the whole
    /// tracker is unit-testable without any UI harness.
    pub fn apply(&mut self, event: FieldEvent<'_>, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        match event {
            FieldEvent::Focus => self.on_focus(ctx),
            FieldEvent::Blur { value } => self.on_blur(value, ctx),
            FieldEvent::Change { value } => self.on_change(value, ctx),
            FieldEvent::Paste => self.on_paste(ctx),
            FieldEvent::ErrorShown => self.on_error_shown(ctx),
            FieldEvent::ErrorCorrected => self.on_error_corrected(ctx),
        }
    }

    fn on_focus(&mut self, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        self.focus_count += 1;
        self.last_focus_start = Some(ctx.now_ms);
        if self.first_focus_at.is_none() {
            self.first_focus_at = Some(ctx.now_ms);
        }

        vec![
            TelemetryMessage::Breadcrumb(
                Breadcrumb::new(
                    format!("{}.field.focus", ctx.form),
                    format!("Focused on {}", ctx.field),
                    Level::Info,
                )
                .datum("field", ctx.field)
                .datum("focusCount", self.focus_count)
                .datum("visitIndex", ctx.visit_index),
            ),
            TelemetryMessage::Span(
                Span::new(
                    format!("{}.field.active.{}", ctx.form, ctx.field),
                    "ui.field.focus",
                )
                .attr("form.field", ctx.field)
                .attr("form.focus_count", self.focus_count),
            ),
        ]
    }

    fn on_blur(&mut self, value: &str, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        self.blur_count += 1;
        self.last_blur_at = Some(ctx.now_ms);

        let mut out = Vec::new();

        if let Some(start) = self.last_focus_start.take() {
            let dwell_ms = ctx.now_ms.saturating_sub(start);
            self.total_focus_ms += dwell_ms;
            out.push(TelemetryMessage::Span(
                Span::new(
                    format!("{}.field.dwell.{}", ctx.form, ctx.field),
                    "ui.field.dwell",
                )
                .attr("form.field", ctx.field)
                .attr("form.dwell_ms", dwell_ms)
                .attr("form.total_focus_ms", self.total_focus_ms)
                .attr("form.value_length", value.chars().count())
                .attr("form.is_empty", value.is_empty()),
            ));
        }

        let left_empty = value.trim().is_empty();
        out.push(TelemetryMessage::Breadcrumb(
            Breadcrumb::new(
                format!("{}.field.blur", ctx.form),
                if left_empty {
                    format!("Left {} (empty)", ctx.field)
                } else {
                    format!("Left {}", ctx.field)
                },
                if left_empty { Level::Warning } else { Level::Info },
            )
            .datum("field", ctx.field)
            .datum("blurCount", self.blur_count)
            .datum("totalFocusMs", self.total_focus_ms)
            .datum("leftEmpty", left_empty),
        ));

        // Emptied after typing: high-signal abandonment marker.
        if left_empty && self.change_count > 0 {
            out.push(TelemetryMessage::Log(
                LogRecord::warn(format!("{}.field_cleared", ctx.form))
                    .field("field", ctx.field)
                    .field("changeCount", self.change_count),
            ));
        }

        out
    }

    fn on_change(&mut self, value: &str, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        self.change_count += 1;

        let sampled = self.change_count == 1
            || (ctx.sample_every > 0 && self.change_count % ctx.sample_every == 0);
        if !sampled {
            return Vec::new();
        }

        vec![TelemetryMessage::Breadcrumb(
            Breadcrumb::new(
                format!("{}.field.change", ctx.form),
                format!("{} changed (keystroke #{})", ctx.field, self.change_count),
                Level::Info,
            )
            .datum("field", ctx.field)
            .datum("changeCount", self.change_count)
            .datum("valueLength", value.chars().count()),
        )]
    }

    fn on_paste(&mut self, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        self.paste_count += 1;

        vec![
            TelemetryMessage::Breadcrumb(
                Breadcrumb::new(
                    format!("{}.field.paste", ctx.form),
                    format!("Paste into {}", ctx.field),
                    Level::Info,
                )
                .datum("field", ctx.field)
                .datum("pasteCount", self.paste_count),
            ),
            TelemetryMessage::Log(
                LogRecord::info(format!("{}.field_paste", ctx.form))
                    .field("field", ctx.field)
                    .field("pasteCount", self.paste_count),
            ),
        ]
    }

    fn on_error_shown(&mut self, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        if self.had_error_shown {
            return Vec::new();
        }
        self.had_error_shown = true;

        vec![TelemetryMessage::Breadcrumb(
            Breadcrumb::new(
                format!("{}.field.error_shown", ctx.form),
                format!("Validation error displayed on {}", ctx.field),
                Level::Warning,
            )
            .datum("field", ctx.field),
        )]
    }

    fn on_error_corrected(&mut self, ctx: &EventContext<'_>) -> Vec<TelemetryMessage> {
        if !self.had_error_shown {
            return Vec::new();
        }
        self.had_error_shown = false;
        self.correction_count += 1;

        vec![
            TelemetryMessage::Breadcrumb(
                Breadcrumb::new(
                    format!("{}.field.error_corrected", ctx.form),
                    format!("User corrected error on {}", ctx.field),
                    Level::Info,
                )
                .datum("field", ctx.field)
                .datum("correctionCount", self.correction_count),
            ),
            TelemetryMessage::Log(
                LogRecord::info(format!("{}.field_error_corrected", ctx.form))
                    .field("field", ctx.field)
                    .field("correctionCount", self.correction_count),
            ),
        ]
    }
}
