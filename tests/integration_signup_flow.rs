// End-to-end flows across tracker, aggregator, orchestrator and the
// simulated backend, driven with a manual clock so every dwell and
// duration assertion is exact.

use formtrace::api::SimulatedApi;
use formtrace::clock::ManualClock;
use formtrace::submit::{SignupForm, SubmitOutcome, SubmitState};
use formtrace::telemetry::{AttrValue, RecordingSink, TelemetrySink};
use std::sync::Arc;

fn harness(
    configure: impl FnOnce(SimulatedApi) -> SimulatedApi,
) -> (SignupForm<SimulatedApi>, Arc<RecordingSink>, ManualClock) {
    let sink = Arc::new(RecordingSink::new());
    let clock = ManualClock::new(10_000);
    let api = configure(
        SimulatedApi::new(Arc::clone(&sink) as Arc<dyn TelemetrySink>)
            .with_seed(11)
            .with_conflict_rate(0.0)
            .without_delays(),
    );
    let form = SignupForm::new(
        api,
        Arc::clone(&sink) as Arc<dyn TelemetrySink>,
        Arc::new(clock.clone()),
    );
    (form, sink, clock)
}

fn dwell_type(
    form: &mut SignupForm<SimulatedApi>,
    clock: &ManualClock,
    field: &str,
    text: &str,
    dwell_ms: u64,
) {
    form.focus(field);
    let mut buf = String::new();
    for c in text.chars() {
        buf.push(c);
        form.input(field, &buf);
    }
    clock.advance(dwell_ms);
    form.blur(field);
}

#[test]
fn full_session_produces_consistent_summary_and_telemetry() {
    let (mut form, sink, clock) = harness(|a| a);

    dwell_type(&mut form, &clock, "email", "jane@example.com", 4_000);
    dwell_type(&mut form, &clock, "name", "Jane Doe", 2_000);
    dwell_type(&mut form, &clock, "confirmPassword", "password123", 3_000);
    dwell_type(&mut form, &clock, "password", "password123", 2_500);

    let outcome = form.submit();
    let user_id = match outcome {
        SubmitOutcome::Success { user_id } => user_id,
        other => panic!("expected success, got {other:?}"),
    };

    let summary = form.metrics().build_summary();
    assert_eq!(summary.form_started_at, Some(10_000));
    assert_eq!(summary.total_duration_ms, 11_500);
    assert_eq!(
        summary.visit_sequence_joined(),
        "email -> name -> confirmPassword -> password"
    );
    assert_eq!(summary.fields["email"].total_focus_ms, 4_000);
    assert_eq!(summary.fields["password"].total_focus_ms, 2_500);
    assert_eq!(
        summary.fields["email"].change_count,
        "jane@example.com".len() as u32
    );

    // client and server agree on the created user
    let success_crumb = sink
        .breadcrumbs()
        .into_iter()
        .find(|b| b.category == "signup.success")
        .unwrap();
    assert_eq!(
        success_crumb.data["userId"],
        AttrValue::Str(user_id.clone())
    );
    let server_root = sink
        .spans()
        .into_iter()
        .find(|s| s.name == "POST /api/signup")
        .unwrap();
    assert_eq!(
        server_root.attributes["signup.user_id"],
        AttrValue::Str(user_id)
    );

    // exactly one terminal emission
    assert_eq!(
        sink.spans()
            .iter()
            .filter(|s| s.name == "signup.form_completed")
            .count(),
        1
    );
}

#[test]
fn validation_failure_then_fix_reaches_success_with_corrections() {
    let (mut form, sink, clock) = harness(|a| a);

    dwell_type(&mut form, &clock, "name", "Jane", 1_000);
    dwell_type(&mut form, &clock, "email", "not-an-email", 2_000);
    dwell_type(&mut form, &clock, "password", "password123", 1_500);
    dwell_type(&mut form, &clock, "confirmPassword", "password123", 1_500);

    assert!(matches!(
        form.submit(),
        SubmitOutcome::ValidationFailed(errors) if errors.len() == 1
    ));
    assert_eq!(form.state(), SubmitState::Idle);
    assert!(form.metrics().field("email").unwrap().had_error_shown);

    dwell_type(&mut form, &clock, "email", "jane@example.com", 2_000);
    assert!(matches!(form.submit(), SubmitOutcome::Success { .. }));

    let email = form.metrics().field("email").unwrap();
    assert_eq!(email.correction_count, 1);
    assert_eq!(email.focus_count, 2);
    assert_eq!(email.total_focus_ms, 4_000);

    let summary = form.metrics().build_summary();
    assert_eq!(summary.submission_attempts, 2);

    // final metrics fired once, for the successful attempt only
    let completed: Vec<_> = sink
        .spans()
        .into_iter()
        .filter(|s| s.name == "signup.form_completed")
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(
        completed[0].attributes["form.outcome"],
        AttrValue::Str("success".into())
    );
    assert_eq!(
        completed[0].attributes["form.submission_attempts"],
        AttrValue::Int(2)
    );
}

#[test]
fn repeated_conflicts_emit_one_terminal_summary_each() {
    let (mut form, sink, clock) = harness(|a| a.with_conflict_rate(1.0));

    dwell_type(&mut form, &clock, "name", "Jane Doe", 500);
    dwell_type(&mut form, &clock, "email", "jane@example.com", 500);
    dwell_type(&mut form, &clock, "password", "password123", 500);
    dwell_type(&mut form, &clock, "confirmPassword", "password123", 500);

    assert!(matches!(
        form.submit(),
        SubmitOutcome::ApiError { status: 409, .. }
    ));
    assert_eq!(form.state(), SubmitState::Idle);
    assert!(matches!(
        form.submit(),
        SubmitOutcome::ApiError { status: 409, .. }
    ));

    let outcomes: Vec<_> = sink
        .spans()
        .into_iter()
        .filter(|s| s.name == "signup.form_completed")
        .map(|s| s.attributes["form.outcome"].clone())
        .collect();
    assert_eq!(
        outcomes,
        vec![
            AttrValue::Str("api_error".into()),
            AttrValue::Str("api_error".into())
        ]
    );
    assert_eq!(form.metrics().submission_attempts(), 2);
}

#[test]
fn network_failure_leaves_session_recoverable() {
    let (mut form, sink, clock) = harness(|a| a.with_transport_failure());

    dwell_type(&mut form, &clock, "name", "Jane Doe", 500);
    dwell_type(&mut form, &clock, "email", "jane@example.com", 500);
    dwell_type(&mut form, &clock, "password", "password123", 500);
    dwell_type(&mut form, &clock, "confirmPassword", "password123", 500);

    assert!(matches!(form.submit(), SubmitOutcome::NetworkError { .. }));
    assert_eq!(form.state(), SubmitState::Idle);
    assert!(form.server_error().is_some());

    // the api_call span exists but never got a status code
    let api_call = sink
        .spans()
        .into_iter()
        .find(|s| s.name == "signup.api_call")
        .unwrap();
    assert!(!api_call.attributes.contains_key("http.status_code"));

    let completed = sink
        .spans()
        .into_iter()
        .find(|s| s.name == "signup.form_completed")
        .unwrap();
    assert_eq!(
        completed.attributes["form.outcome"],
        AttrValue::Str("network_error".into())
    );
}

#[test]
fn session_survives_reset_and_runs_again() {
    let (mut form, sink, clock) = harness(|a| a);

    dwell_type(&mut form, &clock, "email", "jane@example.com", 1_000);
    dwell_type(&mut form, &clock, "name", "Jane Doe", 1_000);
    dwell_type(&mut form, &clock, "password", "password123", 1_000);
    dwell_type(&mut form, &clock, "confirmPassword", "password123", 1_000);
    assert!(matches!(form.submit(), SubmitOutcome::Success { .. }));
    assert_eq!(form.state(), SubmitState::Succeeded);

    form.reset();
    sink.clear();

    clock.set(50_000);
    dwell_type(&mut form, &clock, "email", "other@example.com", 700);
    let summary = form.metrics().build_summary();
    assert_eq!(summary.form_started_at, Some(50_000));
    assert_eq!(summary.field_visit_sequence, vec!["email"]);
    assert_eq!(summary.submission_attempts, 0);

    // lifecycle event fires again for the new session
    assert_eq!(
        sink.breadcrumbs()
            .iter()
            .filter(|b| b.category == "signup.lifecycle")
            .count(),
        1
    );
}
