use super::common::*;

use crate::certificate::{
    keys, CauseLine, CertificateEngine, CompletionOutcome, EvaluationContext, FieldValue,
    FormSession, IntervalUnit, Mode, OptionCode, Reminder, RuleConfig, RuleConfigError,
    SessionError, SessionState, Severity, Sex, YesNo,
};
use crate::remote::{ApiError, EventId};

#[test]
fn new_sessions_start_creating_and_move_to_editing() {
    let mut session = blank_session();
    assert_eq!(session.state(), &SessionState::Creating);

    session
        .on_field_change(keys::FULL_NAME, FieldValue::text("Jane Doe"))
        .expect("enabled field");

    assert_eq!(session.state(), &SessionState::Editing);
}

#[test]
fn death_before_birth_is_reset_by_the_controller() {
    let mut session = blank_session();
    session
        .on_field_change(keys::DATE_OF_BIRTH, FieldValue::Date(date(2000, 1, 1)))
        .expect("enabled field");

    let change = session
        .on_field_change(
            keys::DATE_OF_DEATH,
            FieldValue::DateTime(date(1999, 12, 31).and_hms_opt(12, 0, 0).expect("valid")),
        )
        .expect("enabled field");

    assert_eq!(change.mutations.len(), 1);
    assert_eq!(
        session.value(keys::DATE_OF_DEATH).expect("known field"),
        &FieldValue::Empty
    );
}

#[test]
fn age_follows_a_birth_date_thirty_years_back() {
    let today = chrono::Local::now().date_naive();
    let birth = today
        .checked_sub_months(chrono::Months::new(30 * 12))
        .expect("representable date");
    let mut session = FormSession::create(standard_engine(), "ou1", EvaluationContext::today());

    session
        .on_field_change(keys::DATE_OF_BIRTH, FieldValue::Date(birth))
        .expect("enabled field");

    assert_eq!(
        session.value(keys::AGE).expect("known field"),
        &FieldValue::Number(30.0)
    );
    assert!(!session.is_enabled(keys::AGE).expect("known field"));
}

#[test]
fn disabled_fields_reject_changes() {
    let mut session = blank_session();
    session
        .on_field_change(keys::SEX, Sex::Male.value())
        .expect("enabled field");
    session
        .on_field_change(keys::AGE, FieldValue::Number(30.0))
        .expect("enabled field");

    let err = session
        .on_field_change(keys::PREGNANCY_STATUS, YesNo::Yes.value())
        .expect_err("pregnancy question is locked for males");

    assert_eq!(err, SessionError::FieldDisabled(keys::PREGNANCY_STATUS.into()));
    assert_eq!(
        session.value(keys::PREGNANCY_STATUS).expect("known field"),
        &FieldValue::Empty
    );
}

#[test]
fn unknown_fields_are_reported() {
    let mut session = blank_session();
    let err = session
        .on_field_change("not-a-field", FieldValue::Bool(true))
        .expect_err("unknown field");
    assert!(matches!(err, SessionError::Registry(_)));
}

#[test]
fn readiness_needs_declaration_underlying_cause_and_sex() {
    let mut session = ready_session(standard_engine());
    assert!(session.can_submit());

    session
        .on_field_change(keys::DECLARATION_ATTENDED, FieldValue::Bool(false))
        .expect("enabled field");
    assert!(!session.can_submit());

    session
        .on_field_change(keys::DECLARATION_POST_MORTEM, FieldValue::Bool(true))
        .expect("enabled field");
    assert!(session.can_submit());

    let change = session
        .on_field_change(keys::SEX, FieldValue::Empty)
        .expect("enabled field");
    assert!(!change.can_submit);
}

#[test]
fn validation_errors_block_submission_but_warnings_do_not() {
    let mut session = ready_session(standard_engine());

    session
        .on_field_change(keys::AGE, FieldValue::Number(0.0))
        .expect("enabled field");
    session
        .on_field_change(keys::BIRTH_WEIGHT, FieldValue::Number(20_000.0))
        .expect("enabled field");
    let issues = session.validation_issues();
    assert!(issues
        .iter()
        .any(|issue| issue.field.as_str() == keys::BIRTH_WEIGHT && issue.severity == Severity::Warning));
    assert!(session.can_submit());

    session
        .on_field_change(keys::AGE, FieldValue::Number(130.0))
        .expect("enabled field");
    assert!(!session.can_submit());
    assert_eq!(
        session.begin_submission().expect_err("age out of range"),
        SessionError::NotReady
    );
}

#[test]
fn view_mode_blocks_every_mutation() {
    let record = ready_session(standard_engine()).to_record();
    let mut session =
        FormSession::view(standard_engine(), &record, ctx()).expect("stored record loads");

    assert_eq!(session.mode(), Mode::ViewOnly);
    assert!(!session.can_submit());
    assert_eq!(
        session
            .on_field_change(keys::FULL_NAME, FieldValue::text("Someone else"))
            .expect_err("view only"),
        SessionError::ViewOnly
    );
    assert_eq!(
        session.use_free_text(CauseLine::A).expect_err("view only"),
        SessionError::ViewOnly
    );
    assert_eq!(
        session.begin_submission().expect_err("view only"),
        SessionError::ViewOnly
    );
    assert_eq!(
        session.value(keys::FULL_NAME).expect("known field"),
        &FieldValue::text("Jane Doe")
    );
}

#[test]
fn editing_restores_enabled_state_without_touching_values() {
    let mut original = blank_session();
    original
        .on_field_change(keys::SEX, Sex::Female.value())
        .expect("enabled field");
    original
        .on_field_change(keys::AGE, FieldValue::Number(30.0))
        .expect("enabled field");
    original
        .on_field_change(keys::PREGNANCY_STATUS, YesNo::Yes.value())
        .expect("enabled field");
    original
        .on_field_change(keys::MANNER_DISEASE, FieldValue::Bool(true))
        .expect("enabled field");
    let record = original.to_record();

    let session = FormSession::edit(standard_engine(), &record, ctx()).expect("stored record loads");

    assert_eq!(session.state(), &SessionState::Editing);
    assert!(session.is_enabled(keys::PREGNANCY_STATUS).expect("known field"));
    assert!(session.is_enabled(keys::PARITY).expect("known field"));
    assert!(!session.is_enabled(keys::MANNER_ACCIDENT).expect("known field"));
    assert_eq!(session.to_record().values, record.values);
}

#[test]
fn failed_submission_returns_to_editing_with_an_annotation() {
    let mut session = ready_session(standard_engine());
    let ticket = session.begin_submission().expect("ready");
    assert_eq!(
        session.state(),
        &SessionState::Submitting {
            attempt: ticket.attempt
        }
    );
    assert_eq!(
        session
            .on_field_change(keys::OCCUPATION, FieldValue::text("Farmer"))
            .expect_err("submission in flight"),
        SessionError::Submitting
    );

    let outcome = session.complete_submission(
        ticket.attempt,
        Err(ApiError::Rejected {
            status: 409,
            message: "conflict".to_string(),
        }),
    );

    let CompletionOutcome::Failed(failure) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(!failure.retryable);
    assert_eq!(session.state(), &SessionState::Editing);
    assert!(session.last_failure().is_some());
    assert!(session.can_submit());
}

#[test]
fn a_superseded_response_is_discarded() {
    let mut session = ready_session(standard_engine());
    let first = session.begin_submission().expect("ready");
    let second = session.begin_submission().expect("resubmission supersedes");
    assert_ne!(first.attempt, second.attempt);

    let accepted = session.complete_submission(second.attempt, Ok(EventId("evt2".to_string())));
    let late = session.complete_submission(
        first.attempt,
        Err(ApiError::Transient("timed out".to_string())),
    );

    assert_eq!(accepted, CompletionOutcome::Submitted(EventId("evt2".to_string())));
    assert_eq!(late, CompletionOutcome::Stale);
    assert_eq!(
        session.state(),
        &SessionState::Submitted {
            event: EventId("evt2".to_string())
        }
    );
    assert!(session.last_failure().is_none());
    assert_eq!(session.event(), Some(&EventId("evt2".to_string())));
}

#[test]
fn submitted_sessions_are_closed() {
    let mut session = ready_session(standard_engine());
    let ticket = session.begin_submission().expect("ready");
    session.complete_submission(ticket.attempt, Ok(EventId("evt1".to_string())));

    assert_eq!(
        session.begin_submission().expect_err("already submitted"),
        SessionError::Submitted
    );
    assert_eq!(
        session
            .on_field_change(keys::OCCUPATION, FieldValue::text("Farmer"))
            .expect_err("already submitted"),
        SessionError::Submitted
    );
}

#[test]
fn reminders_follow_the_recorded_dates_and_sex() {
    let mut session = blank_session();
    session
        .on_field_change(keys::DATE_OF_BIRTH, FieldValue::Date(date(2024, 5, 10)))
        .expect("enabled field");
    session
        .on_field_change(
            keys::DATE_OF_DEATH,
            FieldValue::DateTime(date(2024, 5, 20).and_hms_opt(6, 0, 0).expect("valid")),
        )
        .expect("enabled field");
    assert_eq!(session.reminders(), vec![Reminder::FetalSection]);

    let mut adult = blank_session();
    adult
        .on_field_change(keys::SEX, Sex::Female.value())
        .expect("enabled field");
    adult
        .on_field_change(keys::AGE, FieldValue::Number(28.0))
        .expect("enabled field");
    assert_eq!(adult.reminders(), vec![Reminder::PregnancySection]);

    adult
        .on_field_change(keys::PREGNANCY_STATUS, YesNo::No.value())
        .expect("enabled field");
    assert!(adult.reminders().is_empty());
}

/// Records an interval on a line, which reveals the next one.
fn open_next_line(session: &mut FormSession, unit: &str, interval: &str) {
    session
        .on_field_change(unit, IntervalUnit::Days.value())
        .expect("interval unit is enabled");
    session
        .on_field_change(interval, FieldValue::Number(3.0))
        .expect("interval is revealed by its unit");
}

#[test]
fn underlying_cause_skips_injury_codes() {
    let mut session = blank_session();
    session
        .set_coded_cause(CauseLine::A, &head_injury())
        .expect("editable");
    open_next_line(&mut session, keys::LINE_A_INTERVAL_UNIT, keys::LINE_A_INTERVAL);
    session
        .set_coded_cause(CauseLine::B, &tuberculosis())
        .expect("editable");

    let picker = session.open_underlying_picker();
    assert!(picker.blacklisted_found);
    assert!(session.notice().is_visible());
    assert_eq!(picker.candidates.len(), 1);
    assert_eq!(picker.candidates[0].line, CauseLine::B);

    assert!(matches!(
        session.choose_underlying(CauseLine::A),
        Err(SessionError::CauseChain(_))
    ));
    session
        .choose_underlying(CauseLine::B)
        .expect("tuberculosis is eligible");
    assert_eq!(
        session.value(keys::UNDERLYING_CODE).expect("known field"),
        &FieldValue::text("1B10")
    );
}

#[test]
fn switching_a_line_to_free_text_discards_the_coded_entry() {
    let mut session = blank_session();
    session
        .set_coded_cause(CauseLine::A, &tuberculosis())
        .expect("editable");

    session.use_free_text(CauseLine::A).expect("editable");

    assert_eq!(
        session.value(keys::LINE_A_CODE).expect("known field"),
        &FieldValue::Empty
    );
    assert!(session.is_enabled(keys::LINE_A_FREE_TEXT).expect("known field"));
    assert!(!session.is_enabled(keys::LINE_A_TERM).expect("known field"));

    session
        .on_field_change(keys::LINE_A_FREE_TEXT, FieldValue::text("long illness"))
        .expect("free text is enabled");
    session.use_coded_entry(CauseLine::A).expect("editable");
    assert_eq!(
        session.value(keys::LINE_A_FREE_TEXT).expect("known field"),
        &FieldValue::Empty
    );
    assert!(session.is_enabled(keys::LINE_A_TERM).expect("known field"));
}

#[test]
fn sessions_do_not_share_field_state() {
    let engine = standard_engine();
    let mut first = FormSession::create(engine.clone(), "ou1", ctx());
    let second = FormSession::create(engine, "ou1", ctx());

    first
        .on_field_change(keys::MANNER_WAR, FieldValue::Bool(true))
        .expect("enabled field");

    assert!(!first.is_enabled(keys::MANNER_ACCIDENT).expect("known field"));
    assert!(second.is_enabled(keys::MANNER_ACCIDENT).expect("known field"));
}

#[test]
fn chain_lines_stay_closed_until_the_line_above_has_an_interval() {
    let mut session = blank_session();

    assert_eq!(
        session
            .set_coded_cause(CauseLine::B, &tuberculosis())
            .expect_err("line b is not revealed yet"),
        SessionError::FieldDisabled(keys::LINE_B_TERM.into())
    );
    assert_eq!(
        session.use_free_text(CauseLine::C).expect_err("line c is not revealed yet"),
        SessionError::FieldDisabled(keys::LINE_C_TERM.into())
    );
    assert_eq!(
        session.value(keys::LINE_B_TERM).expect("known field"),
        &FieldValue::Empty
    );

    open_next_line(&mut session, keys::LINE_A_INTERVAL_UNIT, keys::LINE_A_INTERVAL);
    session
        .set_coded_cause(CauseLine::B, &tuberculosis())
        .expect("line b is revealed");
    assert_eq!(
        session.value(keys::LINE_B_TERM).expect("known field"),
        &FieldValue::text("Tuberculosis")
    );
}

#[test]
fn underlying_cause_waits_for_the_chain_interval() {
    let mut session = blank_session();
    session
        .set_coded_cause(CauseLine::A, &tuberculosis())
        .expect("line a is open");

    assert_eq!(
        session
            .choose_underlying(CauseLine::A)
            .expect_err("underlying cause is still locked"),
        SessionError::FieldDisabled(keys::UNDERLYING_CAUSE.into())
    );
    assert_eq!(
        session.value(keys::UNDERLYING_CAUSE).expect("known field"),
        &FieldValue::Empty
    );
    assert!(!session.can_submit());

    open_next_line(&mut session, keys::LINE_A_INTERVAL_UNIT, keys::LINE_A_INTERVAL);
    session
        .choose_underlying(CauseLine::A)
        .expect("interval on line a opens the underlying cause");
    assert_eq!(
        session.value(keys::UNDERLYING_CAUSE).expect("known field"),
        &FieldValue::text("Tuberculosis")
    );
}

#[test]
fn engines_refuse_an_inverted_childbearing_window() {
    let config = RuleConfig {
        childbearing_min_age: 50,
        childbearing_max_age: 10,
        ..RuleConfig::default()
    };

    let err = CertificateEngine::standard(&config).expect_err("window is empty");

    assert_eq!(err, RuleConfigError::EmptyAgeWindow { min: 50, max: 10 });
}
