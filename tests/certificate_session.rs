use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use mccd::certificate::{
    keys, share, submit, CauseLine, CertificateEngine, CodedCause, CompletionOutcome,
    EvaluationContext, FieldValue, FormSession, IntervalUnit, OptionCode, OptionSet, RuleConfig,
    SessionState, Sex,
};
use mccd::remote::{load_option_sets, ApiError, InMemoryEventApi, RetryPolicy};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn ctx() -> EvaluationContext {
    EvaluationContext::new(date(2024, 6, 1))
}

fn engine() -> Arc<CertificateEngine> {
    Arc::new(CertificateEngine::standard(&RuleConfig::default()).expect("standard catalog is valid"))
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

fn malaria() -> CodedCause {
    CodedCause {
        code: "1F40".to_string(),
        title: "Malaria due to Plasmodium falciparum".to_string(),
        uri: "http://id.who.int/icd/entity/1F40".to_string(),
    }
}

/// Fills the certificate the way a clinician works through the form.
fn completed_certificate() -> FormSession {
    let mut session = FormSession::create(engine(), "ou1", ctx());
    let entries = [
        (keys::EVENT_DATE, FieldValue::Date(date(2024, 6, 1))),
        (keys::FULL_NAME, FieldValue::text("John Okello")),
        (keys::SEX, Sex::Male.value()),
        (keys::DATE_OF_BIRTH, FieldValue::Date(date(1980, 1, 15))),
        (
            keys::DATE_OF_DEATH,
            FieldValue::DateTime(date(2024, 5, 28).and_hms_opt(22, 40, 0).expect("valid time")),
        ),
        (keys::MANNER_DISEASE, FieldValue::Bool(true)),
        (keys::DECLARATION_ATTENDED, FieldValue::Bool(true)),
        (keys::LINE_A_INTERVAL_UNIT, IntervalUnit::Days.value()),
        (keys::LINE_A_INTERVAL, FieldValue::Number(10.0)),
    ];
    for (key, value) in entries {
        session
            .on_field_change(key, value)
            .unwrap_or_else(|err| panic!("{key} should accept input: {err}"));
    }

    session
        .set_coded_cause(CauseLine::A, &malaria())
        .expect("editable session");
    session
        .choose_underlying(CauseLine::A)
        .expect("malaria is an eligible underlying cause");
    session
}

#[tokio::test]
async fn option_sets_load_into_the_catalog() {
    let api = InMemoryEventApi::seeded();

    let catalog = load_option_sets(&api, &policy())
        .await
        .expect("seeded option sets are valid");

    let Some(OptionSet::Sex(options)) = catalog.get(Sex::SET) else {
        panic!("sex option set missing");
    };
    assert_eq!(options.len(), 3);
}

#[test]
fn birth_date_fills_the_age_and_the_form_becomes_submittable() {
    let session = completed_certificate();

    assert_eq!(
        session.value(keys::AGE).expect("known field"),
        &FieldValue::Number(44.0)
    );
    assert!(!session.is_enabled(keys::AGE).expect("known field"));
    assert!(!session.is_enabled(keys::PREGNANCY_STATUS).expect("known field"));
    assert!(!session.is_enabled(keys::MANNER_ACCIDENT).expect("known field"));
    assert!(session.can_submit(), "{:?}", session.validation_issues());
}

#[tokio::test]
async fn certificate_is_saved_then_reopened_and_updated() {
    let api = InMemoryEventApi::seeded();
    api.fail_next([ApiError::Transient("gateway timeout".to_string())]);
    let session = share(completed_certificate());

    let outcome = submit(&session, &api, &policy())
        .await
        .expect("certificate is ready");
    let CompletionOutcome::Submitted(event) = outcome else {
        panic!("expected the certificate to be saved, got {outcome:?}");
    };
    assert_eq!(
        session.lock().await.state(),
        &SessionState::Submitted {
            event: event.clone()
        }
    );

    let stored = api.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].event.as_ref(), Some(&event));

    let mut reopened = FormSession::edit(engine(), &stored[0], ctx()).expect("stored record loads");
    assert!(!reopened.is_enabled(keys::AGE).expect("known field"));
    reopened
        .on_field_change(keys::OCCUPATION, FieldValue::text("Teacher"))
        .expect("enabled field");

    let outcome = submit(&share(reopened), &api, &policy())
        .await
        .expect("still ready");

    assert_eq!(outcome, CompletionOutcome::Submitted(event));
    let stored = api.stored();
    assert_eq!(stored.len(), 1, "the update replaces the stored event");
    assert_eq!(
        stored[0].value(keys::OCCUPATION),
        Some(&FieldValue::text("Teacher"))
    );
}

#[tokio::test]
async fn rejected_certificates_stay_editable() {
    let api = InMemoryEventApi::seeded();
    api.fail_next([ApiError::Rejected {
        status: 409,
        message: "conflict".to_string(),
    }]);
    let session = share(completed_certificate());

    let outcome = submit(&session, &api, &policy())
        .await
        .expect("certificate is ready");

    assert!(matches!(outcome, CompletionOutcome::Failed(ref failure) if !failure.retryable));
    let guard = session.lock().await;
    assert_eq!(guard.state(), &SessionState::Editing);
    assert_eq!(
        guard.value(keys::FULL_NAME).expect("known field"),
        &FieldValue::text("John Okello")
    );
    assert!(api.stored().is_empty());
}
