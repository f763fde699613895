use std::sync::Arc;

use chrono::NaiveDate;

use crate::certificate::{
    keys, CauseLine, CertificateEngine, CodedCause, EvaluationContext, FieldValue, FormSession,
    IntervalUnit, OptionCode, RuleConfig, Sex, Snapshot,
};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(crate) fn today() -> NaiveDate {
    date(2024, 6, 1)
}

pub(crate) fn ctx() -> EvaluationContext {
    EvaluationContext::new(today())
}

pub(crate) fn standard_engine() -> Arc<CertificateEngine> {
    Arc::new(CertificateEngine::standard(&RuleConfig::default()).expect("standard catalog is valid"))
}

pub(crate) fn blank_session() -> FormSession {
    FormSession::create(standard_engine(), "ou1", ctx())
}

pub(crate) fn tuberculosis() -> CodedCause {
    CodedCause {
        code: "1B10".to_string(),
        title: "Tuberculosis".to_string(),
        uri: "http://id.who.int/icd/entity/1B10".to_string(),
    }
}

pub(crate) fn head_injury() -> CodedCause {
    CodedCause {
        code: "NA07".to_string(),
        title: "Intracranial injury".to_string(),
        uri: "http://id.who.int/icd/entity/NA07".to_string(),
    }
}

/// A complete certificate that passes validation.
pub(crate) fn ready_session(engine: Arc<CertificateEngine>) -> FormSession {
    let mut session = FormSession::create(engine, "ou1", ctx());
    let entries = [
        (keys::EVENT_DATE, FieldValue::Date(today())),
        (keys::FULL_NAME, FieldValue::text("Jane Doe")),
        (keys::SEX, Sex::Female.value()),
        (keys::AGE, FieldValue::Number(62.0)),
        (
            keys::DATE_OF_DEATH,
            FieldValue::DateTime(date(2024, 5, 30).and_hms_opt(8, 15, 0).expect("valid time")),
        ),
        (keys::DECLARATION_ATTENDED, FieldValue::Bool(true)),
        (keys::LINE_A_INTERVAL_UNIT, IntervalUnit::Days.value()),
        (keys::LINE_A_INTERVAL, FieldValue::Number(3.0)),
    ];
    for (key, value) in entries {
        session.on_field_change(key, value).expect("field is enabled");
    }
    session
        .set_coded_cause(CauseLine::A, &tuberculosis())
        .expect("editable session");
    session
        .choose_underlying(CauseLine::A)
        .expect("line a is recorded");
    assert!(session.can_submit(), "{:?}", session.validation_issues());
    session
}

/// Every standard field, empty and at its default enabled state.
pub(crate) fn blank_snapshot() -> Snapshot {
    blank_session().snapshot()
}
