//! Medical certificate of cause of death: fields, dependency rules and the
//! editing session that ties them together.

pub mod cause_chain;
mod domain;
mod notice;
mod options;
mod registry;
pub mod rules;
mod schema;
mod session;
mod submission;
mod validation;

#[cfg(test)]
mod tests;

pub use cause_chain::{CauseChainError, CauseLine, CodedCause, UnderlyingCandidate};
pub use domain::{
    Field, FieldKey, FieldMutation, FieldState, FieldUpdate, FieldValue, MutationKind, Snapshot,
};
pub use notice::{BlacklistNotice, NOTICE_DISPLAY};
pub use options::{
    standard_payloads, IntervalUnit, LabelledOption, OptionCatalog, OptionCode, OptionPayload,
    OptionSet, OptionSetError, OptionSetPayload, Sex, YesNo,
};
pub use registry::{FieldRegistry, RegistryError};
pub use rules::{
    standard_rules, Action, Effect, EvaluationContext, Predicate, Rule, RuleConfig,
    RuleConfigError, RuleEvaluator, RuleSet, Trigger,
};
pub use schema::{
    keys, CertificateSchema, FieldKind, FieldSpec, NumberRange, SchemaError, Section, Severity,
};
pub use session::{
    CertificateEngine, CompletionOutcome, FieldChange, FormSession, Mode, Reminder, SessionError,
    SessionState, SubmissionFailure, SubmissionTicket, UnderlyingPicker,
};
pub use submission::{share, submit, SharedSession};
pub use validation::{has_errors, validate, ValidationIssue};
