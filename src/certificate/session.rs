//! One editing, creation or view instance of a certificate.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cause_chain::{self, CauseChainError, CauseLine, CodedCause, UnderlyingCandidate};
use super::domain::{FieldKey, FieldMutation, FieldUpdate, FieldValue, MutationKind, Snapshot};
use super::notice::BlacklistNotice;
use super::options::{OptionCode, Sex};
use super::registry::{FieldRegistry, RegistryError};
use super::rules::{
    standard_rules, EvaluationContext, Predicate, Rule, RuleConfig, RuleConfigError, RuleEvaluator,
    RuleSet,
};
use super::schema::{keys, CertificateSchema};
use super::validation::{has_errors, validate, ValidationIssue};
use crate::remote::{ApiError, CertificateRecord, EventId};

/// Deaths this many days after birth or sooner prompt for the fetal section.
const FETAL_REMINDER_DAYS: i64 = 25;

/// Schema and compiled rules shared by every session.
#[derive(Debug, Clone)]
pub struct CertificateEngine {
    schema: CertificateSchema,
    evaluator: RuleEvaluator,
    config: RuleConfig,
}

impl CertificateEngine {
    pub fn new(
        schema: CertificateSchema,
        rules: Vec<Rule>,
        config: RuleConfig,
    ) -> Result<Self, RuleConfigError> {
        config.validate()?;
        let rules = RuleSet::new(&schema, rules)?;
        Ok(Self {
            schema,
            evaluator: RuleEvaluator::new(rules),
            config,
        })
    }

    pub fn standard(config: &RuleConfig) -> Result<Self, RuleConfigError> {
        Self::new(CertificateSchema::standard(), standard_rules(config), *config)
    }

    pub fn schema(&self) -> &CertificateSchema {
        &self.schema
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Entry,
    ViewOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No backing record yet.
    Creating,
    Editing,
    Submitting { attempt: u64 },
    Submitted { event: EventId },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Creating => "creating",
            SessionState::Editing => "editing",
            SessionState::Submitting { .. } => "submitting",
            SessionState::Submitted { .. } => "submitted",
        }
    }
}

/// Why the last submission attempt did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionFailure {
    pub attempt: u64,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("the certificate is open in view mode")]
    ViewOnly,
    #[error("field `{0}` is disabled")]
    FieldDisabled(FieldKey),
    #[error("a submission is in progress")]
    Submitting,
    #[error("the certificate has already been submitted")]
    Submitted,
    #[error("the certificate is not ready to submit")]
    NotReady,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    CauseChain(#[from] CauseChainError),
}

/// Result of one field change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Rule-driven changes to other fields, in the order they were applied.
    pub mutations: Vec<FieldMutation>,
    pub can_submit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reminder {
    FetalSection,
    PregnancySection,
}

impl Reminder {
    pub fn message(self) -> &'static str {
        match self {
            Reminder::FetalSection => {
                "Please remember to also complete the section 'Fetal or infant death'"
            }
            Reminder::PregnancySection => {
                "Please remember to complete the section on pregnancy status"
            }
        }
    }
}

/// Handed out by [`FormSession::begin_submission`]; carries the record as it
/// stood when the attempt started.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionTicket {
    pub attempt: u64,
    pub record: CertificateRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Submitted(EventId),
    Failed(SubmissionFailure),
    /// The response belonged to a superseded attempt and was ignored.
    Stale,
}

/// Underlying-cause choices offered from the current chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnderlyingPicker {
    pub candidates: Vec<UnderlyingCandidate>,
    pub blacklisted_found: bool,
}

/// Owns the field registry of one certificate and serialises every change to it.
#[derive(Debug)]
pub struct FormSession {
    engine: Arc<CertificateEngine>,
    registry: FieldRegistry,
    state: SessionState,
    mode: Mode,
    event: Option<EventId>,
    org_unit: String,
    ctx: EvaluationContext,
    attempts: u64,
    last_failure: Option<SubmissionFailure>,
    notice: BlacklistNotice,
}

impl FormSession {
    /// A blank certificate for `org_unit`. `ctx` fixes the evaluation date
    /// used by age and date rules.
    pub fn create(
        engine: Arc<CertificateEngine>,
        org_unit: impl Into<String>,
        ctx: EvaluationContext,
    ) -> Self {
        let registry = FieldRegistry::from_schema(engine.schema());
        Self {
            engine,
            registry,
            state: SessionState::Creating,
            mode: Mode::Entry,
            event: None,
            org_unit: org_unit.into(),
            ctx,
            attempts: 0,
            last_failure: None,
            notice: BlacklistNotice::default(),
        }
    }

    /// Opens a stored certificate for editing.
    pub fn edit(
        engine: Arc<CertificateEngine>,
        record: &CertificateRecord,
        ctx: EvaluationContext,
    ) -> Result<Self, SessionError> {
        Self::hydrate(engine, record, Mode::Entry, ctx)
    }

    /// Opens a stored certificate read-only.
    pub fn view(
        engine: Arc<CertificateEngine>,
        record: &CertificateRecord,
        ctx: EvaluationContext,
    ) -> Result<Self, SessionError> {
        Self::hydrate(engine, record, Mode::ViewOnly, ctx)
    }

    /// Loads stored values, then replays the rules over them so the enabled
    /// flags match what the values imply. Replay never changes a stored value.
    fn hydrate(
        engine: Arc<CertificateEngine>,
        record: &CertificateRecord,
        mode: Mode,
        ctx: EvaluationContext,
    ) -> Result<Self, SessionError> {
        let registry = FieldRegistry::with_values(engine.schema(), record.values.iter())?;
        let mut session = Self {
            engine,
            registry,
            state: SessionState::Editing,
            mode,
            event: record.event.clone(),
            org_unit: record.org_unit.clone(),
            ctx,
            attempts: 0,
            last_failure: None,
            notice: BlacklistNotice::default(),
        };
        session.replay_enablement()?;
        debug!(event = ?session.event, ?mode, "certificate session opened");
        Ok(session)
    }

    fn replay_enablement(&mut self) -> Result<(), SessionError> {
        let stored: Vec<(FieldKey, FieldValue)> = self.registry.values();
        for (key, value) in stored {
            let mutations = self.engine.evaluator().evaluate(
                key.as_str(),
                &value,
                &self.registry.snapshot(),
                &self.ctx,
            );
            for mutation in mutations
                .iter()
                .filter(|m| matches!(m.change, MutationKind::Enable | MutationKind::Disable))
            {
                self.registry.apply(mutation)?;
            }
        }
        Ok(())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn event(&self) -> Option<&EventId> {
        self.event.as_ref()
    }

    pub fn last_failure(&self) -> Option<&SubmissionFailure> {
        self.last_failure.as_ref()
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    pub fn value(&self, key: &str) -> Result<&FieldValue, SessionError> {
        Ok(&self.registry.get(key)?.value)
    }

    pub fn is_enabled(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self.registry.get(key)?.enabled)
    }

    pub fn notice(&self) -> &BlacklistNotice {
        &self.notice
    }

    fn ensure_mutable(&self) -> Result<(), SessionError> {
        if self.mode == Mode::ViewOnly {
            return Err(SessionError::ViewOnly);
        }
        match self.state {
            SessionState::Submitting { .. } => Err(SessionError::Submitting),
            SessionState::Submitted { .. } => Err(SessionError::Submitted),
            SessionState::Creating | SessionState::Editing => Ok(()),
        }
    }

    /// Stores `value` in `key`, then applies whatever the rules derive from it.
    pub fn on_field_change(
        &mut self,
        key: &str,
        value: FieldValue,
    ) -> Result<FieldChange, SessionError> {
        self.ensure_mutable()?;
        self.ensure_enabled(&[key])?;

        let mutations =
            self.engine
                .evaluator()
                .evaluate(key, &value, &self.registry.snapshot(), &self.ctx);
        self.registry.set(key, FieldUpdate::value(value))?;
        self.apply_all(&mutations)?;

        if self.state == SessionState::Creating {
            self.state = SessionState::Editing;
        }
        debug!(field = key, mutations = mutations.len(), "field changed");

        Ok(FieldChange {
            can_submit: self.can_submit(),
            mutations,
        })
    }

    fn apply_all(&mut self, mutations: &[FieldMutation]) -> Result<(), SessionError> {
        for mutation in mutations {
            self.registry.apply(mutation)?;
        }
        Ok(())
    }

    /// Fails with `FieldDisabled` unless every key is currently enabled.
    fn ensure_enabled(&self, keys: &[&str]) -> Result<(), SessionError> {
        for key in keys {
            let field = self.registry.get(key)?;
            if !field.enabled {
                return Err(SessionError::FieldDisabled(field.key.clone()));
            }
        }
        Ok(())
    }

    /// A line is open once the cascade revealed it, in either entry mode.
    fn ensure_line_open(&self, line: CauseLine) -> Result<(), SessionError> {
        let keys = line.keys();
        if self.registry.get(keys.free_text)?.enabled {
            return Ok(());
        }
        self.ensure_enabled(&[keys.term])
    }

    fn apply_chain_edit(&mut self, mutations: Vec<FieldMutation>) -> Result<(), SessionError> {
        self.apply_all(&mutations)?;
        if self.state == SessionState::Creating {
            self.state = SessionState::Editing;
        }
        Ok(())
    }

    pub fn use_coded_entry(&mut self, line: CauseLine) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.ensure_line_open(line)?;
        self.apply_chain_edit(cause_chain::use_coded_entry(line))
    }

    pub fn use_free_text(&mut self, line: CauseLine) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.ensure_line_open(line)?;
        self.apply_chain_edit(cause_chain::use_free_text(line))
    }

    /// Records an ICD entity on a line that is open for coded entry.
    pub fn set_coded_cause(
        &mut self,
        line: CauseLine,
        cause: &CodedCause,
    ) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.ensure_enabled(&[line.keys().term])?;
        self.apply_chain_edit(cause_chain::set_coded_cause(line, cause))
    }

    /// Lists the lines that may become the underlying cause. Shows the
    /// injury-code notice when a recorded line had to be left out.
    pub fn open_underlying_picker(&self) -> UnderlyingPicker {
        let snapshot = self.registry.snapshot();
        let picker = UnderlyingPicker {
            candidates: cause_chain::underlying_candidates(&snapshot),
            blacklisted_found: cause_chain::blacklisted_found(&snapshot),
        };
        if picker.blacklisted_found {
            self.notice.show();
        }
        picker
    }

    /// The underlying cause opens once the chain has an interval on line a.
    pub fn choose_underlying(&mut self, line: CauseLine) -> Result<(), SessionError> {
        self.ensure_mutable()?;
        self.ensure_enabled(&[keys::UNDERLYING_CAUSE])?;
        let mutations = cause_chain::choose_underlying(&self.registry.snapshot(), line)?;
        self.apply_chain_edit(mutations)
    }

    pub fn validation_issues(&self) -> Vec<ValidationIssue> {
        validate(self.engine.schema(), &self.registry, self.ctx.today)
    }

    /// Ready when a declaration is made, the underlying cause and sex are
    /// recorded, nothing fails validation and the session is not read-only.
    pub fn can_submit(&self) -> bool {
        if self.mode == Mode::ViewOnly {
            return false;
        }
        let snapshot = self.registry.snapshot();
        let declared = keys::DECLARATIONS
            .iter()
            .any(|key| snapshot.value(key).is_truthy());
        declared
            && !snapshot.value(keys::UNDERLYING_CAUSE).is_empty()
            && !snapshot.value(keys::SEX).is_empty()
            && !has_errors(&self.validation_issues())
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        let snapshot = self.registry.snapshot();
        let mut reminders = Vec::new();

        let birth = snapshot.value(keys::DATE_OF_BIRTH).as_date();
        let death = snapshot.value(keys::DATE_OF_DEATH).as_date();
        if let (Some(birth), Some(death)) = (birth, death) {
            let days = (death - birth).num_days();
            if (0..FETAL_REMINDER_DAYS).contains(&days) {
                reminders.push(Reminder::FetalSection);
            }
        }

        if self.pregnancy_applies(&snapshot) && snapshot.value(keys::PREGNANCY_STATUS).is_empty() {
            reminders.push(Reminder::PregnancySection);
        }
        reminders
    }

    fn pregnancy_applies(&self, snapshot: &Snapshot) -> bool {
        let female = snapshot.value(keys::SEX).as_str() == Some(Sex::Female.code());
        let within = Predicate::AgeWithin {
            min: self.engine.config().childbearing_min_age,
            max: self.engine.config().childbearing_max_age,
        };
        let age = snapshot.value(keys::AGE);
        let age = if age.is_empty() {
            snapshot.value(keys::DATE_OF_BIRTH)
        } else {
            age
        };
        female && within.matches(age, snapshot, &self.ctx)
    }

    /// The certificate as it would be stored.
    pub fn to_record(&self) -> CertificateRecord {
        let values: BTreeMap<FieldKey, FieldValue> = self.registry.values().into_iter().collect();
        let event_date = values
            .get(keys::EVENT_DATE)
            .and_then(FieldValue::as_date)
            .unwrap_or(self.ctx.today);
        CertificateRecord {
            event: self.event.clone(),
            org_unit: self.org_unit.clone(),
            event_date,
            values,
        }
    }

    /// Moves to `Submitting`. Starting again while an attempt is in flight
    /// supersedes it; its response will be discarded.
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket, SessionError> {
        if self.mode == Mode::ViewOnly {
            return Err(SessionError::ViewOnly);
        }
        if matches!(self.state, SessionState::Submitted { .. }) {
            return Err(SessionError::Submitted);
        }
        if !self.can_submit() {
            return Err(SessionError::NotReady);
        }

        self.attempts += 1;
        let attempt = self.attempts;
        self.state = SessionState::Submitting { attempt };
        info!(attempt, event = ?self.event, "certificate submission started");

        Ok(SubmissionTicket {
            attempt,
            record: self.to_record(),
        })
    }

    /// Applies the response for `attempt`, unless a newer attempt took over.
    pub fn complete_submission(
        &mut self,
        attempt: u64,
        response: Result<EventId, ApiError>,
    ) -> CompletionOutcome {
        if self.state != (SessionState::Submitting { attempt }) {
            debug!(attempt, state = self.state.label(), "stale submission response discarded");
            return CompletionOutcome::Stale;
        }

        match response {
            Ok(event) => {
                info!(attempt, event = %event, "certificate submitted");
                self.event = Some(event.clone());
                self.last_failure = None;
                self.state = SessionState::Submitted {
                    event: event.clone(),
                };
                CompletionOutcome::Submitted(event)
            }
            Err(err) => {
                warn!(attempt, error = %err, "certificate submission failed");
                let failure = SubmissionFailure {
                    attempt,
                    message: err.to_string(),
                    retryable: err.is_transient(),
                };
                self.last_failure = Some(failure.clone());
                self.state = SessionState::Editing;
                CompletionOutcome::Failed(failure)
            }
        }
    }

    /// Evaluation date in use.
    pub fn today(&self) -> NaiveDate {
        self.ctx.today
    }
}
