use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::FieldKey;

/// Data element identifiers of the standard certificate program stage.
pub mod keys {
    pub const EVENT_DATE: &str = "eventDate";

    // Deceased
    pub const FULL_NAME: &str = "ZYKmQ9GPOaF";
    pub const NATIONAL_ID: &str = "MOstDqSY0gO";
    pub const REGION: &str = "zwKo51BEayZ";
    pub const APPROVAL_STATUS: &str = "twVlVWM3ffz";
    pub const DISTRICT: &str = "t5nTEmlScSt";
    pub const OCCUPATION: &str = "b70okb06FWa";
    pub const SUB_COUNTY: &str = "u44XP9fZweA";
    pub const VILLAGE: &str = "dsiwvNQLe5n";
    pub const DATE_OF_BIRTH: &str = "RbrUuKFSqkZ";
    pub const AGE: &str = "q7e7FOXKnOf";
    pub const SEX: &str = "e96GB4CXyd3";
    pub const PLACE_OF_BIRTH: &str = "xNCSFrgdUgi";
    pub const DATE_OF_DEATH: &str = "i8rrl8YWxLF";

    // Frame A, line a
    pub const LINE_A_TERM: &str = "sfpqAeqKeyQ";
    pub const LINE_A_CODE: &str = "zD0E77W4rFs";
    pub const LINE_A_FREE_TEXT: &str = "QHY3iYRLvMp";
    pub const LINE_A_INTERVAL_UNIT: &str = "Ylht9kCLSRW";
    pub const LINE_A_INTERVAL: &str = "WkXxkKEJLsg";
    pub const LINE_A_URI: &str = "k9xdBQzYMXo";

    // Frame A, line b
    pub const LINE_B_TERM: &str = "zb7uTuBCPrN";
    pub const LINE_B_CODE: &str = "tuMMQsGtE69";
    pub const LINE_B_FREE_TEXT: &str = "NkiH8GTX6HC";
    pub const LINE_B_INTERVAL_UNIT: &str = "myydnkmLfhp";
    pub const LINE_B_INTERVAL: &str = "fleGy9CvHYh";
    pub const LINE_B_URI: &str = "yftBZ5bSEOb";

    // Frame A, line c
    pub const LINE_C_TERM: &str = "QGFYJK00ES7";
    pub const LINE_C_CODE: &str = "C8n6hBilwsX";
    pub const LINE_C_FREE_TEXT: &str = "SDPq8UURlWc";
    pub const LINE_C_INTERVAL_UNIT: &str = "aC64sB86ThG";
    pub const LINE_C_INTERVAL: &str = "hO8No9fHVd2";
    pub const LINE_C_URI: &str = "fJUy96o8akn";

    // Frame A, line d
    pub const LINE_D_TERM: &str = "CnPGhOcERFF";
    pub const LINE_D_CODE: &str = "IeS8V8Yf40N";
    pub const LINE_D_FREE_TEXT: &str = "zqW9xWyqOur";
    pub const LINE_D_INTERVAL_UNIT: &str = "cmZrrHfTxW3";
    pub const LINE_D_INTERVAL: &str = "eCVDO6lt4go";
    pub const LINE_D_URI: &str = "S53kx50gjQn";

    // Underlying cause
    pub const UNDERLYING_CAUSE: &str = "QTKk2Xt8KDu";
    pub const UNDERLYING_CODE: &str = "sJhOdGLD5lj";
    pub const UNDERLYING_URI: &str = "L97MrAMAav9";
    pub const UNDERLYING_DISPLAY_CODE: &str = "dTd7txVzhgY";

    // Frame B
    pub const SURGERY_PERFORMED: &str = "Kk0hmrJPR90";
    pub const SURGERY_DATE: &str = "j5TIQx3gHyF";
    pub const SURGERY_REASON: &str = "JhHwdQ337nn";
    pub const AUTOPSY_REQUESTED: &str = "jY3K6Bv4o9Q";
    pub const AUTOPSY_FINDINGS_USED: &str = "UfG52s4YcUt";

    // Manner of death
    pub const MANNER_DISEASE: &str = "FhHPxY16vet";
    pub const MANNER_ACCIDENT: &str = "gNM2Yhypydx";
    pub const MANNER_SELF_HARM: &str = "wX3i3gkTG4m";
    pub const MANNER_ASSAULT: &str = "KsGOxFyzIs1";
    pub const MANNER_LEGAL_INTERVENTION: &str = "tYH7drlbNya";
    pub const MANNER_WAR: &str = "xDMX2CJ4Xw3";
    pub const MANNER_UNDETERMINED: &str = "b4yPk98om7e";
    pub const MANNER_PENDING_INVESTIGATION: &str = "fQWuywOaoN2";
    pub const MANNER_UNKNOWN: &str = "o1hG9vr0peF";
    pub const EXTERNAL_CAUSE: &str = "AZSlwlRAFig";
    pub const INJURY_DATE: &str = "U18Tnfz9EKd";
    pub const EXTERNAL_CAUSE_DESCRIPTION: &str = "DKlOhZJOCrX";
    pub const EXTERNAL_CAUSE_PLACE: &str = "kGIDD5xIeLC";

    // Fetal or infant death
    pub const MULTIPLE_PREGNANCY: &str = "V4rE1tsj5Rb";
    pub const STILLBORN: &str = "ivnHp4M4hFF";
    pub const HOURS_SURVIVED: &str = "jf9TogeSZpk";
    pub const BIRTH_WEIGHT: &str = "xAWYJtQsg8M";
    pub const WEEKS_OF_PREGNANCY: &str = "lQ1Byr04JTx";
    pub const MOTHER_AGE: &str = "DdfDMFW4EJ9";
    pub const PERINATAL_MATERNAL_CONDITIONS: &str = "GFVhltTCG8b";

    // Maternal death
    pub const PREGNANCY_STATUS: &str = "zcn7acUB6x1";
    pub const PREGNANCY_TIMING: &str = "KpfvNQSsWIw";
    pub const PREGNANCY_CONTRIBUTED: &str = "AJAraEcfH63";
    pub const REFERRED_FROM: &str = "RJhbkjYrODG";
    pub const PARITY: &str = "ymyLrfEcYkD";
    pub const MODE_OF_DELIVERY: &str = "K5BDPJQk1BP";
    pub const PLACE_OF_DELIVERY: &str = "Z41di0TRjIu";
    pub const SKILLED_ATTENDANT: &str = "uaxjt0inPNF";

    // Declarations
    pub const DECLARATION_ATTENDED: &str = "u9tYUv6AM51";
    pub const DECLARATION_EXAMINED: &str = "ZXZZfzBpu8a";
    pub const DECLARATION_POST_MORTEM: &str = "cp5xzqVU2Vw";
    pub const DECLARATION_OTHER: &str = "lu9BiHPxNqH";

    /// Mutually exclusive manner-of-death categories, in form order.
    pub const MANNER_OF_DEATH: [&str; 9] = [
        MANNER_DISEASE,
        MANNER_ACCIDENT,
        MANNER_SELF_HARM,
        MANNER_ASSAULT,
        MANNER_LEGAL_INTERVENTION,
        MANNER_WAR,
        MANNER_UNDETERMINED,
        MANNER_PENDING_INVESTIGATION,
        MANNER_UNKNOWN,
    ];

    /// Fields that only apply to fetal or infant deaths.
    pub const FETAL_INFANT: [&str; 7] = [
        MULTIPLE_PREGNANCY,
        STILLBORN,
        HOURS_SURVIVED,
        BIRTH_WEIGHT,
        WEEKS_OF_PREGNANCY,
        MOTHER_AGE,
        PERINATAL_MATERNAL_CONDITIONS,
    ];

    /// Follow-up questions gated by the pregnancy status answer.
    pub const PREGNANCY_DETAILS: [&str; 7] = [
        PREGNANCY_TIMING,
        PREGNANCY_CONTRIBUTED,
        REFERRED_FROM,
        PARITY,
        MODE_OF_DELIVERY,
        PLACE_OF_DELIVERY,
        SKILLED_ATTENDANT,
    ];

    /// At least one of these must be completed before saving.
    pub const DECLARATIONS: [&str; 4] = [
        DECLARATION_ATTENDED,
        DECLARATION_EXAMINED,
        DECLARATION_POST_MORTEM,
        DECLARATION_OTHER,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Entry,
    Deceased,
    FrameA,
    FrameB,
    MannerOfDeath,
    FetalOrInfant,
    Maternal,
    Declarations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Inclusive numeric bounds and how strongly they are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number {
        integer: bool,
        range: Option<NumberRange>,
    },
    Date {
        allow_future: bool,
    },
    DateTime {
        allow_future: bool,
    },
    Boolean,
    Coded {
        option_set: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub section: Section,
    pub kind: FieldKind,
    pub required: bool,
    pub enabled_by_default: bool,
}

impl FieldSpec {
    const fn new(key: &'static str, label: &'static str, section: Section, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            section,
            kind,
            required: false,
            enabled_by_default: true,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn disabled(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    pub fn field_key(&self) -> FieldKey {
        FieldKey::from(self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
}

/// Declared field set of a certificate form.
#[derive(Debug, Clone)]
pub struct CertificateSchema {
    fields: Vec<FieldSpec>,
    index: BTreeMap<&'static str, usize>,
}

impl CertificateSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut index = BTreeMap::new();
        for (position, spec) in fields.iter().enumerate() {
            if index.insert(spec.key, position).is_some() {
                return Err(SchemaError::DuplicateField(spec.key.to_string()));
            }
        }
        Ok(Self { fields, index })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn spec(&self, key: &str) -> Option<&FieldSpec> {
        self.index.get(key).map(|position| &self.fields[*position])
    }

    /// Fields in form order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn standard() -> Self {
        let fields = standard_fields();
        let index = fields
            .iter()
            .enumerate()
            .map(|(position, spec)| (spec.key, position))
            .collect();
        Self { fields, index }
    }
}

const YES_NO: FieldKind = FieldKind::Coded { option_set: "YN01" };
const INTERVAL_UNIT: FieldKind = FieldKind::Coded { option_set: "TI01" };
const PAST_DATE: FieldKind = FieldKind::Date {
    allow_future: false,
};

const fn number(min: Option<f64>, max: Option<f64>, severity: Severity) -> FieldKind {
    FieldKind::Number {
        integer: false,
        range: Some(NumberRange { min, max, severity }),
    }
}

const fn whole_number(min: Option<f64>, max: Option<f64>, severity: Severity) -> FieldKind {
    FieldKind::Number {
        integer: true,
        range: Some(NumberRange { min, max, severity }),
    }
}

fn cause_line(
    fields: &mut Vec<FieldSpec>,
    [term, code, free_text, unit, interval, uri]: [&'static str; 6],
    first: bool,
) {
    let term_spec = FieldSpec::new(term, "Cause of death (ICD-11 term)", Section::FrameA, FieldKind::Text);
    fields.push(if first { term_spec } else { term_spec.disabled() });
    fields.push(FieldSpec::new(code, "Code", Section::FrameA, FieldKind::Text));
    fields.push(
        FieldSpec::new(free_text, "Cause of death free text", Section::FrameA, FieldKind::Text)
            .disabled(),
    );
    fields.push(FieldSpec::new(
        unit,
        "Time interval type from onset to death",
        Section::FrameA,
        INTERVAL_UNIT,
    ));
    fields.push(
        FieldSpec::new(
            interval,
            "Time interval from onset to death",
            Section::FrameA,
            whole_number(Some(1.0), None, Severity::Error),
        )
        .disabled(),
    );
    fields.push(FieldSpec::new(uri, "ICD-11 URI", Section::FrameA, FieldKind::Text));
}

fn standard_fields() -> Vec<FieldSpec> {
    use keys::*;

    let mut fields = vec![
        FieldSpec::new(EVENT_DATE, "Date of entry", Section::Entry, PAST_DATE).required(),
        FieldSpec::new(FULL_NAME, "Name (full name)", Section::Deceased, FieldKind::Text).required(),
        FieldSpec::new(
            NATIONAL_ID,
            "NIN (National Identification Number)",
            Section::Deceased,
            FieldKind::Text,
        ),
        FieldSpec::new(REGION, "Region", Section::Deceased, FieldKind::Text),
        FieldSpec::new(APPROVAL_STATUS, "Approval status", Section::Deceased, FieldKind::Text),
        FieldSpec::new(DISTRICT, "District", Section::Deceased, FieldKind::Text),
        FieldSpec::new(OCCUPATION, "Occupation", Section::Deceased, FieldKind::Text),
        FieldSpec::new(SUB_COUNTY, "Sub-county", Section::Deceased, FieldKind::Text),
        FieldSpec::new(VILLAGE, "Village", Section::Deceased, FieldKind::Text),
        FieldSpec::new(DATE_OF_BIRTH, "Date of birth", Section::Deceased, PAST_DATE),
        FieldSpec::new(
            AGE,
            "Age",
            Section::Deceased,
            whole_number(Some(0.0), Some(120.0), Severity::Error),
        ),
        FieldSpec::new(SEX, "Sex", Section::Deceased, FieldKind::Coded { option_set: "SX01" })
            .required(),
        FieldSpec::new(PLACE_OF_BIRTH, "Place of birth", Section::Deceased, FieldKind::Text),
        FieldSpec::new(
            DATE_OF_DEATH,
            "Date and time of death",
            Section::Deceased,
            FieldKind::DateTime {
                allow_future: false,
            },
        )
        .required(),
    ];

    cause_line(
        &mut fields,
        [
            LINE_A_TERM,
            LINE_A_CODE,
            LINE_A_FREE_TEXT,
            LINE_A_INTERVAL_UNIT,
            LINE_A_INTERVAL,
            LINE_A_URI,
        ],
        true,
    );
    cause_line(
        &mut fields,
        [
            LINE_B_TERM,
            LINE_B_CODE,
            LINE_B_FREE_TEXT,
            LINE_B_INTERVAL_UNIT,
            LINE_B_INTERVAL,
            LINE_B_URI,
        ],
        false,
    );
    cause_line(
        &mut fields,
        [
            LINE_C_TERM,
            LINE_C_CODE,
            LINE_C_FREE_TEXT,
            LINE_C_INTERVAL_UNIT,
            LINE_C_INTERVAL,
            LINE_C_URI,
        ],
        false,
    );
    cause_line(
        &mut fields,
        [
            LINE_D_TERM,
            LINE_D_CODE,
            LINE_D_FREE_TEXT,
            LINE_D_INTERVAL_UNIT,
            LINE_D_INTERVAL,
            LINE_D_URI,
        ],
        false,
    );

    fields.extend([
        FieldSpec::new(
            UNDERLYING_CAUSE,
            "State the underlying cause",
            Section::FrameA,
            FieldKind::Text,
        )
        .disabled(),
        FieldSpec::new(UNDERLYING_CODE, "Underlying cause code", Section::FrameA, FieldKind::Text),
        FieldSpec::new(UNDERLYING_URI, "Underlying cause URI", Section::FrameA, FieldKind::Text),
        FieldSpec::new(
            UNDERLYING_DISPLAY_CODE,
            "Underlying cause code (display)",
            Section::FrameA,
            FieldKind::Text,
        ),
        FieldSpec::new(
            SURGERY_PERFORMED,
            "Was surgery performed within the last 4 weeks?",
            Section::FrameB,
            YES_NO,
        ),
        FieldSpec::new(
            SURGERY_DATE,
            "If yes please specify date of surgery",
            Section::FrameB,
            PAST_DATE,
        )
        .disabled(),
        FieldSpec::new(
            SURGERY_REASON,
            "If yes please specify reason for surgery (disease or condition)",
            Section::FrameB,
            FieldKind::Text,
        )
        .disabled(),
        FieldSpec::new(
            AUTOPSY_REQUESTED,
            "Was an autopsy requested?",
            Section::FrameB,
            YES_NO,
        ),
        FieldSpec::new(
            AUTOPSY_FINDINGS_USED,
            "If yes were the findings used in the certification?",
            Section::FrameB,
            YES_NO,
        )
        .disabled(),
        FieldSpec::new(MANNER_DISEASE, "Disease", Section::MannerOfDeath, FieldKind::Boolean),
        FieldSpec::new(MANNER_ACCIDENT, "Accident", Section::MannerOfDeath, FieldKind::Boolean),
        FieldSpec::new(
            MANNER_SELF_HARM,
            "Intentional self-harm",
            Section::MannerOfDeath,
            FieldKind::Boolean,
        ),
        FieldSpec::new(MANNER_ASSAULT, "Assault", Section::MannerOfDeath, FieldKind::Boolean),
        FieldSpec::new(
            MANNER_LEGAL_INTERVENTION,
            "Legal intervention",
            Section::MannerOfDeath,
            FieldKind::Boolean,
        ),
        FieldSpec::new(MANNER_WAR, "War", Section::MannerOfDeath, FieldKind::Boolean),
        FieldSpec::new(
            MANNER_UNDETERMINED,
            "Could not be determined",
            Section::MannerOfDeath,
            FieldKind::Boolean,
        ),
        FieldSpec::new(
            MANNER_PENDING_INVESTIGATION,
            "Pending investigation",
            Section::MannerOfDeath,
            FieldKind::Boolean,
        ),
        FieldSpec::new(MANNER_UNKNOWN, "Unknown", Section::MannerOfDeath, FieldKind::Boolean),
        FieldSpec::new(
            EXTERNAL_CAUSE,
            "If external cause or poisoning",
            Section::MannerOfDeath,
            FieldKind::Boolean,
        ),
        FieldSpec::new(INJURY_DATE, "Date of injury", Section::MannerOfDeath, PAST_DATE),
        FieldSpec::new(
            EXTERNAL_CAUSE_DESCRIPTION,
            "Describe how the external cause occurred",
            Section::MannerOfDeath,
            FieldKind::Text,
        )
        .disabled(),
        FieldSpec::new(
            EXTERNAL_CAUSE_PLACE,
            "Place of occurrence of the external cause",
            Section::MannerOfDeath,
            FieldKind::Text,
        )
        .disabled(),
        FieldSpec::new(MULTIPLE_PREGNANCY, "Multiple pregnancy", Section::FetalOrInfant, YES_NO),
        FieldSpec::new(STILLBORN, "Stillborn?", Section::FetalOrInfant, YES_NO),
        FieldSpec::new(
            HOURS_SURVIVED,
            "If death within 24 hrs specify the number of hours survived",
            Section::FetalOrInfant,
            whole_number(Some(0.0), Some(24.0), Severity::Error),
        ),
        FieldSpec::new(
            BIRTH_WEIGHT,
            "Birth weight (in grams)",
            Section::FetalOrInfant,
            number(Some(100.0), Some(10_000.0), Severity::Warning),
        ),
        FieldSpec::new(
            WEEKS_OF_PREGNANCY,
            "Number of completed weeks of pregnancy",
            Section::FetalOrInfant,
            whole_number(Some(10.0), Some(55.0), Severity::Warning),
        ),
        FieldSpec::new(
            MOTHER_AGE,
            "Age of mother (years)",
            Section::FetalOrInfant,
            whole_number(Some(10.0), Some(60.0), Severity::Warning),
        ),
        FieldSpec::new(
            PERINATAL_MATERNAL_CONDITIONS,
            "Conditions of mother that affected the fetus and newborn",
            Section::FetalOrInfant,
            FieldKind::Text,
        ),
        FieldSpec::new(
            PREGNANCY_STATUS,
            "For women, was the deceased pregnant or within 6 weeks of delivery?",
            Section::Maternal,
            YES_NO,
        )
        .disabled(),
        FieldSpec::new(PREGNANCY_TIMING, "At what point?", Section::Maternal, FieldKind::Text)
            .disabled(),
        FieldSpec::new(
            PREGNANCY_CONTRIBUTED,
            "Did the pregnancy contribute to the death?",
            Section::Maternal,
            YES_NO,
        )
        .disabled(),
        FieldSpec::new(
            REFERRED_FROM,
            "Referred from (level of care)",
            Section::Maternal,
            FieldKind::Text,
        )
        .disabled(),
        FieldSpec::new(
            PARITY,
            "Parity",
            Section::Maternal,
            whole_number(Some(0.0), None, Severity::Error),
        )
        .disabled(),
        FieldSpec::new(MODE_OF_DELIVERY, "Mode of delivery", Section::Maternal, FieldKind::Text)
            .disabled(),
        FieldSpec::new(PLACE_OF_DELIVERY, "Place of delivery", Section::Maternal, FieldKind::Text)
            .disabled(),
        FieldSpec::new(
            SKILLED_ATTENDANT,
            "Delivered by skilled attendant",
            Section::Maternal,
            YES_NO,
        )
        .disabled(),
        FieldSpec::new(
            DECLARATION_ATTENDED,
            "I attended the deceased during the last illness",
            Section::Declarations,
            FieldKind::Boolean,
        ),
        FieldSpec::new(
            DECLARATION_EXAMINED,
            "I examined the body after death",
            Section::Declarations,
            FieldKind::Boolean,
        ),
        FieldSpec::new(
            DECLARATION_POST_MORTEM,
            "I performed or reviewed the post-mortem",
            Section::Declarations,
            FieldKind::Boolean,
        ),
        FieldSpec::new(
            DECLARATION_OTHER,
            "Other basis for certification",
            Section::Declarations,
            FieldKind::Text,
        ),
    ]);

    fields
}
