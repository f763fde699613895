//! The rule catalog of the standard certificate form.

use super::{Action, Predicate, Rule, RuleConfig};
use crate::certificate::domain::FieldKey;
use crate::certificate::options::{OptionCode, Sex, YesNo};
use crate::certificate::schema::keys;

/// `(interval unit, interval, fields revealed by the interval)` per chain line.
const CAUSE_CASCADE: [(&str, &str, &[&str]); 4] = [
    (
        keys::LINE_A_INTERVAL_UNIT,
        keys::LINE_A_INTERVAL,
        &[keys::LINE_B_TERM, keys::UNDERLYING_CAUSE],
    ),
    (
        keys::LINE_B_INTERVAL_UNIT,
        keys::LINE_B_INTERVAL,
        &[keys::LINE_C_TERM],
    ),
    (
        keys::LINE_C_INTERVAL_UNIT,
        keys::LINE_C_INTERVAL,
        &[keys::LINE_D_TERM],
    ),
    (
        keys::LINE_D_INTERVAL_UNIT,
        keys::LINE_D_INTERVAL,
        &[keys::UNDERLYING_CAUSE],
    ),
];

fn keys_of(fields: &[&str]) -> Vec<FieldKey> {
    fields.iter().map(|key| FieldKey::from(*key)).collect()
}

fn is_yes() -> Predicate {
    Predicate::equals_code(YesNo::Yes.code())
}

fn is_female() -> Predicate {
    Predicate::equals_code(Sex::Female.code())
}

/// Builds the standard rule set in evaluation order.
pub fn standard_rules(config: &RuleConfig) -> Vec<Rule> {
    let mut rules = Vec::new();
    manner_of_death(&mut rules);
    external_cause(&mut rules);
    age_and_infancy(&mut rules, config);
    chronology(&mut rules, config);
    frame_b(&mut rules);
    pregnancy(&mut rules, config);
    cause_chain(&mut rules);
    rules
}

fn manner_of_death(rules: &mut Vec<Rule>) {
    for manner in keys::MANNER_OF_DEATH {
        let others: Vec<&str> = keys::MANNER_OF_DEATH
            .into_iter()
            .filter(|other| *other != manner)
            .collect();

        rules.push(
            Rule::when(
                format!("manner {manner} excludes the other categories"),
                manner,
                Predicate::Truthy,
            )
            .disable(&others),
        );
        rules.push(
            Rule::when(
                format!("manner {manner} cleared releases every category"),
                manner,
                Predicate::AllFalsy(keys_of(&keys::MANNER_OF_DEATH)),
            )
            .enable(&keys::MANNER_OF_DEATH),
        );
    }
}

fn external_cause(rules: &mut Vec<Rule>) {
    let details = [keys::EXTERNAL_CAUSE_DESCRIPTION, keys::EXTERNAL_CAUSE_PLACE];

    rules.push(
        Rule::when(
            "external cause reveals injury details",
            keys::EXTERNAL_CAUSE,
            Predicate::Truthy,
        )
        .enable(&details),
    );
    rules.push(
        Rule::when(
            "external cause unset hides injury details",
            keys::EXTERNAL_CAUSE,
            Predicate::Falsy,
        )
        .disable(&details),
    );
    rules.push(
        Rule::when(
            "disease rules out an external cause",
            keys::MANNER_DISEASE,
            Predicate::Truthy,
        )
        .disable(&details)
        .disable(&[keys::EXTERNAL_CAUSE]),
    );
    rules.push(
        Rule::when(
            "disease unset allows an external cause",
            keys::MANNER_DISEASE,
            Predicate::Falsy,
        )
        .enable(&[keys::EXTERNAL_CAUSE]),
    );
    rules.push(
        Rule::when(
            "disease unset restores recorded injury details",
            keys::MANNER_DISEASE,
            Predicate::All(vec![
                Predicate::Falsy,
                Predicate::field(keys::EXTERNAL_CAUSE, Predicate::Truthy),
            ]),
        )
        .enable(&details),
    );
}

fn age_and_infancy(rules: &mut Vec<Rule>, config: &RuleConfig) {
    let limit = config.neonatal_age_limit_years;
    let infant_fields: Vec<&str> = keys::FETAL_INFANT
        .into_iter()
        .filter(|key| *key != keys::HOURS_SURVIVED)
        .collect();
    let not_stillborn = Predicate::field(keys::STILLBORN, Predicate::not(is_yes()));

    rules.push(
        Rule::when(
            "birth date derives and locks age",
            keys::DATE_OF_BIRTH,
            Predicate::Present,
        )
        .then(keys::AGE, Action::DeriveAge)
        .disable(&[keys::AGE]),
    );
    rules.push(
        Rule::when(
            "birth date removed unlocks age",
            keys::DATE_OF_BIRTH,
            Predicate::Absent,
        )
        .enable(&[keys::AGE]),
    );

    for (source, label) in [(keys::DATE_OF_BIRTH, "birth date"), (keys::AGE, "age")] {
        rules.push(
            Rule::when(
                format!("{label} above infancy locks the fetal section"),
                source,
                Predicate::All(vec![Predicate::Present, Predicate::AgeAbove(limit)]),
            )
            .disable(&keys::FETAL_INFANT),
        );
        rules.push(
            Rule::when(
                format!("{label} within infancy opens the fetal section"),
                source,
                Predicate::All(vec![
                    Predicate::Present,
                    Predicate::not(Predicate::AgeAbove(limit)),
                ]),
            )
            .enable(&infant_fields),
        );
        rules.push(
            Rule::when(
                format!("{label} within infancy opens hours survived"),
                source,
                Predicate::All(vec![
                    Predicate::Present,
                    Predicate::not(Predicate::AgeAbove(limit)),
                    not_stillborn.clone(),
                ]),
            )
            .enable(&[keys::HOURS_SURVIVED]),
        );
    }

    rules.push(
        Rule::when(
            "stillborn clears hours survived",
            keys::STILLBORN,
            is_yes(),
        )
        .reset(&[keys::HOURS_SURVIVED]),
    );
    rules.push(
        Rule::when(
            "live birth opens hours survived",
            keys::STILLBORN,
            Predicate::All(vec![
                Predicate::not(is_yes()),
                Predicate::field(keys::AGE, Predicate::not(Predicate::AgeAbove(limit))),
            ]),
        )
        .enable(&[keys::HOURS_SURVIVED]),
    );
}

fn chronology(rules: &mut Vec<Rule>, config: &RuleConfig) {
    rules.push(
        Rule::when(
            "death before birth is rejected",
            keys::DATE_OF_DEATH,
            Predicate::DateBefore(FieldKey::from(keys::DATE_OF_BIRTH)),
        )
        .clear(&[keys::DATE_OF_DEATH]),
    );
    rules.push(
        Rule::when(
            "injury outside the lifetime is rejected",
            keys::INJURY_DATE,
            Predicate::Any(vec![
                Predicate::DateBefore(FieldKey::from(keys::DATE_OF_BIRTH)),
                Predicate::DateAfter(FieldKey::from(keys::DATE_OF_DEATH)),
            ]),
        )
        .clear(&[keys::INJURY_DATE]),
    );
    rules.push(
        Rule::when(
            "surgery outside the lookback is rejected",
            keys::SURGERY_DATE,
            Predicate::MoreThanWeeksBefore {
                reference: FieldKey::from(keys::DATE_OF_DEATH),
                weeks: config.surgery_lookback_weeks,
            },
        )
        .clear(&[keys::SURGERY_DATE]),
    );
}

fn frame_b(rules: &mut Vec<Rule>) {
    let surgery_details = [keys::SURGERY_DATE, keys::SURGERY_REASON];

    rules.push(
        Rule::when("surgery reveals its details", keys::SURGERY_PERFORMED, is_yes())
            .enable(&surgery_details),
    );
    rules.push(
        Rule::when(
            "no surgery clears its details",
            keys::SURGERY_PERFORMED,
            Predicate::not(is_yes()),
        )
        .reset(&surgery_details),
    );
    rules.push(
        Rule::when(
            "autopsy reveals findings question",
            keys::AUTOPSY_REQUESTED,
            is_yes(),
        )
        .enable(&[keys::AUTOPSY_FINDINGS_USED]),
    );
    rules.push(
        Rule::when(
            "no autopsy clears findings question",
            keys::AUTOPSY_REQUESTED,
            Predicate::not(is_yes()),
        )
        .reset(&[keys::AUTOPSY_FINDINGS_USED]),
    );
}

fn pregnancy(rules: &mut Vec<Rule>, config: &RuleConfig) {
    let window = Predicate::AgeWithin {
        min: config.childbearing_min_age,
        max: config.childbearing_max_age,
    };
    let mut maternal = vec![keys::PREGNANCY_STATUS];
    maternal.extend(keys::PREGNANCY_DETAILS);

    let eligibility = [
        (
            keys::SEX,
            "sex",
            Predicate::All(vec![
                is_female(),
                Predicate::field(keys::AGE, window.clone()),
            ]),
        ),
        (
            keys::AGE,
            "age",
            Predicate::All(vec![
                window.clone(),
                Predicate::field(keys::SEX, is_female()),
            ]),
        ),
        (
            keys::DATE_OF_BIRTH,
            "birth date",
            Predicate::All(vec![window, Predicate::field(keys::SEX, is_female())]),
        ),
    ];

    for (source, label, eligible) in eligibility {
        // A removed birth date hands the decision back to the age field.
        let guard = |predicate: Predicate| {
            if source == keys::DATE_OF_BIRTH {
                Predicate::All(vec![Predicate::Present, predicate])
            } else {
                predicate
            }
        };

        rules.push(
            Rule::when(
                format!("{label} makes the pregnancy question applicable"),
                source,
                guard(eligible.clone()),
            )
            .enable(&[keys::PREGNANCY_STATUS]),
        );
        rules.push(
            Rule::when(
                format!("{label} makes the pregnancy question inapplicable"),
                source,
                guard(Predicate::not(eligible)),
            )
            .reset(&maternal),
        );
    }

    rules.push(
        Rule::when(
            "pregnancy reveals maternal details",
            keys::PREGNANCY_STATUS,
            is_yes(),
        )
        .enable(&keys::PREGNANCY_DETAILS),
    );
    rules.push(
        Rule::when(
            "no pregnancy clears maternal details",
            keys::PREGNANCY_STATUS,
            Predicate::not(is_yes()),
        )
        .reset(&keys::PREGNANCY_DETAILS),
    );
}

fn cause_chain(rules: &mut Vec<Rule>) {
    for (unit, interval, revealed) in CAUSE_CASCADE {
        rules.push(
            Rule::when(
                format!("interval unit {unit} reveals its interval"),
                unit,
                Predicate::Present,
            )
            .enable(&[interval]),
        );
        rules.push(
            Rule::when(
                format!("interval {interval} reveals the next cause"),
                interval,
                Predicate::Present,
            )
            .enable(revealed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::rules::RuleSet;
    use crate::certificate::schema::CertificateSchema;

    #[test]
    fn standard_rules_register_against_the_standard_schema() {
        let rules = standard_rules(&RuleConfig::default());
        let count = rules.len();

        let set = RuleSet::new(&CertificateSchema::standard(), rules).expect("catalog is valid");
        assert_eq!(set.len(), count);
    }

    #[test]
    fn every_manner_has_an_exclusivity_rule() {
        let rules = standard_rules(&RuleConfig::default());
        for manner in keys::MANNER_OF_DEATH {
            assert!(rules
                .iter()
                .any(|rule| rule.trigger.field.as_str() == manner
                    && rule.trigger.predicate == Predicate::Truthy
                    && rule.effects.len() == keys::MANNER_OF_DEATH.len() - 1));
        }
    }
}
