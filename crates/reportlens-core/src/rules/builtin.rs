use crate::model::Field;
use crate::rules::Derivation;

/// Declarative extraction rule for one field.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRule {
    pub field: Field,
    pub labels: &'static [&'static str],
    pub aliases: &'static [&'static str],
    pub reject_prefixes: &'static [&'static str],
    /// Values above this are plausible but unusual.
    pub typical_max: f64,
    pub derivations: &'static [Derivation],
}

fn percent_of(v: &[f64]) -> f64 {
    v[0] / v[1] * 100.0
}

fn share_of(v: &[f64]) -> f64 {
    v[0] * v[1] / 100.0
}

fn whole_from_share(v: &[f64]) -> f64 {
    v[0] * 100.0 / v[1]
}

fn quotient(v: &[f64]) -> f64 {
    v[0] / v[1]
}

fn product(v: &[f64]) -> f64 {
    v[0] * v[1]
}

/// The builtin table, one entry per field.
pub const RULES: &[BuiltinRule] = &[
    BuiltinRule {
        field: Field::Impressions,
        labels: &["Impressions", "Impressions (Unique Devices)", "Total Impressions"],
        aliases: &["Search Impressions", "Store Impressions", "Views in Search"],
        reject_prefixes: &[],
        typical_max: 1e10,
        derivations: &[],
    },
    BuiltinRule {
        field: Field::PageViews,
        labels: &["Product Page Views", "Page Views"],
        aliases: &["Product Page Visits", "Page Visits", "Listing Views", "Store Listing Visitors"],
        reject_prefixes: &[],
        typical_max: 1e10,
        derivations: &[
            Derivation {
                inputs: &[Field::Downloads, Field::ConversionRate],
                formula: whole_from_share,
                expression: "downloads * 100 / conversionRate",
            },
            Derivation {
                inputs: &[Field::Impressions, Field::ConversionRate],
                formula: share_of,
                expression: "impressions * conversionRate / 100",
            },
        ],
    },
    BuiltinRule {
        field: Field::ConversionRate,
        labels: &["Conversion Rate", "App Units Conversion Rate", "Conversion"],
        aliases: &["CVR", "Conv. Rate", "Install Rate", "Download Rate"],
        reject_prefixes: &[],
        typical_max: 60.0,
        derivations: &[Derivation {
            inputs: &[Field::Downloads, Field::PageViews],
            formula: percent_of,
            expression: "downloads / pageViews * 100",
        }],
    },
    BuiltinRule {
        field: Field::Downloads,
        labels: &["Total Downloads", "Downloads", "App Units", "Units"],
        aliases: &["Installs", "Installations", "New Installs", "Acquisitions"],
        reject_prefixes: &[
            "first-time",
            "first time",
            "active",
            "daily",
            "pre-order",
            "re-",
            "re",
        ],
        typical_max: 1e9,
        derivations: &[Derivation {
            inputs: &[Field::PageViews, Field::ConversionRate],
            formula: share_of,
            expression: "pageViews * conversionRate / 100",
        }],
    },
    BuiltinRule {
        field: Field::Redownloads,
        labels: &["Redownloads", "Re-downloads"],
        aliases: &["Reinstalls", "Re-installs"],
        reject_prefixes: &[],
        typical_max: 1e9,
        derivations: &[],
    },
    BuiltinRule {
        field: Field::Proceeds,
        labels: &["Proceeds", "Total Proceeds", "Revenue", "Total Revenue"],
        aliases: &["Sales", "Earnings", "Gross Revenue", "Income"],
        reject_prefixes: &["in-app"],
        typical_max: 1e10,
        derivations: &[],
    },
    BuiltinRule {
        field: Field::PayingUsers,
        labels: &["Paying Users", "Paying Customers"],
        aliases: &["Payers", "Purchasers", "Subscribers"],
        reject_prefixes: &[],
        typical_max: 1e9,
        derivations: &[],
    },
    BuiltinRule {
        field: Field::Arppu,
        labels: &[
            "Proceeds per Paying User",
            "ARPPU",
            "Average Revenue per Paying User",
        ],
        aliases: &["Revenue per Paying User", "Revenue per Payer"],
        reject_prefixes: &[],
        typical_max: 1_000.0,
        derivations: &[Derivation {
            inputs: &[Field::Proceeds, Field::PayingUsers],
            formula: quotient,
            expression: "proceeds / payingUsers",
        }],
    },
    BuiltinRule {
        field: Field::Arpd,
        labels: &[
            "ARPD",
            "Average Proceeds per Download",
            "Proceeds per Download",
        ],
        aliases: &["Revenue per Download", "ARPU", "Average Revenue per User"],
        reject_prefixes: &[],
        typical_max: 100.0,
        derivations: &[Derivation {
            inputs: &[Field::Proceeds, Field::Downloads],
            formula: quotient,
            expression: "proceeds / downloads",
        }],
    },
    BuiltinRule {
        field: Field::Sessions,
        labels: &["Sessions", "Total Sessions"],
        aliases: &["App Sessions", "Session Count", "Usage Sessions"],
        reject_prefixes: &["avg.", "avg", "average"],
        typical_max: 1e11,
        derivations: &[Derivation {
            inputs: &[Field::SessionsPerDevice, Field::ActiveDevices],
            formula: product,
            expression: "sessionsPerDevice * activeDevices",
        }],
    },
    BuiltinRule {
        field: Field::ActiveDevices,
        labels: &["Active Devices", "Active Users"],
        aliases: &[
            "Daily Active Users",
            "Monthly Active Users",
            "DAU",
            "MAU",
            "Active Installs",
        ],
        reject_prefixes: &[],
        typical_max: 1e10,
        derivations: &[],
    },
    BuiltinRule {
        field: Field::SessionsPerDevice,
        labels: &["Sessions per Active Device", "Sessions per Device"],
        aliases: &["Sessions per User", "Average Sessions", "Avg. Sessions"],
        reject_prefixes: &[],
        typical_max: 50.0,
        derivations: &[Derivation {
            inputs: &[Field::Sessions, Field::ActiveDevices],
            formula: quotient,
            expression: "sessions / activeDevices",
        }],
    },
    BuiltinRule {
        field: Field::Crashes,
        labels: &["Crashes", "Total Crashes", "Crash Count"],
        aliases: &["App Crashes", "Crash Reports"],
        reject_prefixes: &[],
        typical_max: 1e8,
        derivations: &[],
    },
    BuiltinRule {
        field: Field::CrashRate,
        labels: &["Crash Rate"],
        aliases: &["Crashes per Session", "Crash Percentage"],
        reject_prefixes: &[],
        typical_max: 20.0,
        derivations: &[Derivation {
            inputs: &[Field::Crashes, Field::Sessions],
            formula: percent_of,
            expression: "crashes / sessions * 100",
        }],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn one_rule_per_field() {
        let fields: HashSet<Field> = RULES.iter().map(|r| r.field).collect();
        assert_eq!(fields.len(), RULES.len());
        assert_eq!(fields.len(), Field::ALL.len());
    }

    #[test]
    fn every_rule_has_primary_labels() {
        assert!(RULES.iter().all(|r| !r.labels.is_empty()));
    }

    #[test]
    fn derivation_inputs_never_include_the_target() {
        for rule in RULES {
            for d in rule.derivations {
                assert!(!d.inputs.contains(&rule.field), "{} derives itself", rule.field);
            }
        }
    }

    #[test]
    fn conversion_rate_formula() {
        let d = &RULES
            .iter()
            .find(|r| r.field == Field::ConversionRate)
            .unwrap()
            .derivations[0];
        assert_eq!((d.formula)(&[500.0, 10_000.0]), 5.0);
    }
}
