use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub type DateSeries = BTreeMap<NaiveDate, f64>;

pub const CRORE: f64 = 10_000_000.0;
pub const LAKHS_PER_CRORE: f64 = 100.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rupees to crores, rounded to two places.
pub fn to_crores(rupees: f64) -> f64 {
    round2(rupees / CRORE)
}

pub fn lakhs_to_crores(lakhs: f64) -> f64 {
    round2(lakhs / LAKHS_PER_CRORE)
}

/// Market value of a face-value quantity at a price quoted per 100.
pub fn value_at_price(face: f64, price: f64) -> f64 {
    face * price / 100.0
}

/// Groups rows by date and sums the measure. Rows without a date or
/// measure are ignored; a date appears only if one of its rows had both.
pub fn sum_by_date<'r, T: 'r>(
    rows: impl IntoIterator<Item = &'r T>,
    date: impl Fn(&T) -> Option<NaiveDate>,
    measure: impl Fn(&T) -> Option<f64>,
) -> DateSeries {
    let mut series = DateSeries::new();
    for row in rows {
        if let (Some(d), Some(m)) = (date(row), measure(row)) {
            *series.entry(d).or_insert(0.0) += m;
        }
    }
    series
}

pub fn drop_zeros(series: DateSeries) -> DateSeries {
    series.into_iter().filter(|(_, v)| *v != 0.0).collect()
}

pub fn in_crores(series: DateSeries) -> DateSeries {
    series.into_iter().map(|(d, v)| (d, to_crores(v))).collect()
}

pub fn restrict_to(series: DateSeries, dates: &BTreeSet<NaiveDate>) -> DateSeries {
    series
        .into_iter()
        .filter(|(d, _)| dates.contains(d))
        .collect()
}

/// Typed text predicate. Every rule is false for a missing value, the way
/// a SQL comparison against NULL never matches.
#[derive(Debug, Clone, Copy)]
pub enum TextRule {
    /// Exact match on the trimmed value.
    OneOf(&'static [&'static str]),
    OneOfIgnoreCase(&'static [&'static str]),
    StartsWithIgnoreCase(&'static [&'static str]),
    Contains(&'static str),
    ContainsAny(&'static [&'static str]),
    /// Fragments appear in order, like `LIKE '%A%B%'`, ignoring case.
    Sequence(&'static [&'static str]),
    AllOf(&'static [TextRule]),
    AnyOf(&'static [TextRule]),
    Not(&'static TextRule),
}

impl TextRule {
    pub fn test(&self, value: Option<&str>) -> bool {
        match value {
            Some(v) => self.matches(v.trim()),
            None => false,
        }
    }

    fn matches(&self, value: &str) -> bool {
        let upper = || value.to_uppercase();
        match self {
            TextRule::OneOf(labels) => labels.iter().any(|l| *l == value),
            TextRule::OneOfIgnoreCase(labels) => {
                labels.iter().any(|l| l.to_uppercase() == upper())
            }
            TextRule::StartsWithIgnoreCase(prefixes) => {
                let value = upper();
                prefixes.iter().any(|p| value.starts_with(&p.to_uppercase()))
            }
            TextRule::Contains(fragment) => upper().contains(&fragment.to_uppercase()),
            TextRule::ContainsAny(fragments) => {
                let value = upper();
                fragments.iter().any(|f| value.contains(&f.to_uppercase()))
            }
            TextRule::Sequence(fragments) => {
                let value = upper();
                let mut rest = value.as_str();
                for fragment in fragments.iter() {
                    let fragment = fragment.to_uppercase();
                    match rest.find(&fragment) {
                        Some(pos) => rest = &rest[pos + fragment.len()..],
                        None => return false,
                    }
                }
                true
            }
            TextRule::AllOf(rules) => rules.iter().all(|r| r.matches(value)),
            TextRule::AnyOf(rules) => rules.iter().any(|r| r.matches(value)),
            TextRule::Not(rule) => !rule.matches(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Pattern,
    Unmatched,
}

/// Two-tier instrument-name matcher: curated labels first, and the broader
/// pattern only when the labels produce no dated rows at all.
#[derive(Debug, Clone, Copy)]
pub struct InstrumentMatcher {
    pub labels: TextRule,
    pub pattern: TextRule,
}

impl InstrumentMatcher {
    pub const fn new(labels: &'static [&'static str], pattern: TextRule) -> Self {
        Self {
            labels: TextRule::OneOf(labels),
            pattern,
        }
    }

    /// Rows of the winning tier. `group` decides whether a tier produced
    /// anything; the caller may narrow the rows further afterwards.
    pub fn matching<'r, T>(
        &self,
        rows: &'r [T],
        name: impl Fn(&T) -> Option<&str>,
        group: impl Fn(&[&'r T]) -> DateSeries,
        allow_pattern: bool,
    ) -> (Vec<&'r T>, MatchTier) {
        let exact: Vec<&T> = rows.iter().filter(|r| self.labels.test(name(*r))).collect();
        if !group(exact.as_slice()).is_empty() {
            return (exact, MatchTier::Exact);
        }
        if !allow_pattern {
            return (Vec::new(), MatchTier::Unmatched);
        }

        let broad: Vec<&T> = rows.iter().filter(|r| self.pattern.test(name(*r))).collect();
        if group(broad.as_slice()).is_empty() {
            (Vec::new(), MatchTier::Unmatched)
        } else {
            debug!(
                "Instrument labels matched nothing, pattern matched {} rows",
                broad.len()
            );
            (broad, MatchTier::Pattern)
        }
    }

    pub fn select<'r, T>(
        &self,
        rows: &'r [T],
        name: impl Fn(&T) -> Option<&str>,
        group: impl Fn(&[&'r T]) -> DateSeries,
        allow_pattern: bool,
    ) -> (DateSeries, MatchTier) {
        let (matched, tier) = self.matching(rows, name, &group, allow_pattern);
        (group(matched.as_slice()), tier)
    }
}
