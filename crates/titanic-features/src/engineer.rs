//! Deterministic feature engineering for passenger records.
//!
//! Converts raw [`PassengerRecord`]s into [`EnrichedRecord`]s. Every derived
//! field is a pure function of its record except three batch statistics:
//!
//! | Field               | Batch dependency                          |
//! |---------------------|-------------------------------------------|
//! | `age`               | missing values take the batch median      |
//! | `embarked`          | missing values take the batch mode        |
//! | `ticket_group_size` | records sharing the same ticket string    |
//!
//! For single-record online inference `ticket_group_size` is always `1`,
//! while a model fitted on the full passenger list saw larger groups.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use titanic_core::{
    AgeGroup, EnrichedRecord, FareGroup, PassengerRecord, Title, NUMERIC_TICKET_PREFIX,
    UNKNOWN_DECK,
};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ([A-Za-z]+)\.").expect("title regex"));

/// Upper-inclusive fare thresholds for Low / Medium / High.
const FARE_LOW_MAX: f64 = 7.91;
const FARE_MEDIUM_MAX: f64 = 14.454;
const FARE_HIGH_MAX: f64 = 31.0;

/// Engineer a batch of records.
///
/// The output has the same length and order as `records`.
pub fn engineer(records: &[PassengerRecord]) -> Vec<EnrichedRecord> {
    let median_age = median(records.iter().filter_map(|r| r.age).collect());
    let embarked_mode = mode(records.iter().filter_map(|r| r.embarked.as_deref()));
    let ticket_counts = ticket_counts(records);

    records
        .iter()
        .map(|record| {
            let age = record.age.or(median_age);
            let title = extract_title(&record.name);
            let family_size = u64::from(record.parch) + u64::from(record.sib_sp);
            EnrichedRecord {
                passenger_id: record.passenger_id,
                pclass: record.pclass,
                name: record.name.clone(),
                age,
                sib_sp: record.sib_sp,
                parch: record.parch,
                ticket: record.ticket.clone(),
                fare: record.fare,
                cabin: record.cabin.clone(),
                embarked: record.embarked.clone().or_else(|| embarked_mode.clone()),
                title_mapped: map_title(&title),
                title,
                sex: binarize_sex(&record.sex),
                deck: deck(record.cabin.as_deref()),
                cabin_count: cabin_count(record.cabin.as_deref()),
                ticket_prefix: ticket_prefix(&record.ticket),
                age_group: age.and_then(age_group),
                fare_group: fare_group(record.fare),
                family_size,
                alone: u8::from(family_size == 0),
                ticket_group_size: ticket_counts
                    .get(record.ticket.as_str())
                    .copied()
                    .unwrap_or(1),
            }
        })
        .collect()
}

/// Engineer a single record as a batch of one.
pub fn engineer_one(record: &PassengerRecord) -> EnrichedRecord {
    // A batch of one always yields exactly one record.
    let mut out = engineer(std::slice::from_ref(record));
    out.remove(0)
}

/// Extract the word immediately preceding a period (`"Smith, Mr. John"` → `"Mr"`).
///
/// Returns an empty string when the name contains no such word.
pub fn extract_title(name: &str) -> String {
    TITLE_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Map a raw title to its normalised category. Unknown titles map to `Rare`.
pub fn map_title(raw: &str) -> Title {
    match raw {
        "Mr" => Title::Mr,
        "Miss" | "Mlle" => Title::Miss,
        "Mrs" | "Mme" => Title::Mrs,
        "Master" => Title::Master,
        _ => Title::Rare,
    }
}

/// `1` for `"male"`, `0` for anything else.
pub fn binarize_sex(sex: &str) -> u8 {
    u8::from(sex == "male")
}

fn present_cabin(cabin: Option<&str>) -> Option<&str> {
    cabin.filter(|c| !c.trim().is_empty())
}

/// First character of the cabin, or [`UNKNOWN_DECK`].
pub fn deck(cabin: Option<&str>) -> String {
    present_cabin(cabin)
        .and_then(|c| c.chars().next())
        .map(|c| c.to_string())
        .unwrap_or_else(|| UNKNOWN_DECK.to_string())
}

/// Number of whitespace-separated cabins, `0` when absent.
pub fn cabin_count(cabin: Option<&str>) -> usize {
    present_cabin(cabin)
        .map(|c| c.split_whitespace().count())
        .unwrap_or(0)
}

/// Leading run of ASCII letters of the upper-cased ticket, or [`NUMERIC_TICKET_PREFIX`].
pub fn ticket_prefix(ticket: &str) -> String {
    let prefix: String = ticket
        .to_uppercase()
        .chars()
        .take_while(|c| c.is_ascii_uppercase())
        .collect();
    if prefix.is_empty() {
        NUMERIC_TICKET_PREFIX.to_string()
    } else {
        prefix
    }
}

/// Bucket an age into `(0,12] (12,18] (18,35] (35,60] (60,100]`.
///
/// Ages outside `(0, 100]` have no group.
pub fn age_group(age: f64) -> Option<AgeGroup> {
    match age {
        a if a.is_nan() || a <= 0.0 => None,
        a if a <= 12.0 => Some(AgeGroup::Child),
        a if a <= 18.0 => Some(AgeGroup::Teenager),
        a if a <= 35.0 => Some(AgeGroup::Young),
        a if a <= 60.0 => Some(AgeGroup::Adult),
        a if a <= 100.0 => Some(AgeGroup::Elderly),
        _ => None,
    }
}

/// Band a fare. Thresholds are upper-inclusive.
pub fn fare_group(fare: Option<f64>) -> FareGroup {
    match fare {
        None => FareGroup::Unknown,
        Some(f) if f.is_nan() => FareGroup::Unknown,
        Some(f) if f <= FARE_LOW_MAX => FareGroup::Low,
        Some(f) if f <= FARE_MEDIUM_MAX => FareGroup::Medium,
        Some(f) if f <= FARE_HIGH_MAX => FareGroup::High,
        Some(_) => FareGroup::VeryHigh,
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    values.retain(|v| !v.is_nan());
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent value; ties go to the lexicographically smallest.
fn mode<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(v, _)| v.to_string())
}

fn ticket_counts(records: &[PassengerRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for r in records {
        *counts.entry(r.ticket.as_str()).or_default() += 1;
    }
    counts
}
