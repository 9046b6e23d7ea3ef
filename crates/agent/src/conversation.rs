//! Deterministic slot extraction from a raw user utterance.
//!
//! Every field is driven by a [`PatternTable`] entry so that further languages
//! are added as keyword/unit data rather than new code paths. A field is only
//! emitted when its number and unit (or keyword) co-occur in the text.

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use tracing::warn;
use wayfarer_core::{Destination, IntentSlots};

/// Keyword and unit vocabulary used by [`SlotExtractor`].
#[derive(Clone, Debug)]
pub struct PatternTable {
    /// Checked in order; the first destination with a hit wins.
    pub destinations: Vec<(Destination, Vec<&'static str>)>,
    pub duration_units: Vec<&'static str>,
    pub traveler_units: Vec<&'static str>,
    pub budget_keywords: Vec<&'static str>,
    pub currency_suffixes: Vec<&'static str>,
    pub child_keywords: Vec<&'static str>,
    pub age_units: Vec<&'static str>,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self {
            destinations: vec![
                (
                    Destination::Japan,
                    vec![
                        "日本", "japan", "東京", "tokyo", "大阪", "osaka", "京都", "kyoto", "北海道",
                        "hokkaido", "沖繩", "okinawa",
                    ],
                ),
                (
                    Destination::Taiwan,
                    vec![
                        "台灣", "台湾", "taiwan", "台北", "taipei", "高雄", "kaohsiung", "台中",
                        "taichung", "花蓮", "hualien",
                    ],
                ),
            ],
            duration_units: vec!["天", "日", r"days?", r"nights?"],
            traveler_units: vec!["人", "個人", "位", r"adults?", "people", r"persons?", "pax"],
            budget_keywords: vec!["預算", "budget"],
            currency_suffixes: vec!["美[金元]", "usd", r"\$"],
            child_keywords: vec!["小孩", "孩子", "兒童", r"children", r"child", r"kids?"],
            age_units: vec!["歲", "岁", r"years?[\s-]*old", "yo"],
        }
    }
}

fn alternation(parts: &[&str]) -> String {
    format!("(?:{})", parts.join("|"))
}

fn escaped_alternation(parts: &[&str]) -> String {
    let escaped: Vec<String> = parts.iter().map(|part| regex::escape(part)).collect();
    format!("(?:{})", escaped.join("|"))
}

fn compile(name: &'static str, pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(error) => {
            warn!(
                event_name = "agent.extractor.pattern_invalid",
                pattern_name = name,
                error = %error,
                "slot pattern failed to compile; field will not be extracted"
            );
            None
        }
    }
}

#[derive(Clone, Debug)]
struct CompiledPatterns {
    destinations: Vec<(Destination, Option<Regex>)>,
    duration: Option<Regex>,
    travelers: Option<Regex>,
    budget: Option<Regex>,
    bare_dollar: Option<Regex>,
    children_keyword_first: Option<Regex>,
    children_age_first: Option<Regex>,
    date: Option<Regex>,
}

impl CompiledPatterns {
    fn from_table(table: &PatternTable) -> Self {
        let destinations = table
            .destinations
            .iter()
            .map(|(destination, keywords)| {
                (*destination, compile("destination", &escaped_alternation(keywords)))
            })
            .collect();

        let duration_units = alternation(&table.duration_units);
        let traveler_units = alternation(&table.traveler_units);
        let budget_keywords = alternation(&table.budget_keywords);
        let currency = alternation(&table.currency_suffixes);
        let child_keywords = alternation(&table.child_keywords);
        let age_units = alternation(&table.age_units);

        Self {
            destinations,
            // A count right after 月 is the day of a date ("3月1日"), not a duration.
            duration: compile(
                "duration",
                &format!(r"(?:^|[^月0-9])([0-9]+)\s*{duration_units}"),
            ),
            travelers: compile("travelers", &format!(r"([0-9]+)\s*{traveler_units}")),
            budget: compile(
                "budget",
                &format!(r"{budget_keywords}[^0-9]*([0-9][0-9,]*)\s*{currency}?"),
            ),
            bare_dollar: compile("bare_dollar", r"\$\s*([0-9][0-9,]*)"),
            children_keyword_first: compile(
                "children_keyword_first",
                &format!(r"{child_keywords}[^0-9]*([0-9]+)\s*{age_units}"),
            ),
            children_age_first: compile(
                "children_age_first",
                &format!(r"([0-9]+)\s*-?\s*{age_units}\s*(?:的)?\s*{child_keywords}"),
            ),
            date: compile("date", r"([0-9]{4})[/\-.]([0-9]{1,2})[/\-.]([0-9]{1,2})"),
        }
    }
}

/// Pure, infallible extractor over a [`PatternTable`].
#[derive(Clone, Debug)]
pub struct SlotExtractor {
    patterns: CompiledPatterns,
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotExtractor {
    pub fn new() -> Self {
        Self::from_table(&PatternTable::default())
    }

    pub fn from_table(table: &PatternTable) -> Self {
        Self { patterns: CompiledPatterns::from_table(table) }
    }

    pub fn extract(&self, text: &str) -> IntentSlots {
        let patterns = &self.patterns;
        let (start_date, end_date) = extract_dates(patterns.date.as_ref(), text);
        let children_ages = extract_children_ages(
            patterns.children_keyword_first.as_ref(),
            patterns.children_age_first.as_ref(),
            text,
        );

        IntentSlots {
            destination: extract_destination(&patterns.destinations, text),
            start_date,
            end_date,
            duration_days: first_positive(patterns.duration.as_ref(), text),
            num_travelers: first_positive(patterns.travelers.as_ref(), text),
            budget_usd: extract_budget(patterns.budget.as_ref(), patterns.bare_dollar.as_ref(), text),
            children_ages: (!children_ages.is_empty()).then_some(children_ages),
            ..IntentSlots::default()
        }
    }
}

fn extract_destination(destinations: &[(Destination, Option<Regex>)], text: &str) -> Option<String> {
    destinations
        .iter()
        .find(|(_, regex)| regex.as_ref().is_some_and(|regex| regex.is_match(text)))
        .map(|(destination, _)| destination.name().to_string())
}

fn first_positive(regex: Option<&Regex>, text: &str) -> Option<u32> {
    let captures = regex?.captures(text)?;
    let value = captures.get(1)?.as_str().parse::<u32>().ok()?;
    (value > 0).then_some(value)
}

fn extract_budget(budget: Option<&Regex>, bare_dollar: Option<&Regex>, text: &str) -> Option<f64> {
    let captures = budget
        .and_then(|regex| regex.captures(text))
        .or_else(|| bare_dollar.and_then(|regex| regex.captures(text)))?;
    let digits: String = captures.get(1)?.as_str().chars().filter(|ch| *ch != ',').collect();
    digits.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

fn extract_dates(regex: Option<&Regex>, text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let Some(regex) = regex else {
        return (None, None);
    };

    let mut dates = regex.captures_iter(text).filter_map(|captures| {
        let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
        let month = captures.get(2)?.as_str().parse::<u32>().ok()?;
        let day = captures.get(3)?.as_str().parse::<u32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });

    let start = dates.next();
    let end = start.and_then(|_| dates.next());
    (start, end)
}

fn extract_children_ages(
    keyword_first: Option<&Regex>,
    age_first: Option<&Regex>,
    text: &str,
) -> Vec<u32> {
    let mut hits: Vec<(usize, u32)> = Vec::new();

    for regex in [keyword_first, age_first].into_iter().flatten() {
        for captures in regex.captures_iter(text) {
            let Some(age) = captures.get(1) else {
                continue;
            };
            if hits.iter().any(|(position, _)| *position == age.start()) {
                continue;
            }
            if let Ok(value) = age.as_str().parse::<u32>() {
                hits.push((age.start(), value));
            }
        }
    }

    hits.sort_by_key(|(position, _)| *position);
    hits.into_iter().map(|(_, age)| age).collect()
}
