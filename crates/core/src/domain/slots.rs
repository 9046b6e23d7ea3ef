use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DomainError;

/// Slot keys accepted from untrusted structured input.
pub const KNOWN_SLOT_KEYS: [&str; 10] = [
    "destination",
    "start_date",
    "end_date",
    "duration_days",
    "num_travelers",
    "budget_usd",
    "trip_style",
    "origin_city",
    "preferences",
    "children_ages",
];

pub const MISSING_DESTINATION: &str = "destination";
pub const MISSING_DATES_OR_DURATION: &str = "travel dates or duration";
pub const MISSING_TRAVELERS: &str = "number of travelers";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Accumulated trip intent for one conversation session.
///
/// Fields only ever move from `None` to `Some`, or from one `Some` to another
/// through [`IntentSlots::merge`]. Nothing clears a field implicitly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_travelers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_ages: Option<Vec<u32>>,
}

impl IntentSlots {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn has_destination(&self) -> bool {
        self.destination.as_deref().is_some_and(|value| !value.trim().is_empty())
    }

    pub fn has_dates_or_duration(&self) -> bool {
        self.duration_days.is_some_and(|days| days > 0)
            || (self.start_date.is_some() && self.end_date.is_some())
    }

    pub fn has_travelers(&self) -> bool {
        self.num_travelers.is_some_and(|count| count > 0)
    }

    pub fn is_complete(&self) -> bool {
        self.has_destination() && self.has_dates_or_duration() && self.has_travelers()
    }

    /// Human-readable names of unsatisfied requirements, in fixed order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_destination() {
            missing.push(MISSING_DESTINATION);
        }
        if !self.has_dates_or_duration() {
            missing.push(MISSING_DATES_OR_DURATION);
        }
        if !self.has_travelers() {
            missing.push(MISSING_TRAVELERS);
        }
        missing
    }

    /// Returns `existing` overlaid with every field `new` sets.
    pub fn merge(existing: &Self, new: &Self) -> Self {
        let mut merged = existing.clone();
        merged.merge_from(new);
        merged
    }

    pub fn merge_from(&mut self, new: &Self) {
        overlay(&mut self.destination, &new.destination);
        overlay(&mut self.start_date, &new.start_date);
        overlay(&mut self.end_date, &new.end_date);
        overlay(&mut self.duration_days, &new.duration_days);
        overlay(&mut self.num_travelers, &new.num_travelers);
        overlay(&mut self.budget_usd, &new.budget_usd);
        overlay(&mut self.trip_style, &new.trip_style);
        overlay(&mut self.origin_city, &new.origin_city);
        overlay(&mut self.preferences, &new.preferences);
        overlay(&mut self.children_ages, &new.children_ages);
    }

    /// Builds slots from an untrusted JSON object.
    ///
    /// Unknown keys, nulls and values that violate a field's constraints are
    /// dropped one field at a time; the rest of the object is still used.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut slots = Self::default();
        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "destination" => slots.destination = text_value(value),
                "start_date" => slots.start_date = date_value(value),
                "end_date" => slots.end_date = date_value(value),
                "duration_days" => slots.duration_days = positive_integer(value),
                "num_travelers" => slots.num_travelers = positive_integer(value),
                "budget_usd" => slots.budget_usd = non_negative_amount(value),
                "trip_style" => slots.trip_style = text_value(value),
                "origin_city" => slots.origin_city = text_value(value),
                "preferences" => slots.preferences = text_list(value),
                "children_ages" => slots.children_ages = age_list(value),
                _ => {}
            }
        }
        slots
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.duration_days == Some(0) {
            return Err(DomainError::InvalidSlot {
                field: "duration_days",
                reason: "must be a positive integer".to_string(),
            });
        }
        if self.num_travelers == Some(0) {
            return Err(DomainError::InvalidSlot {
                field: "num_travelers",
                reason: "must be at least one".to_string(),
            });
        }
        if let Some(budget) = self.budget_usd {
            if !budget.is_finite() || budget < 0.0 {
                return Err(DomainError::InvalidSlot {
                    field: "budget_usd",
                    reason: "must be a non-negative amount".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

fn date_value(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(|text| NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok())
}

fn positive_integer(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && *float >= 0.0)
                .map(|float| float as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(number).ok().filter(|number| *number > 0)
}

fn non_negative_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

fn text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => {
            let texts: Vec<String> =
                items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect();
            (!texts.is_empty()).then_some(texts)
        }
        Value::String(text) => Some(vec![text.clone()]),
        _ => None,
    }
}

fn age_list(value: &Value) -> Option<Vec<u32>> {
    let Value::Array(items) = value else {
        return None;
    };
    let ages: Vec<u32> = items
        .iter()
        .filter_map(|item| item.as_u64().and_then(|age| u32::try_from(age).ok()))
        .collect();
    (!ages.is_empty()).then_some(ages)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{IntentSlots, MISSING_DATES_OR_DURATION, MISSING_DESTINATION, MISSING_TRAVELERS};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn slots(value: serde_json::Value) -> IntentSlots {
        IntentSlots::from_json_object(value.as_object().expect("object"))
    }

    #[test]
    fn completeness_covers_every_requirement_combination() {
        for has_destination in [false, true] {
            for dates in [0u8, 1, 2, 3] {
                for has_travelers in [false, true] {
                    let candidate = IntentSlots {
                        destination: has_destination.then(|| "japan".to_string()),
                        duration_days: (dates == 1).then_some(4),
                        start_date: (dates >= 2).then(|| date(2025, 4, 1)),
                        end_date: (dates == 3).then(|| date(2025, 4, 5)),
                        num_travelers: has_travelers.then_some(2),
                        ..IntentSlots::default()
                    };

                    let has_timing = dates == 1 || dates == 3;
                    assert_eq!(
                        candidate.is_complete(),
                        has_destination && has_timing && has_travelers,
                        "destination={has_destination} dates={dates} travelers={has_travelers}"
                    );
                }
            }
        }
    }

    #[test]
    fn missing_fields_follow_fixed_order() {
        assert_eq!(
            IntentSlots::default().missing_fields(),
            vec![MISSING_DESTINATION, MISSING_DATES_OR_DURATION, MISSING_TRAVELERS]
        );

        let partial = IntentSlots {
            start_date: Some(date(2025, 4, 1)),
            num_travelers: Some(3),
            ..IntentSlots::default()
        };
        assert_eq!(partial.missing_fields(), vec![MISSING_DESTINATION, MISSING_DATES_OR_DURATION]);
    }

    #[test]
    fn blank_destination_does_not_count_as_set() {
        let candidate = IntentSlots {
            destination: Some("  ".to_string()),
            duration_days: Some(3),
            num_travelers: Some(1),
            ..IntentSlots::default()
        };

        assert!(!candidate.is_complete());
        assert_eq!(candidate.missing_fields(), vec![MISSING_DESTINATION]);
    }

    #[test]
    fn merge_with_empty_is_identity_in_both_directions() {
        let existing = slots(json!({"destination": "taiwan", "duration_days": 4}));

        assert_eq!(IntentSlots::merge(&existing, &IntentSlots::default()), existing);
        assert_eq!(IntentSlots::merge(&IntentSlots::default(), &existing), existing);
    }

    #[test]
    fn merge_overrides_set_fields_and_keeps_the_rest() {
        let existing = slots(json!({"destination": "japan", "duration_days": 5, "budget_usd": 2000}));
        let new = slots(json!({"duration_days": 7, "num_travelers": 2}));

        let merged = IntentSlots::merge(&existing, &new);

        assert_eq!(merged.destination.as_deref(), Some("japan"));
        assert_eq!(merged.duration_days, Some(7));
        assert_eq!(merged.num_travelers, Some(2));
        assert_eq!(merged.budget_usd, Some(2000.0));
        assert_eq!(IntentSlots::merge(&merged, &new), merged, "merge must be idempotent");
    }

    #[test]
    fn json_boundary_drops_unknown_null_and_invalid_values() {
        let parsed = slots(json!({
            "destination": "japan",
            "hotel": "ryokan",
            "origin_city": null,
            "duration_days": 0,
            "num_travelers": "3",
            "budget_usd": -10,
            "start_date": "2025-02-30",
            "end_date": "2025-03-04",
            "preferences": ["onsen", 7, "temples"],
            "children_ages": [5, -1, 9],
        }));

        assert_eq!(parsed.destination.as_deref(), Some("japan"));
        assert_eq!(parsed.origin_city, None);
        assert_eq!(parsed.duration_days, None);
        assert_eq!(parsed.num_travelers, Some(3));
        assert_eq!(parsed.budget_usd, None);
        assert_eq!(parsed.start_date, None);
        assert_eq!(parsed.end_date, Some(date(2025, 3, 4)));
        assert_eq!(parsed.preferences, Some(vec!["onsen".to_string(), "temples".to_string()]));
        assert_eq!(parsed.children_ages, Some(vec![5, 9]));
    }

    #[test]
    fn lists_with_no_valid_elements_are_dropped() {
        let parsed = slots(json!({
            "preferences": [1, 2],
            "children_ages": ["five", -3],
        }));

        assert_eq!(parsed.preferences, None);
        assert_eq!(parsed.children_ages, None);
        assert!(parsed.is_empty());
    }

    #[test]
    fn serialization_omits_unset_fields_and_uses_iso_dates() {
        let candidate = IntentSlots {
            destination: Some("taiwan".to_string()),
            start_date: Some(date(2025, 1, 9)),
            ..IntentSlots::default()
        };

        let encoded = serde_json::to_string(&candidate).expect("serialize");
        assert_eq!(encoded, r#"{"destination":"taiwan","start_date":"2025-01-09"}"#);
    }

    #[test]
    fn validate_rejects_zero_counts() {
        let invalid = IntentSlots { num_travelers: Some(0), ..IntentSlots::default() };
        assert!(invalid.validate().is_err());
        assert!(IntentSlots::default().validate().is_ok());
    }
}
