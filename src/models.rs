use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{OverrideError, RecordError};

/// Owner identifier used for revenue that could not be matched to an AE.
pub const NO_OWNER: &str = "(no owner)";

pub const OWNER_FIELD: &str = "owner_email";

#[derive(Debug, Clone, PartialEq)]
pub struct MonthRevenue {
    pub month_key: String,
    pub amount: Option<f64>,
}

/// Revenue for one owner in one calendar month, as aggregated in Postgres.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    pub owner_email: String,
    pub month: NaiveDate,
    pub total: f64,
}

/// One AE's revenue, keyed by month in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRevenueRecord {
    pub owner_email: String,
    pub months: Vec<MonthRevenue>,
}

impl PersonRevenueRecord {
    #[cfg(test)]
    pub fn new(owner_email: impl Into<String>) -> Self {
        Self {
            owner_email: owner_email.into(),
            months: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_month(mut self, month_key: impl Into<String>, amount: f64) -> Self {
        self.months.push(MonthRevenue {
            month_key: month_key.into(),
            amount: Some(amount),
        });
        self
    }

    pub fn revenue_for(&self, month_key: &str) -> Option<f64> {
        self.months
            .iter()
            .find(|m| m.month_key == month_key)
            .and_then(|m| m.amount)
    }

    pub fn is_unassigned(&self) -> bool {
        self.owner_email == NO_OWNER
    }

    pub fn month_keys(&self) -> impl Iterator<Item = &str> {
        self.months.iter().map(|m| m.month_key.as_str())
    }

    /// Validates one flat JSON object (`{"owner_email": .., "jan_2025": ..}`).
    pub fn from_json_object(index: usize, object: &Map<String, Value>) -> Result<Self, RecordError> {
        let owner_email = match object.get(OWNER_FIELD) {
            Some(Value::String(owner)) if !owner.trim().is_empty() => owner.clone(),
            _ => return Err(RecordError::MissingOwner { index }),
        };

        let mut months = Vec::new();
        for (key, value) in object {
            if !is_month_key(key) {
                continue;
            }
            let amount = match value {
                Value::Null => None,
                Value::Number(n) => {
                    let amount = n.as_f64().ok_or_else(|| RecordError::InvalidAmount {
                        owner: owner_email.clone(),
                        month_key: key.clone(),
                        value: n.to_string(),
                    })?;
                    if amount < 0.0 {
                        return Err(RecordError::NegativeAmount {
                            owner: owner_email,
                            month_key: key.clone(),
                            amount,
                        });
                    }
                    Some(amount)
                }
                other => {
                    return Err(RecordError::InvalidAmount {
                        owner: owner_email,
                        month_key: key.clone(),
                        value: other.to_string(),
                    })
                }
            };
            months.push(MonthRevenue {
                month_key: key.clone(),
                amount,
            });
        }

        Ok(Self {
            owner_email,
            months,
        })
    }
}

impl Serialize for PersonRevenueRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.months.len() + 1))?;
        map.serialize_entry(OWNER_FIELD, &self.owner_email)?;
        for month in &self.months {
            map.serialize_entry(&month.month_key, &month.amount)?;
        }
        map.end()
    }
}

/// Parses a JSON array of flat records.
pub fn records_from_json(value: &Value) -> Result<Vec<PersonRevenueRecord>, RecordError> {
    let items = value.as_array().ok_or(RecordError::NotAnArray)?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let object = item.as_object().ok_or(RecordError::NotAnObject { index })?;
            PersonRevenueRecord::from_json_object(index, object)
        })
        .collect()
}

/// `<word>_<4-digit-year>`, e.g. `may_2025`.
pub fn is_month_key(key: &str) -> bool {
    match key.rsplit_once('_') {
        Some((month, year)) => {
            !month.is_empty()
                && month.chars().all(|c| c.is_ascii_alphabetic())
                && year.len() == 4
                && year.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Month keys in chronological order, taken from the first record.
pub fn month_keys(records: &[PersonRevenueRecord]) -> Vec<String> {
    records
        .first()
        .map(|record| record.month_keys().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn month_key_for(date: NaiveDate) -> String {
    format!(
        "{}_{}",
        date.format("%b").to_string().to_lowercase(),
        date.year()
    )
}

/// `may_2025` -> `May 2025`.
pub fn month_label(month_key: &str) -> String {
    let Some((month, year)) = month_key.split_once('_') else {
        return month_key.to_string();
    };
    let mut chars = month.chars();
    match chars.next() {
        Some(first) => format!("{}{} {}", first.to_uppercase(), chars.as_str(), year),
        None => year.to_string(),
    }
}

/// Manually entered goals for the current session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalOverrides {
    goals: HashMap<String, f64>,
}

impl GoalOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, owner: impl Into<String>, goal: f64) {
        self.goals.insert(owner.into(), goal);
    }

    pub fn get(&self, owner: &str) -> Option<f64> {
        self.goals.get(owner).copied()
    }

    /// Builds overrides from `owner=amount` entries.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, OverrideError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Self::new();
        for entry in entries {
            let (owner, goal) = parse_goal_entry(entry.as_ref())?;
            overrides.set(owner, goal);
        }
        Ok(overrides)
    }
}

pub fn parse_goal_entry(entry: &str) -> Result<(String, f64), OverrideError> {
    let (owner, value) = split_owner_entry(entry)?;
    let goal: f64 = value
        .parse()
        .ok()
        .filter(|goal: &f64| goal.is_finite())
        .ok_or_else(|| OverrideError::InvalidAmount {
            owner: owner.clone(),
            value: value.clone(),
        })?;
    if goal < 0.0 {
        return Err(OverrideError::Negative { owner });
    }
    Ok((owner, goal))
}

/// Splits `owner=value` on the last `=`.
pub fn split_owner_entry(entry: &str) -> Result<(String, String), OverrideError> {
    let (owner, value) = entry
        .rsplit_once('=')
        .ok_or_else(|| OverrideError::MissingSeparator(entry.to_string()))?;
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(OverrideError::EmptyOwner(entry.to_string()));
    }
    Ok((owner.to_string(), value.trim().to_string()))
}
