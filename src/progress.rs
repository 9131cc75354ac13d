use serde::Serialize;

use crate::goals;
use crate::models::{GoalOverrides, PersonRevenueRecord};

pub fn current_month_key(month_keys: &[String]) -> Option<&str> {
    month_keys.last().map(String::as_str)
}

pub fn current_revenue(record: &PersonRevenueRecord, month_keys: &[String]) -> f64 {
    current_month_key(month_keys)
        .and_then(|key| record.revenue_for(key))
        .unwrap_or(0.0)
}

/// Percent of goal achieved. A zero goal always reports 0%, even with revenue.
pub fn percent(current_revenue: f64, effective_goal: f64) -> u64 {
    if effective_goal == 0.0 {
        return 0;
    }
    (current_revenue / effective_goal * 100.0).round() as u64
}

pub fn record_progress(
    record: &PersonRevenueRecord,
    month_keys: &[String],
    overrides: &GoalOverrides,
) -> u64 {
    let goal = goals::resolve(record, month_keys, overrides);
    percent(current_revenue(record, month_keys), goal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBand {
    OnTrack,
    Behind,
    AtRisk,
}

impl ProgressBand {
    pub fn for_percent(progress: u64) -> Self {
        match progress {
            90.. => ProgressBand::OnTrack,
            50..=89 => ProgressBand::Behind,
            _ => ProgressBand::AtRisk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressBand::OnTrack => "on track",
            ProgressBand::Behind => "behind",
            ProgressBand::AtRisk => "at risk",
        }
    }
}

pub fn goal_met(progress: u64) -> bool {
    progress >= 100
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamSummary {
    pub total_revenue: f64,
    pub total_goal: f64,
    pub progress: u64,
}

pub fn team_summary(
    records: &[PersonRevenueRecord],
    month_keys: &[String],
    overrides: &GoalOverrides,
) -> TeamSummary {
    let total_revenue: f64 = records
        .iter()
        .map(|record| current_revenue(record, month_keys))
        .sum();
    let total_goal: f64 = records
        .iter()
        .map(|record| goals::resolve(record, month_keys, overrides))
        .sum();

    TeamSummary {
        total_revenue,
        total_goal,
        progress: percent(total_revenue, total_goal),
    }
}
