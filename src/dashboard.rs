//! View model for the revenue dashboard and its terminal rendering.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::goals;
use crate::models::{self, GoalOverrides, PersonRevenueRecord, NO_OWNER};
use crate::progress::{self, ProgressBand, TeamSummary};
use crate::ranking::{self, RankedPerformer};

const UNASSIGNED_LABEL: &str = "Unassigned";
const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct MonthAmount {
    pub month_key: String,
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonView {
    pub owner_email: String,
    pub display_name: String,
    pub past_revenue: Vec<MonthAmount>,
    pub chart: Vec<MonthAmount>,
    pub current_revenue: f64,
    pub goal: f64,
    pub goal_overridden: bool,
    pub progress: u64,
    pub band: ProgressBand,
    pub goal_met: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamView {
    #[serde(flatten)]
    pub summary: TeamSummary,
    pub band: ProgressBand,
    pub goal_met: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformerView {
    pub owner_email: String,
    pub display_name: String,
    pub progress: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub last_updated: Option<String>,
    pub current_month: Option<String>,
    pub current_month_label: Option<String>,
    pub team: TeamView,
    pub top_performer: Option<PerformerView>,
    pub last_performer: Option<PerformerView>,
    pub people: Vec<PersonView>,
}

/// Friendly names keyed by owner email.
#[derive(Debug, Clone, Default)]
pub struct OwnerAliases {
    names: HashMap<String, String>,
}

impl OwnerAliases {
    pub fn new() -> Self {
        let mut names = HashMap::new();
        names.insert(NO_OWNER.to_string(), UNASSIGNED_LABEL.to_string());
        Self { names }
    }

    pub fn insert(&mut self, owner: impl Into<String>, name: impl Into<String>) {
        self.names.insert(owner.into(), name.into());
    }

    /// Alias if known, otherwise the capitalised local part of the email.
    pub fn display_name(&self, owner: &str) -> String {
        let name = self.names.get(owner).map(String::as_str).unwrap_or(owner);
        let local = name.split('@').next().unwrap_or(name);
        let mut chars = local.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

pub fn build_dashboard(
    records: &[PersonRevenueRecord],
    overrides: &GoalOverrides,
    aliases: &OwnerAliases,
    last_updated: Option<&str>,
) -> DashboardView {
    let month_keys = models::month_keys(records);
    let current_month = progress::current_month_key(&month_keys).map(str::to_string);
    let past_keys = &month_keys[..month_keys.len().saturating_sub(1)];

    let people = ranking::presentation_order(records)
        .into_iter()
        .map(|record| {
            let current_revenue = progress::current_revenue(record, &month_keys);
            let goal = goals::resolve(record, &month_keys, overrides);
            let progress = progress::percent(current_revenue, goal);
            PersonView {
                owner_email: record.owner_email.clone(),
                display_name: aliases.display_name(&record.owner_email),
                past_revenue: month_amounts(record, past_keys),
                chart: month_amounts(record, &month_keys),
                current_revenue,
                goal,
                goal_overridden: goals::is_overridden(record, overrides),
                progress,
                band: ProgressBand::for_percent(progress),
                goal_met: progress::goal_met(progress),
            }
        })
        .collect();

    let summary = progress::team_summary(records, &month_keys, overrides);
    let rankings = ranking::top_and_bottom(records, &month_keys, overrides);
    let performer = |ranked: Option<RankedPerformer>| {
        ranked.map(|p| PerformerView {
            display_name: aliases.display_name(&p.record.owner_email),
            owner_email: p.record.owner_email,
            progress: p.percent,
        })
    };

    DashboardView {
        last_updated: last_updated.map(format_timestamp),
        current_month_label: current_month.as_deref().map(models::month_label),
        current_month,
        team: TeamView {
            band: ProgressBand::for_percent(summary.progress),
            goal_met: progress::goal_met(summary.progress),
            summary,
        },
        top_performer: performer(rankings.top),
        last_performer: performer(rankings.bottom),
        people,
    }
}

fn month_amounts(record: &PersonRevenueRecord, month_keys: &[String]) -> Vec<MonthAmount> {
    month_keys
        .iter()
        .map(|key| MonthAmount {
            month_key: key.clone(),
            label: models::month_label(key),
            amount: record.revenue_for(key).unwrap_or(0.0),
        })
        .collect()
}

/// ISO-8601 timestamps are shown as `YYYY-MM-DD HH:MM:SS`; anything else verbatim.
pub fn format_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `$` plus a thousands-grouped amount with at most three decimals.
pub fn format_currency(amount: f64) -> String {
    let rendered = format!("{:.3}", amount.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{fraction}")
    }
}

pub fn progress_bar(progress: u64) -> String {
    let filled = (progress.min(100) as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn progress_line(progress: u64, band: ProgressBand, goal_met: bool) -> String {
    let mut line = format!("{} {}% ({})", progress_bar(progress), progress, band.as_str());
    if goal_met {
        line.push_str(" ✔");
    }
    line
}

fn chart_lines(chart: &[MonthAmount]) -> Vec<String> {
    let max = chart.iter().map(|m| m.amount).fold(0.0_f64, f64::max);
    let label_width = chart.iter().map(|m| m.label.len()).max().unwrap_or(0);
    chart
        .iter()
        .map(|month| {
            let width = if max > 0.0 {
                ((month.amount / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            format!(
                "{:<label_width$} {} {}",
                month.label,
                "█".repeat(width),
                format_currency(month.amount)
            )
        })
        .collect()
}

pub fn render_text(view: &DashboardView) -> String {
    let mut output = String::new();
    let month_label = view.current_month_label.as_deref().unwrap_or("no data");

    if let Some(top) = &view.top_performer {
        let _ = writeln!(output, "Top Performer: {} (progress {}%)", top.display_name, top.progress);
    }
    if let Some(last) = &view.last_performer {
        let _ = writeln!(output, "In Last: {} (progress {}%)", last.display_name, last.progress);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "AE Revenue Live Tracker");
    let _ = writeln!(
        output,
        "Last updated: {}",
        view.last_updated.as_deref().unwrap_or("unknown")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "Team");
    let _ = writeln!(
        output,
        "  Current Month ({}): {}",
        month_label,
        format_currency(view.team.summary.total_revenue)
    );
    let _ = writeln!(
        output,
        "  Goal: {} | Progress: {}%",
        format_currency(view.team.summary.total_goal),
        view.team.summary.progress
    );
    let _ = writeln!(
        output,
        "  {}",
        progress_line(view.team.summary.progress, view.team.band, view.team.goal_met)
    );

    if view.people.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No revenue records available.");
        return output;
    }

    for person in &view.people {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", person.display_name);
        if !person.past_revenue.is_empty() {
            let _ = writeln!(output, "  Past Revenue:");
            for month in &person.past_revenue {
                let _ = writeln!(output, "    {}: {}", month.label, format_currency(month.amount));
            }
        }
        let _ = writeln!(
            output,
            "  Current Month ({}): {}",
            month_label,
            format_currency(person.current_revenue)
        );
        let _ = writeln!(
            output,
            "  Goal: {}{} | Progress: {}%",
            format_currency(person.goal),
            if person.goal_overridden { " (manual)" } else { "" },
            person.progress
        );
        let _ = writeln!(
            output,
            "  {}",
            progress_line(person.progress, person.band, person.goal_met)
        );
        let _ = writeln!(output, "  Monthly Revenue:");
        for line in chart_lines(&person.chart) {
            let _ = writeln!(output, "    {line}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<PersonRevenueRecord> {
        vec![
            PersonRevenueRecord::new(NO_OWNER)
                .with_month("jan_2024", 10.0)
                .with_month("feb_2024", 5.0),
            PersonRevenueRecord::new("aj@sfdata.com")
                .with_month("jan_2024", 100.0)
                .with_month("feb_2024", 200.0),
            PersonRevenueRecord::new("kiriti@sfdata.com")
                .with_month("jan_2024", 50.0)
                .with_month("feb_2024", 40.0),
        ]
    }

    fn aliases() -> OwnerAliases {
        let mut aliases = OwnerAliases::new();
        aliases.insert("aj@sfdata.com", "AJ");
        aliases
    }

    #[test]
    fn display_names_use_alias_or_email_local_part() {
        let aliases = aliases();
        assert_eq!(aliases.display_name("aj@sfdata.com"), "AJ");
        assert_eq!(aliases.display_name("kiriti@sfdata.com"), "Kiriti");
        assert_eq!(aliases.display_name(NO_OWNER), "Unassigned");
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(1234.0), "$1,234");
        assert_eq!(format_currency(1234567.5), "$1,234,567.5");
        assert_eq!(format_currency(999.1234), "$999.123");
        assert_eq!(format_currency(100.0), "$100");
    }

    #[test]
    fn timestamps_are_normalised() {
        assert_eq!(
            format_timestamp("2025-05-20T10:11:12.123456"),
            "2025-05-20 10:11:12"
        );
        assert_eq!(
            format_timestamp("2025-05-20T10:11:12+00:00"),
            "2025-05-20 10:11:12"
        );
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn progress_bar_caps_at_full_width() {
        assert_eq!(progress_bar(0), format!("[{}]", ".".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(250), format!("[{}]", "#".repeat(BAR_WIDTH)));
    }

    #[test]
    fn dashboard_orders_people_and_ranks() {
        let mut overrides = GoalOverrides::new();
        overrides.set("kiriti@sfdata.com", 80.0);
        let view = build_dashboard(
            &sample_records(),
            &overrides,
            &aliases(),
            Some("2025-05-20T10:11:12.5"),
        );

        let names: Vec<&str> = view.people.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["AJ", "Kiriti", "Unassigned"]);
        assert_eq!(view.current_month.as_deref(), Some("feb_2024"));
        assert_eq!(view.current_month_label.as_deref(), Some("Feb 2024"));
        assert_eq!(view.last_updated.as_deref(), Some("2025-05-20 10:11:12"));

        let kiriti = &view.people[1];
        assert!(kiriti.goal_overridden);
        assert_eq!(kiriti.goal, 80.0);
        assert_eq!(kiriti.progress, 50);
        assert_eq!(kiriti.band, ProgressBand::Behind);
        assert_eq!(kiriti.past_revenue.len(), 1);
        assert_eq!(kiriti.chart.len(), 2);

        assert_eq!(
            view.top_performer.as_ref().map(|p| p.display_name.as_str()),
            Some("AJ")
        );
        assert_eq!(
            view.last_performer.as_ref().map(|p| p.display_name.as_str()),
            Some("Unassigned")
        );
        assert_eq!(view.team.summary.total_revenue, 245.0);
    }

    #[test]
    fn empty_dashboard_has_no_ranking_tiles() {
        let view = build_dashboard(&[], &GoalOverrides::new(), &OwnerAliases::new(), None);
        assert!(view.top_performer.is_none());
        assert!(view.last_performer.is_none());
        assert_eq!(view.team.summary.progress, 0);

        let text = render_text(&view);
        assert!(!text.contains("Top Performer"));
        assert!(text.contains("No revenue records available."));
    }

    #[test]
    fn text_rendering_shows_cards() {
        let view = build_dashboard(&sample_records(), &GoalOverrides::new(), &aliases(), None);
        let text = render_text(&view);
        assert!(text.contains("Top Performer: AJ (progress 160%)"));
        assert!(text.contains("Current Month (Feb 2024): $245"));
        assert!(text.contains("Jan 2024: $100"));
        assert!(text.contains("Last updated: unknown"));
    }
}
