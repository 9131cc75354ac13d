use std::fmt::Write;

use crate::dashboard::{format_currency, DashboardView};

pub fn build_report(view: &DashboardView) -> String {
    let mut output = String::new();
    let month_label = view.current_month_label.as_deref().unwrap_or("no data");

    let _ = writeln!(output, "# AE Revenue Report");
    let _ = writeln!(
        output,
        "Current month: {} (data last updated {})",
        month_label,
        view.last_updated.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Team");
    let _ = writeln!(
        output,
        "- Revenue: {}",
        format_currency(view.team.summary.total_revenue)
    );
    let _ = writeln!(
        output,
        "- Goal: {}",
        format_currency(view.team.summary.total_goal)
    );
    let _ = writeln!(
        output,
        "- Progress: {}% ({})",
        view.team.summary.progress,
        view.team.band.as_str()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rankings");

    match (&view.top_performer, &view.last_performer) {
        (Some(top), Some(last)) => {
            let _ = writeln!(output, "- Top performer: {} ({}%)", top.display_name, top.progress);
            let _ = writeln!(output, "- In last: {} ({}%)", last.display_name, last.progress);
        }
        _ => {
            let _ = writeln!(output, "No revenue records for this period.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Account Executives");

    if view.people.is_empty() {
        let _ = writeln!(output, "No revenue records for this period.");
        return output;
    }

    let _ = writeln!(output, "| AE | Current | Goal | Progress | Status |");
    let _ = writeln!(output, "|---|---:|---:|---:|---|");
    for person in &view.people {
        let goal = if person.goal_overridden {
            format!("{} (manual)", format_currency(person.goal))
        } else {
            format_currency(person.goal)
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {}% | {}{} |",
            person.display_name,
            format_currency(person.current_revenue),
            goal,
            person.progress,
            person.band.as_str(),
            if person.goal_met { " ✔" } else { "" }
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Past Revenue");
    for person in &view.people {
        let history: Vec<String> = person
            .past_revenue
            .iter()
            .map(|month| format!("{} {}", month.label, format_currency(month.amount)))
            .collect();
        if history.is_empty() {
            let _ = writeln!(output, "- {}: no earlier months", person.display_name);
        } else {
            let _ = writeln!(output, "- {}: {}", person.display_name, history.join(", "));
        }
    }

    output
}
