use crate::models::{GoalOverrides, PersonRevenueRecord};

/// Default goal growth over last month's revenue.
pub const GOAL_GROWTH_FACTOR: f64 = 1.25;

/// The month immediately before the current one, if there is one.
pub fn prior_month_key(month_keys: &[String]) -> Option<&str> {
    month_keys
        .len()
        .checked_sub(2)
        .map(|index| month_keys[index].as_str())
}

pub fn default_goal(prior_month_revenue: f64) -> f64 {
    (prior_month_revenue * GOAL_GROWTH_FACTOR).round()
}

pub fn prior_month_revenue(record: &PersonRevenueRecord, month_keys: &[String]) -> f64 {
    prior_month_key(month_keys)
        .and_then(|key| record.revenue_for(key))
        .unwrap_or(0.0)
}

/// Effective goal for the current month: the override when present,
/// otherwise 125% of prior-month revenue.
pub fn resolve(
    record: &PersonRevenueRecord,
    month_keys: &[String],
    overrides: &GoalOverrides,
) -> f64 {
    overrides
        .get(&record.owner_email)
        .unwrap_or_else(|| default_goal(prior_month_revenue(record, month_keys)))
}

pub fn is_overridden(record: &PersonRevenueRecord, overrides: &GoalOverrides) -> bool {
    overrides.get(&record.owner_email).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn default_goal_grows_prior_month_by_a_quarter() {
        let record = PersonRevenueRecord::new("a")
            .with_month("jan_2024", 100.0)
            .with_month("feb_2024", 200.0);
        let goal = resolve(&record, &keys(&["jan_2024", "feb_2024"]), &GoalOverrides::new());
        assert_eq!(goal, 125.0);
    }

    #[test]
    fn default_goal_rounds_to_nearest_whole_amount() {
        assert_eq!(default_goal(50.0), 63.0);
        assert_eq!(default_goal(10.0), 13.0);
        assert_eq!(default_goal(0.0), 0.0);
    }

    #[test]
    fn override_wins_regardless_of_prior_revenue() {
        let record = PersonRevenueRecord::new("a")
            .with_month("jan_2024", 10_000.0)
            .with_month("feb_2024", 1.0);
        let mut overrides = GoalOverrides::new();
        overrides.set("a", 42.0);
        assert_eq!(resolve(&record, &keys(&["jan_2024", "feb_2024"]), &overrides), 42.0);

        overrides.set("a", 0.0);
        assert_eq!(resolve(&record, &keys(&["jan_2024", "feb_2024"]), &overrides), 0.0);
        assert!(is_overridden(&record, &overrides));
    }

    #[test]
    fn missing_prior_month_degrades_to_zero() {
        let record = PersonRevenueRecord::new("a").with_month("feb_2024", 300.0);
        let overrides = GoalOverrides::new();
        assert_eq!(resolve(&record, &keys(&["feb_2024"]), &overrides), 0.0);
        assert_eq!(resolve(&record, &keys(&["jan_2024", "feb_2024"]), &overrides), 0.0);
        assert_eq!(resolve(&record, &[], &overrides), 0.0);
    }

    #[test]
    fn prior_month_is_second_to_last_key() {
        assert_eq!(prior_month_key(&keys(&["a_2024", "b_2024", "c_2024"])), Some("b_2024"));
        assert_eq!(prior_month_key(&keys(&["a_2024"])), None);
    }
}
