use crate::models::{GoalOverrides, PersonRevenueRecord};
use crate::progress;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPerformer {
    pub record: PersonRevenueRecord,
    pub percent: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rankings {
    pub top: Option<RankedPerformer>,
    pub bottom: Option<RankedPerformer>,
}

/// Named owners in input order, followed by the unassigned bucket.
pub fn presentation_order(records: &[PersonRevenueRecord]) -> Vec<&PersonRevenueRecord> {
    let (unassigned, named): (Vec<_>, Vec<_>) =
        records.iter().partition(|record| record.is_unassigned());
    named.into_iter().chain(unassigned).collect()
}

/// Highest and lowest progress for the current month.
///
/// Candidates are walked in presentation order and a leader is only
/// replaced by a strictly better value, so ties go to the earlier record.
pub fn top_and_bottom(
    records: &[PersonRevenueRecord],
    month_keys: &[String],
    overrides: &GoalOverrides,
) -> Rankings {
    let mut top: Option<(&PersonRevenueRecord, u64)> = None;
    let mut bottom: Option<(&PersonRevenueRecord, u64)> = None;

    for record in presentation_order(records) {
        let percent = progress::record_progress(record, month_keys, overrides);

        if top.map_or(true, |(_, best)| percent > best) {
            top = Some((record, percent));
        }
        if bottom.map_or(true, |(_, worst)| percent < worst) {
            bottom = Some((record, percent));
        }
    }

    let ranked = |entry: Option<(&PersonRevenueRecord, u64)>| {
        entry.map(|(record, percent)| RankedPerformer {
            record: record.clone(),
            percent,
        })
    };

    Rankings {
        top: ranked(top),
        bottom: ranked(bottom),
    }
}
