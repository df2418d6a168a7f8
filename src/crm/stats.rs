use serde::Serialize;
use std::collections::BTreeMap;

use super::types::{Lead, LeadStatus};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub totals: BTreeMap<LeadStatus, usize>,
    pub next_action: Option<Lead>,
}

impl PipelineStats {
    pub fn from_leads(leads: &[Lead]) -> Self {
        Self {
            totals: status_totals(leads),
            next_action: next_action_lead(leads).cloned(),
        }
    }

    pub fn count(&self, status: LeadStatus) -> usize {
        self.totals.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.totals.values().sum()
    }
}

/// Count per status; every status is present, zero-filled.
pub fn status_totals(leads: &[Lead]) -> BTreeMap<LeadStatus, usize> {
    let mut totals: BTreeMap<LeadStatus, usize> =
        LeadStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for lead in leads {
        *totals.entry(lead.status).or_insert(0) += 1;
    }
    totals
}

/// The lead with the earliest next-action date. Leads without one are
/// skipped; among equal dates the first in list order wins.
pub fn next_action_lead(leads: &[Lead]) -> Option<&Lead> {
    leads
        .iter()
        .filter_map(|lead| lead.next_action.map(|date| (date, lead)))
        .min_by_key(|(date, _)| *date)
        .map(|(_, lead)| lead)
}
