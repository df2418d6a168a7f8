use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::CrmError;
use super::types::{action_date, parse_action_date, LeadStatus};

pub const DEFAULT_OUTCOME: &str = "Connected";

/// Lead-intake form. `Default` is the blank form shown after a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadForm {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub trade: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default, with = "action_date")]
    pub next_action: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

impl Default for LeadForm {
    fn default() -> Self {
        Self {
            company: String::new(),
            contact_name: String::new(),
            trade: String::new(),
            phone: String::new(),
            email: String::new(),
            status: LeadStatus::New,
            next_action: None,
            notes: String::new(),
        }
    }
}

impl LeadForm {
    pub fn can_submit(&self) -> bool {
        !self.company.trim().is_empty()
    }
}

/// Call-logging form. `lead` is the selected lead id, empty when none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallForm {
    #[serde(default)]
    pub lead: String,
    #[serde(default = "default_outcome")]
    pub outcome: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, with = "action_date")]
    pub next_action: Option<NaiveDate>,
}

fn default_outcome() -> String {
    DEFAULT_OUTCOME.to_string()
}

impl Default for CallForm {
    fn default() -> Self {
        Self {
            lead: String::new(),
            outcome: default_outcome(),
            notes: String::new(),
            next_action: None,
        }
    }
}

impl CallForm {
    pub fn can_submit(&self) -> bool {
        !self.lead.trim().is_empty()
    }
}

/// Inline editor row in the lead table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdateForm {
    pub status: LeadStatus,
    #[serde(default, with = "action_date")]
    pub next_action: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Forms carrying a next-action date.
pub trait NextActionField {
    fn set_next_action(&mut self, date: Option<NaiveDate>);
}

impl NextActionField for LeadForm {
    fn set_next_action(&mut self, date: Option<NaiveDate>) {
        self.next_action = date;
    }
}

impl NextActionField for CallForm {
    fn set_next_action(&mut self, date: Option<NaiveDate>) {
        self.next_action = date;
    }
}

impl NextActionField for StatusUpdateForm {
    fn set_next_action(&mut self, date: Option<NaiveDate>) {
        self.next_action = date;
    }
}

/// A posted form with `next_action` still raw. Browsers without a date
/// picker send free text, which should come back as an inline error rather
/// than a rejected request.
#[derive(Debug, Clone, Deserialize)]
pub struct DatedSubmission<F> {
    #[serde(default)]
    next_action: String,
    #[serde(flatten)]
    form: F,
}

impl<F: NextActionField> DatedSubmission<F> {
    /// The form with its date filled in, or the form (date left empty) with
    /// the reason the date was refused.
    pub fn parse(self) -> Result<F, (F, CrmError)> {
        let mut form = self.form;
        let raw = self.next_action.trim();
        if raw.is_empty() {
            form.set_next_action(None);
            return Ok(form);
        }
        match parse_action_date(raw) {
            Some(date) => {
                form.set_next_action(Some(date));
                Ok(form)
            }
            None => {
                form.set_next_action(None);
                Err((
                    form,
                    CrmError::Validation(format!(
                        "Next action date \"{raw}\" is not a date (use YYYY-MM-DD)"
                    )),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_forms() {
        let lead = LeadForm::default();
        assert_eq!(lead.status, LeadStatus::New);
        assert!(lead.next_action.is_none());
        assert!(!lead.can_submit());

        let call = CallForm::default();
        assert_eq!(call.outcome, "Connected");
        assert!(!call.can_submit());
    }

    #[test]
    fn test_blank_date_field_is_absent() {
        let form: LeadForm = serde_json::from_value(serde_json::json!({
            "company": "Acme",
            "status": "Nurture",
            "next_action": ""
        }))
        .unwrap();
        assert_eq!(form.next_action, None);
        assert_eq!(form.status, LeadStatus::Nurture);
        assert!(form.can_submit());
    }

    #[test]
    fn test_missing_outcome_defaults_to_connected() {
        let form: CallForm =
            serde_json::from_value(serde_json::json!({ "lead": "l1" })).unwrap();
        assert_eq!(form.outcome, DEFAULT_OUTCOME);
        assert!(form.can_submit());
    }

    #[test]
    fn test_submission_parses_next_action() {
        let submission: DatedSubmission<StatusUpdateForm> = serde_json::from_value(
            serde_json::json!({ "status": "Connected", "next_action": "2025-06-02" }),
        )
        .unwrap();
        let form = submission.parse().unwrap();
        assert_eq!(form.status, LeadStatus::Connected);
        assert_eq!(form.next_action, NaiveDate::from_ymd_opt(2025, 6, 2));

        let blank: DatedSubmission<CallForm> =
            serde_json::from_value(serde_json::json!({ "lead": "l1", "next_action": " " })).unwrap();
        assert_eq!(blank.parse().unwrap().next_action, None);
    }

    #[test]
    fn test_submission_refuses_free_text_date_but_keeps_fields() {
        let submission: DatedSubmission<LeadForm> = serde_json::from_value(serde_json::json!({
            "company": "Acme",
            "trade": "Drywall",
            "next_action": "06/02/2025"
        }))
        .unwrap();
        let (form, err) = submission.parse().unwrap_err();
        assert_eq!(form.company, "Acme");
        assert_eq!(form.trade, "Drywall");
        assert_eq!(form.next_action, None);
        assert!(matches!(err, CrmError::Validation(_)));
        assert!(err.user_message().contains("06/02/2025"));
    }
}
