use crate::core::session::AuthFeedback;
use crate::core::shared::utils::{date_input_value, format_date, format_timestamp, html_escape};

use super::forms::{CallForm, LeadForm};
use super::mutations::{MutationStatus, PendingLeadUpdate};
use super::types::{CallLog, Lead, LeadStatus};
use super::workspace::DashboardView;

const STYLE: &str = r#"
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #020617; color: #e2e8f0; }
        .container { max-width: 1100px; margin: 0 auto; padding: 24px; }
        .narrow { max-width: 640px; margin: 0 auto; padding: 64px 24px; }
        .header { display: flex; justify-content: space-between; align-items: center; padding: 16px 24px; border-bottom: 1px solid rgba(255,255,255,0.06); background: rgba(0,0,0,0.3); }
        .brand { display: flex; align-items: center; gap: 12px; }
        .brand-mark { width: 40px; height: 40px; border-radius: 12px; display: flex; align-items: center; justify-content: center; background: rgba(34,211,238,0.1); color: #67e8f9; font-weight: 600; }
        .eyebrow { font-size: 12px; text-transform: uppercase; letter-spacing: 0.2em; color: rgba(165,243,252,0.8); }
        .chip { border: 1px solid rgba(255,255,255,0.1); background: rgba(255,255,255,0.05); border-radius: 999px; padding: 4px 12px; font-size: 13px; color: rgba(255,255,255,0.8); }
        .grid { display: grid; gap: 24px; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); margin-top: 24px; }
        .stat-row { display: grid; gap: 16px; grid-template-columns: repeat(3, 1fr); margin-top: 24px; }
        .card { border: 1px solid rgba(255,255,255,0.08); background: rgba(255,255,255,0.04); border-radius: 16px; padding: 20px; }
        .card h2 { font-size: 20px; color: white; margin-bottom: 12px; }
        .stat-value { font-size: 28px; font-weight: 600; color: white; margin-top: 6px; }
        .muted { color: #94a3b8; font-size: 14px; }
        .field { display: flex; flex-direction: column; gap: 6px; margin-bottom: 12px; font-size: 14px; }
        .field input, .field select, .field textarea, .inline select, .inline input { background: #0f172a; border: 1px solid rgba(255,255,255,0.1); color: white; border-radius: 10px; padding: 8px 12px; font-size: 14px; }
        .btn { padding: 10px 18px; border: none; border-radius: 10px; cursor: pointer; font-size: 14px; font-weight: 600; background: #22d3ee; color: #020617; }
        .btn:disabled { opacity: 0.5; cursor: not-allowed; }
        .btn-outline { background: transparent; color: white; border: 1px solid rgba(255,255,255,0.15); }
        .error { color: #fda4af; font-size: 14px; margin-top: 8px; }
        .success { color: #6ee7b7; font-size: 14px; margin-top: 8px; }
        .warning { border: 1px solid rgba(251,191,36,0.4); background: rgba(251,191,36,0.08); border-radius: 12px; padding: 16px; margin-top: 24px; }
        .lead-row { display: grid; grid-template-columns: 2fr 1fr 1fr 2fr; gap: 12px; align-items: center; padding: 12px 0; border-top: 1px solid rgba(255,255,255,0.06); }
        .inline { display: flex; gap: 8px; }
        .call { background: rgba(255,255,255,0.05); border-radius: 10px; padding: 10px 12px; margin-top: 10px; }
        .call-meta { display: flex; justify-content: space-between; font-size: 12px; color: #94a3b8; }
        .pill { display: inline-block; border-radius: 999px; padding: 2px 10px; font-size: 12px; font-weight: 600; }
        .pill-new { background: #1e293b; color: #e2e8f0; }
        .pill-in-progress { background: rgba(6,182,212,0.2); color: #a5f3fc; }
        .pill-connected { background: rgba(52,211,153,0.2); color: #a7f3d0; }
        .pill-nurture { background: rgba(129,140,248,0.2); color: #c7d2fe; }
        .pill-closed-won { background: rgba(16,185,129,0.25); color: #d1fae5; }
        .pill-closed-lost { background: rgba(244,63,94,0.2); color: #ffe4e6; }
        footer { padding: 24px; text-align: center; color: #64748b; font-size: 13px; }
"#;

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>"#,
        html_escape(title)
    )
}

pub fn render_missing_config() -> String {
    page(
        "North Lead - setup required",
        r#"<div class="narrow">
    <p class="eyebrow">Setup required</p>
    <h1>Connect a PocketBase backend</h1>
    <p class="muted" style="margin-top: 12px">North Lead stores leads and call logs in PocketBase. Set <code>POCKETBASE_URL</code> (for example <code>http://127.0.0.1:8090</code>) in the environment or in <code>.env</code>, then restart.</p>
    <p class="muted" style="margin-top: 12px">Create the <code>leads</code> and <code>call_logs</code> collections by importing the output of <code>northlead schema</code> in the PocketBase admin UI.</p>
</div>"#,
    )
}

pub fn render_checking() -> String {
    page(
        "North Lead",
        r#"<div class="narrow"><p>Checking session...</p></div>"#,
    )
}

pub fn render_auth_screen(feedback: &AuthFeedback) -> String {
    let mut body = String::new();
    body.push_str(r#"<div class="narrow"><div class="card">"#);
    body.push_str(r#"<p class="eyebrow">North Lead</p><h2>Sign in to continue</h2>"#);
    body.push_str(r#"<form method="post" action="/auth/sign-in">"#);
    body.push_str(&format!(
        r#"<label class="field">Email<input type="email" name="email" value="{}" placeholder="you@company.com"></label>"#,
        html_escape(&feedback.email)
    ));
    body.push_str(
        r#"<label class="field">Password<input type="password" name="password" placeholder="••••••••"></label>"#,
    );
    body.push_str(r#"<div class="inline">"#);
    body.push_str(r#"<button class="btn" type="submit">Sign in</button>"#);
    body.push_str(r#"<button class="btn btn-outline" type="submit" formaction="/auth/sign-up">Create account</button>"#);
    body.push_str("</div></form>");
    if !feedback.message.is_empty() {
        body.push_str(&format!(
            r#"<p class="success">{}</p>"#,
            html_escape(&feedback.message)
        ));
    }
    if !feedback.error.is_empty() {
        body.push_str(&format!(
            r#"<p class="error">{}</p>"#,
            html_escape(&feedback.error)
        ));
    }
    body.push_str("</div></div>");
    page("North Lead - sign in", &body)
}

pub fn render_status_pill(status: LeadStatus) -> String {
    format!(
        r#"<span class="pill {}">{}</span>"#,
        status.pill_class(),
        status.as_str()
    )
}

fn status_options(selected: LeadStatus) -> String {
    LeadStatus::ALL
        .iter()
        .map(|s| {
            format!(
                r#"<option value="{0}"{1}>{0}</option>"#,
                s.as_str(),
                if *s == selected { " selected" } else { "" }
            )
        })
        .collect()
}

fn text_field(label: &str, name: &str, kind: &str, value: &str, required: bool) -> String {
    format!(
        r#"<label class="field">{label}<input type="{kind}" name="{name}" value="{}"{}></label>"#,
        html_escape(value),
        if required { " required" } else { "" }
    )
}

fn status_line(status: &MutationStatus, success: &str) -> String {
    match status {
        MutationStatus::Error(message) => {
            format!(r#"<p class="error">{}</p>"#, html_escape(message))
        }
        MutationStatus::Success => format!(r#"<p class="success">{success}</p>"#),
        _ => String::new(),
    }
}

fn disabled_if(pending: bool) -> &'static str {
    if pending {
        " disabled"
    } else {
        ""
    }
}

pub fn render_lead_form(form: &LeadForm, status: &MutationStatus) -> String {
    let mut html = String::new();
    html.push_str(r#"<div class="card"><p class="eyebrow">Lead intake</p><h2>Add a GC lead</h2>"#);
    html.push_str(r#"<p class="muted">Required: company</p>"#);
    html.push_str(r#"<form method="post" action="/leads">"#);
    html.push_str(&text_field("Company *", "company", "text", &form.company, true));
    html.push_str(&text_field("Contact name", "contact_name", "text", &form.contact_name, false));
    html.push_str(&text_field("Trade", "trade", "text", &form.trade, false));
    html.push_str(&text_field("Phone", "phone", "text", &form.phone, false));
    html.push_str(&text_field("Email", "email", "email", &form.email, false));
    html.push_str(&format!(
        r#"<label class="field">Status<select name="status">{}</select></label>"#,
        status_options(form.status)
    ));
    html.push_str(&text_field(
        "Next action date",
        "next_action",
        "date",
        &date_input_value(form.next_action),
        false,
    ));
    html.push_str(&format!(
        r#"<label class="field">Notes<textarea name="notes" rows="3">{}</textarea></label>"#,
        html_escape(&form.notes)
    ));
    html.push_str(&format!(
        r#"<button class="btn" type="submit"{}>{}</button>"#,
        disabled_if(status.is_pending()),
        if status.is_pending() { "Saving..." } else { "Save lead" }
    ));
    html.push_str(&status_line(status, "Lead saved."));
    html.push_str("</form></div>");
    html
}

pub fn render_call_form(form: &CallForm, leads: &[Lead], status: &MutationStatus) -> String {
    let mut html = String::new();
    html.push_str(r#"<div class="card"><p class="eyebrow">Call log</p><h2>Log a call</h2>"#);
    html.push_str(r#"<form method="post" action="/calls">"#);

    html.push_str(r#"<label class="field">Lead<select name="lead" required><option value="">Select a lead</option>"#);
    for lead in leads {
        html.push_str(&format!(
            r#"<option value="{}"{}>{}</option>"#,
            html_escape(&lead.id),
            if lead.id == form.lead { " selected" } else { "" },
            html_escape(&lead.company)
        ));
    }
    html.push_str("</select></label>");

    html.push_str(&text_field("Outcome", "outcome", "text", &form.outcome, false));
    html.push_str(&text_field(
        "Next action date",
        "next_action",
        "date",
        &date_input_value(form.next_action),
        false,
    ));
    html.push_str(&format!(
        r#"<label class="field">Notes<textarea name="notes" rows="3">{}</textarea></label>"#,
        html_escape(&form.notes)
    ));
    html.push_str(&format!(
        r#"<button class="btn" type="submit"{}>{}</button>"#,
        disabled_if(status.is_pending()),
        if status.is_pending() { "Logging..." } else { "Log call" }
    ));
    html.push_str(&status_line(status, "Call logged."));
    html.push_str("</form></div>");
    html
}

pub fn render_lead_table(leads: &[Lead], error: Option<&str>, update_status: &MutationStatus) -> String {
    let mut html = String::new();
    html.push_str(r#"<div class="card"><p class="eyebrow">Pipeline</p><h2>Leads</h2>"#);

    if let Some(error) = error {
        html.push_str(&format!(r#"<p class="error">{}</p>"#, html_escape(error)));
    }
    if let Some(error) = update_status.error() {
        html.push_str(&format!(r#"<p class="error">{}</p>"#, html_escape(error)));
    }
    if leads.is_empty() {
        html.push_str(r#"<p class="muted">No leads yet. Add your first GC above.</p>"#);
    }

    for lead in leads {
        let contact = lead.contact_name.as_deref().unwrap_or("No contact");
        let trade = lead
            .trade
            .as_deref()
            .map(|t| format!(" • {}", html_escape(t)))
            .unwrap_or_default();
        let next = match lead.next_action {
            Some(_) => format!(
                r#"<p class="muted">Next action</p><p>{}</p>"#,
                format_date(lead.next_action)
            ),
            None => r#"<p class="muted">No next action</p>"#.to_string(),
        };

        html.push_str(r#"<div class="lead-row">"#);
        html.push_str(&format!(
            r#"<div><p><strong>{}</strong></p><p class="muted">{}{trade}</p></div>"#,
            html_escape(&lead.company),
            html_escape(contact)
        ));
        html.push_str(&format!("<div>{}</div>", render_status_pill(lead.status)));
        html.push_str(&format!("<div>{next}</div>"));
        html.push_str(&format!(
            r#"<form class="inline" method="post" action="/leads/{}"><select name="status" onchange="this.form.submit()">{}</select><input type="date" name="next_action" value="{}" onchange="this.form.submit()"><noscript><button class="btn btn-outline" type="submit">Save</button></noscript></form>"#,
            html_escape(&lead.id),
            status_options(lead.status),
            date_input_value(lead.next_action)
        ));
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}

fn render_call(log: &CallLog, with_next_action: bool) -> String {
    let mut html = String::new();
    html.push_str(r#"<div class="call"><div class="call-meta">"#);
    html.push_str(&format!(
        "<span>{}</span><span>{}</span>",
        html_escape(log.lead_company().unwrap_or("Lead")),
        format_timestamp(&log.created)
    ));
    html.push_str("</div>");
    html.push_str(&format!("<p><strong>{}</strong></p>", html_escape(&log.outcome)));
    if let Some(notes) = &log.notes {
        html.push_str(&format!(r#"<p class="muted">{}</p>"#, html_escape(notes)));
    }
    if with_next_action && log.next_action.is_some() {
        html.push_str(&format!(
            r#"<p class="muted">Next action {}</p>"#,
            format_date(log.next_action)
        ));
    }
    html.push_str("</div>");
    html
}

pub fn render_call_feed(logs: &[CallLog], error: Option<&str>) -> String {
    let mut html = String::new();
    html.push_str(r#"<div class="card"><p class="eyebrow">Activity</p><h2>Call history</h2>"#);
    if let Some(error) = error {
        html.push_str(&format!(r#"<p class="error">{}</p>"#, html_escape(error)));
    }
    if logs.is_empty() {
        html.push_str(r#"<p class="muted">No calls logged yet.</p>"#);
    }
    for log in logs {
        html.push_str(&render_call(log, true));
    }
    html.push_str("</div>");
    html
}

pub fn render_pending_updates(pending: &[PendingLeadUpdate], status: &MutationStatus) -> String {
    if pending.is_empty() && status.error().is_none() {
        return String::new();
    }

    let mut html = String::new();
    html.push_str(r#"<div class="warning">"#);
    if !pending.is_empty() {
        html.push_str(&format!(
            "<p><strong>{} call log(s) saved without updating their lead.</strong></p>",
            pending.len()
        ));
        for entry in pending {
            html.push_str(&format!(
                r#"<p class="muted">Call {} → lead {}: {}</p>"#,
                html_escape(&entry.call_log_id),
                html_escape(&entry.lead_id),
                html_escape(&entry.last_error)
            ));
        }
        html.push_str(&format!(
            r#"<form method="post" action="/calls/pending/retry"><button class="btn" type="submit"{}>Retry lead updates</button></form>"#,
            disabled_if(status.is_pending())
        ));
    }
    html.push_str(&status_line(status, "Pending lead updates applied."));
    html.push_str("</div>");
    html
}

fn render_header(email: &str) -> String {
    format!(
        r#"<header class="header">
    <div class="brand"><span class="brand-mark">NL</span><div><p class="eyebrow">North Lead</p><p><strong>GC Outreach Workspace</strong></p></div></div>
    <form class="inline" method="post" action="/auth/sign-out"><span class="chip">{}</span><button class="chip" type="submit">Sign out</button></form>
</header>"#,
        html_escape(email)
    )
}

fn render_next_action(lead: Option<&Lead>) -> String {
    let mut html = String::from(r#"<div class="card"><p><strong>Next action</strong></p>"#);
    match lead {
        Some(lead) => {
            html.push_str(&format!(
                "<p><strong>{}</strong></p>",
                html_escape(&lead.company)
            ));
            html.push_str(&format!(
                r#"<p class="muted">{}</p>"#,
                html_escape(lead.last_outcome.as_deref().unwrap_or("No recent call logged"))
            ));
            html.push_str(&format!(
                r#"<p class="eyebrow">Due {}</p>"#,
                format_date(lead.next_action)
            ));
        }
        None => html.push_str(
            r#"<p class="muted">Add a lead to populate the next action queue.</p>"#,
        ),
    }
    html.push_str("</div>");
    html
}

pub fn render_dashboard(view: &DashboardView) -> String {
    let mut body = String::new();
    body.push_str(&render_header(&view.user.email));
    body.push_str(r#"<main class="container">"#);

    body.push_str(r#"<p class="eyebrow">Live contractor pipeline</p>"#);
    body.push_str(r#"<div class="stat-row">"#);
    for status in LeadStatus::ALL.iter().take(3) {
        body.push_str(&format!(
            r#"<div class="card"><p class="eyebrow">{}</p><p class="stat-value">{}</p><p class="muted">Leads in this state</p></div>"#,
            status.as_str(),
            view.stats.count(*status)
        ));
    }
    body.push_str("</div>");

    body.push_str(&render_pending_updates(&view.pending, &view.retry_pending));

    body.push_str(r#"<div class="grid">"#);
    body.push_str(&render_next_action(view.stats.next_action.as_ref()));
    body.push_str(r#"<div class="card"><p><strong>Latest calls</strong></p>"#);
    if view.call_logs.data.is_empty() {
        body.push_str(r#"<p class="muted">No calls logged yet.</p>"#);
    }
    for log in view.call_logs.data.iter().take(4) {
        body.push_str(&render_call(log, false));
    }
    body.push_str("</div></div>");

    body.push_str(r#"<div class="grid">"#);
    body.push_str(&render_lead_form(&view.lead_form, &view.create_lead));
    body.push_str(&render_call_form(&view.call_form, &view.leads.data, &view.log_call));
    body.push_str("</div>");

    body.push_str(r#"<div class="grid">"#);
    body.push_str(&render_lead_table(
        &view.leads.data,
        view.leads.error.as_deref(),
        &view.update_lead,
    ));
    body.push_str("</div>");

    body.push_str(r#"<div class="grid">"#);
    body.push_str(&render_call_feed(&view.call_logs.data, view.call_logs.error.as_deref()));
    body.push_str("</div>");

    body.push_str("</main>");
    body.push_str("<footer>North Lead · GC outreach pipeline</footer>");
    page("North Lead", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(id: &str, company: &str) -> Lead {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "owner": "u1",
            "company": company,
            "status": "Nurture",
            "next_action": "2025-04-01"
        }))
        .unwrap()
    }

    #[test]
    fn test_every_status_has_its_own_pill() {
        let classes: std::collections::HashSet<&str> =
            LeadStatus::ALL.iter().map(|s| s.pill_class()).collect();
        assert_eq!(classes.len(), LeadStatus::ALL.len());
        assert!(render_status_pill(LeadStatus::ClosedLost).contains("pill-closed-lost"));
    }

    #[test]
    fn test_auth_screen_shows_feedback_escaped() {
        let html = render_auth_screen(&AuthFeedback {
            email: "a@b.co".to_string(),
            message: String::new(),
            error: "<script>".to_string(),
        });
        assert!(html.contains(r#"value="a@b.co""#));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_lead_form_reflects_pending_and_error() {
        let html = render_lead_form(&LeadForm::default(), &MutationStatus::Pending);
        assert!(html.contains("Saving..."));
        assert!(html.contains(" disabled"));

        let html = render_lead_form(
            &LeadForm::default(),
            &MutationStatus::Error("Not authenticated".to_string()),
        );
        assert!(html.contains("Not authenticated"));
        assert!(html.contains(r#"<option value="New" selected>"#));
    }

    #[test]
    fn test_call_form_lists_leads_and_keeps_selection() {
        let leads = vec![lead("l1", "Acme"), lead("l2", "Beta & Sons")];
        let form = CallForm {
            lead: "l2".to_string(),
            ..Default::default()
        };
        let html = render_call_form(&form, &leads, &MutationStatus::Idle);
        assert!(html.contains(r#"<option value="">Select a lead</option>"#));
        assert!(html.contains(r#"<option value="l2" selected>Beta &amp; Sons</option>"#));
        assert!(html.contains(r#"value="Connected""#));
    }

    #[test]
    fn test_lead_table_inline_editor_posts_to_lead() {
        let html = render_lead_table(&[lead("l1", "Acme")], None, &MutationStatus::Idle);
        assert!(html.contains(r#"action="/leads/l1""#));
        assert!(html.contains(r#"value="2025-04-01""#));
        assert!(html.contains("No contact"));

        let empty = render_lead_table(&[], None, &MutationStatus::Idle);
        assert!(empty.contains("No leads yet"));
    }

    #[test]
    fn test_missing_config_names_variable() {
        assert!(render_missing_config().contains("POCKETBASE_URL"));
    }
}
