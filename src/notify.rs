//! Email composition for the reconciliation passes.
//!
//! Only builds [`Email`] values; sending goes through the
//! [`crate::ports::Notifier`] port.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::config::ID_TOKEN;
use crate::drift::TeamAssignedInfo;
use crate::ports::Email;

/// Shown in the digest when a request has no diagnostic message.
pub const TEAM_NOT_ASSIGNED: &str = "Team not assigned";

/// Substitutes the case identifier into a subject template.
#[must_use]
pub fn render_subject(template: &str, case_id: &str) -> String {
    template.replace(ID_TOKEN, case_id)
}

/// Escapes text for inclusion in HTML bodies and attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Announces a newly linked case to its team.
#[must_use]
pub fn new_case_email(
    recipients: Vec<String>,
    subject_template: &str,
    case_id: &str,
    site_url: &str,
    site_name: &str,
) -> Email {
    let html_body = format!(
        "<p>Hi</p><p>Request {id} has been submitted on the portal.</p>\
         <p><a href='{url}'>Click here to go to the '{name}' site</a></p>",
        id = escape_html(case_id),
        url = escape_html(site_url),
        name = escape_html(site_name),
    );
    Email { to: recipients, subject: render_subject(subject_template, case_id), html_body }
}

/// Tells case owners that response documents have been filed.
#[must_use]
pub fn response_email(
    recipients: Vec<String>,
    subject_template: &str,
    case_id: &str,
    site_url: &str,
    folder: &str,
) -> Email {
    let html_body = format!(
        "<p>Hi</p><p>New documents have been received for request {id}.</p>\
         <p>They have been saved to <a href='{url}'>{folder}</a>.</p>",
        id = escape_html(case_id),
        url = escape_html(site_url),
        folder = escape_html(folder),
    );
    Email { to: recipients, subject: render_subject(subject_template, case_id), html_body }
}

fn digest_row(body: &mut String, info: &TeamAssignedInfo) {
    let reference = escape_html(&info.reference);
    let reference = match &info.url {
        Some(url) => format!("<a href='{}'>{reference}</a>", escape_html(url)),
        None => reference,
    };
    let message = info.message.as_deref().unwrap_or(TEAM_NOT_ASSIGNED);
    let _ = write!(
        body,
        "<tr><td>{reference}</td><td>{}</td><td>{}</td></tr>",
        format_created(info.created),
        escape_html(message),
    );
}

/// Formats a creation time the way the digest shows it (`dd/mm/yyyy hh:mm`).
#[must_use]
pub fn format_created(created: DateTime<Utc>) -> String {
    created.format("%d/%m/%Y %H:%M").to_string()
}

/// Lists requests still waiting for a team, in the given order.
#[must_use]
pub fn digest_email(
    recipients: Vec<String>,
    subject: &str,
    entries: &[&TeamAssignedInfo],
) -> Email {
    let mut html_body = String::from(
        "<p>Hi</p><style>td {padding: 0px 10px 0px 10px}</style>\
         <p>Listed below are recent requests that have not been assigned teams since submission</p>\
         <table><tr><th>Case ID</th><th>Submitted</th><th>Additional information</th></tr>",
    );
    for info in entries {
        digest_row(&mut html_body, info);
    }
    html_body.push_str("</table>");
    Email { to: recipients, subject: subject.to_string(), html_body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(reference: &str, url: Option<&str>, message: Option<&str>) -> TeamAssignedInfo {
        TeamAssignedInfo {
            reference: reference.into(),
            url: url.map(String::from),
            created: Utc.with_ymd_and_hms(2024, 5, 3, 14, 7, 0).unwrap(),
            changed: false,
            message: message.map(String::from),
        }
    }

    #[test]
    fn subject_substitutes_every_token() {
        assert_eq!(render_subject("New {ID} ({ID})", "SAU42"), "New SAU42 (SAU42)");
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("a<b & 'c'"), "a&lt;b &amp; &#39;c&#39;");
    }

    #[test]
    fn new_case_email_links_the_site() {
        let email = new_case_email(
            vec!["a@x.org".into()],
            "New request {ID}",
            "SAU42",
            "https://site/case42",
            "Harbour Works 42",
        );
        assert_eq!(email.subject, "New request SAU42");
        assert!(email.html_body.contains("<a href='https://site/case42'>"));
        assert!(email.html_body.contains("'Harbour Works 42' site"));
    }

    #[test]
    fn digest_rows_keep_order_and_defaults() {
        let linked = info("HR-1", Some("https://site/1"), None);
        let orphan = info("HR-2", None, Some("Unable to determine site group"));
        let email = digest_email(vec!["lead@x.org".into()], "Digest", &[&linked, &orphan]);

        let first = email.html_body.find("HR-1").unwrap();
        let second = email.html_body.find("HR-2").unwrap();
        assert!(first < second);
        assert!(email.html_body.contains("<a href='https://site/1'>HR-1</a>"));
        assert!(email.html_body.contains("<td>03/05/2024 14:07</td><td>Team not assigned</td>"));
        assert!(email.html_body.contains("<td>HR-2</td>"));
        assert!(email.html_body.contains("Unable to determine site group"));
    }
}
