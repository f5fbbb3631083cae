//! Message bodies for each notification kind.

use std::fmt::Write;

use chrono::DateTime;

use civicdesk_core::model::IssueReport;
use civicdesk_core::notify::verification_link;

use super::MailMessage;

const SIGN_OFF: &str = "Best regards,\nThe civicdesk team";

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0).map_or_else(
        || timestamp.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

/// Two-column field table rendered as aligned plain text.
fn details(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in rows {
        let _ = writeln!(out, "  {key:<width$}  {value}");
    }
    out
}

pub fn verification(from: &str, to: &str, base_url: &str, token: &str) -> MailMessage {
    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Verify Your Email".to_string(),
        body: format!(
            "Email Verification\n\nOpen the link below to verify your email:\n\n{}\n\n{SIGN_OFF}\n",
            verification_link(base_url, token)
        ),
    }
}

pub fn submission_confirmation(from: &str, to: &str, report: &IssueReport) -> MailMessage {
    let table = details(&[
        ("Complaint ID", report.id.to_string()),
        ("Title", report.title.clone()),
        ("Description", report.description.clone()),
        ("Status", report.status.to_string()),
        ("Submitted On", format_time(report.created_at)),
    ]);
    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Complaint Registered - ID: {}", report.id),
        body: format!(
            "Dear {},\n\nYour complaint has been registered with the following details:\n\n{table}\n\
             Thank you for reporting the issue. We will address it promptly.\n\n{SIGN_OFF}\n",
            report.reporter_name
        ),
    }
}

pub fn status_change(from: &str, to: &str, report: &IssueReport) -> MailMessage {
    let table = details(&[
        ("Complaint ID", report.id.to_string()),
        ("Title", report.title.clone()),
        ("New Status", report.status.to_string()),
        ("Updated On", format_time(report.updated_at)),
    ]);
    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Complaint Status Updated - ID: {}", report.id),
        body: format!(
            "Dear {},\n\nThe status of your complaint has been updated:\n\n{table}\n\
             Please contact us if you have any questions.\n\n{SIGN_OFF}\n",
            report.reporter_name
        ),
    }
}

pub fn deletion_notice(from: &str, to: &str, report: &IssueReport, message: &str) -> MailMessage {
    let table = details(&[
        ("Complaint ID", report.id.to_string()),
        ("Title", report.title.clone()),
        ("Last Status", report.status.to_string()),
    ]);
    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Complaint Deleted - ID: {}", report.id),
        body: format!(
            "Dear {},\n\n{message}\n\n{table}\n{SIGN_OFF}\n",
            report.reporter_name
        ),
    }
}
