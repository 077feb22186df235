//! HTML bodies for the contact emails. All user text is escaped.

use crate::models::ContactRequest;

const BODY_STYLE: &str = "background-color:#f6f9fc;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,'Helvetica Neue',Ubuntu,sans-serif";
const CARD_STYLE: &str = "background-color:#ffffff;margin:0 auto;padding:20px 0 48px;margin-bottom:64px";
const TEXT_STYLE: &str = "color:#333;font-size:16px;line-height:26px;padding:0 40px";
const BOX_STYLE: &str = "background-color:#f4f4f4;border-radius:8px;margin:24px 40px;padding:24px";

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape and keep the submitter's line breaks.
fn paragraph(input: &str) -> String {
    escape_html(input).replace('\n', "<br />")
}

fn page(preview: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\" /></head>\
         <body style=\"{BODY_STYLE}\">\
         <div style=\"display:none\">{preview}</div>\
         <div style=\"{CARD_STYLE}\">{content}</div>\
         </body></html>"
    )
}

/// Confirmation sent back to whoever filled in the form.
pub fn user_confirmation(req: &ContactRequest, support_email: &str) -> String {
    let content = format!(
        "<h1 style=\"color:#333;font-size:24px;text-align:center\">Thank you for reaching out!</h1>\
         <p style=\"{TEXT_STYLE}\">Hi {name},</p>\
         <p style=\"{TEXT_STYLE}\">We've received your message and will get back to you within 24 hours.</p>\
         <div style=\"{BOX_STYLE}\">\
         <p><strong>Your Message:</strong></p>\
         <p><strong>Subject:</strong> {subject}</p>\
         <p>{message}</p>\
         </div>\
         <p style=\"{TEXT_STYLE}\">If you have any urgent concerns, feel free to reach us at {support}.</p>\
         <p style=\"{TEXT_STYLE}\">Best regards,<br /><strong>The AV ARENA Team</strong></p>",
        name = escape_html(&req.name),
        subject = escape_html(&req.subject),
        message = paragraph(&req.message),
        support = escape_html(support_email),
    );
    page("Thank you for contacting AV ARENA!", &content)
}

/// Notification for the site admin.
pub fn admin_notification(req: &ContactRequest) -> String {
    let phone = req
        .phone
        .as_deref()
        .map(|p| format!("<p><strong>Phone:</strong> {}</p>", escape_html(p)))
        .unwrap_or_default();
    let content = format!(
        "<h1 style=\"color:#333;font-size:24px;text-align:center\">New Contact Form Submission</h1>\
         <div style=\"{BOX_STYLE}\">\
         <p><strong>Contact Information:</strong></p>\
         <p><strong>Name:</strong> {name}</p>\
         <p><strong>Email:</strong> {email}</p>\
         {phone}\
         </div>\
         <div style=\"{BOX_STYLE}\">\
         <p><strong>Message Details:</strong></p>\
         <p><strong>Subject:</strong> {subject}</p>\
         <p>{message}</p>\
         </div>\
         <p style=\"{TEXT_STYLE}\">This is an automated notification from AV ARENA contact form.</p>",
        name = escape_html(&req.name),
        email = escape_html(&req.email),
        subject = escape_html(&req.subject),
        message = paragraph(&req.message),
    );
    page(
        &format!("New contact form submission from {}", escape_html(&req.name)),
        &content,
    )
}
