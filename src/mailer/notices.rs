//! Notice templates sent back to the forwarding sender.

use super::OutboundEmail;

const REJECTION_TEXT: &str = "Sorry, you are not authorized to use this service. \
Please verify your email address and try again.";

/// Reply subject line for a forwarded email.
pub fn reply_subject(subject: &str) -> String {
    format!("Re: {subject}")
}

/// Notice for senders that could not be authorized.
pub fn rejection_notice(to: &str, subject: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: reply_subject(subject),
        text: REJECTION_TEXT.to_string(),
        html: None,
    }
}

/// Instructions for accounts that have not installed the companion app.
pub fn install_instructions(to: &str, subject: &str, install_url: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: reply_subject(subject),
        text: format!(
            "Thanks for using Cal AI! To get started, the app must be installed. \
             Click this link to install the Cal AI app: {install_url}"
        ),
        html: Some(format!(
            "Thanks for using Cal AI! To get started, the app must be installed. \
             <a href=\"{}\" target=\"_blank\">Click this link</a> to install it.",
            escape_attr(install_url)
        )),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
