//! Subjects and bodies for account emails.

use std::time::Duration;

use super::OutboundEmail;

const ORGANIZATION: &str = "Recruitment";

/// Render a lifetime the way users read it: "10 minutes", "1 hour", "2 hours".
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    }
}

pub fn verification(to: &str, code: &str, valid_for: Duration) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: format!("Thank you for applying to {ORGANIZATION}. Please verify your email address"),
        body: format!(
            "Your OTP is: <strong>{code}</strong>. It is valid for {}.",
            format_duration(valid_for)
        ),
    }
}

pub fn resend_verification(to: &str, code: &str, valid_for: Duration) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: format!("{ORGANIZATION} - New Verification Code"),
        body: format!(
            "Your new OTP is: <strong>{code}</strong>. It is valid for {}.",
            format_duration(valid_for)
        ),
    }
}

pub fn password_reset(to: &str, code: &str, valid_for: Duration) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: format!("{ORGANIZATION} - Password Reset Request"),
        body: format!(
            "You have requested to reset your password. Your reset code is: <strong>{code}</strong>. \
             This code is valid for {}. If you did not request this reset, please ignore this email.",
            format_duration(valid_for)
        ),
    }
}

pub fn password_reset_success(to: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: format!("{ORGANIZATION} - Password Reset Successful"),
        body: "Your password has been successfully reset. If you did not perform this action, \
               please contact support immediately."
            .to_string(),
    }
}
