//! Every user-facing string the gatekeeper sends.

use crate::channels::Choice;
use crate::gate::action::{ActionTag, Decision};
use crate::identity::SenderId;
use crate::users::{SenderProfile, UserRecord};

pub const ADMIN_WELCOME: &str = "Hello Admin! You are now registered and can use this bot!";

pub const STILL_PENDING: &str = "Your request is still pending. Please await approval.";

pub const STILL_PENDING_BE_PATIENT: &str = "Your request is still pending!\nPlease be patient.";

pub const NOT_AUTHORIZED: &str = "Sorry, you are not authorized to use this bot.";

pub const REQUEST_SENT: &str = "Your request is sent to the admins for approval.\n\
     Please await their response.\n\
     They usually respond within 24 hours.";

pub const REQUEST_SENT_ACK: &str = "Request sent! We will get back to you.";

pub const RESOLVE_ACK: &str = "All done. Have a nice one!";

pub const ACCESS_GRANTED: &str = "Access is granted! You can now play with me!";

pub const ACCESS_REJECTED: &str = "Access is rejected! You cannot use this bot. Sorry mate.";

/// Reply sent by the business handler to admitted senders.
pub const ECHO_REPLY: &str = "👋";

/// The "Request Access" button shown to an unknown sender.
pub fn request_access_choice(sender: &SenderId) -> Vec<Choice> {
    vec![Choice::new("Request Access", ActionTag::request_access(sender))]
}

/// Allow / Reject buttons shown to the admin.
pub fn decision_choices(sender: &SenderId) -> Vec<Choice> {
    vec![
        Choice::new("Allow", ActionTag::allow(sender)),
        Choice::new("Reject", ActionTag::reject(sender)),
    ]
}

/// Admin notice for a sender seen for the first time.
pub fn unknown_sender_notice(profile: &SenderProfile) -> String {
    format!(
        "Unknown user with ID {} tried to access the bot. Allow or reject them?\n{}",
        profile.id,
        profile.to_pretty_json()
    )
}

/// Admin notice for a sender who pressed "Request Access".
pub fn access_request_notice(profile: &SenderProfile) -> String {
    format!(
        "Hello Admin!\nI want to use your bot! Please allow me to use it.\n\nMy User Details:\n{}",
        profile.to_pretty_json()
    )
}

/// Outcome message for the requesting user.
pub fn outcome_for_user(decision: Decision) -> &'static str {
    match decision {
        Decision::Allow => ACCESS_GRANTED,
        Decision::Reject => ACCESS_REJECTED,
    }
}

/// Confirmation for the admin, echoing the stored record.
pub fn outcome_for_admin(decision: Decision, record: &UserRecord) -> String {
    match decision {
        Decision::Allow => format!(
            "User is now approved. User Details:\n{}",
            record.to_pretty_json()
        ),
        Decision::Reject => format!(
            "User is now rejected and will be blocked in the future. User Details:\n{}",
            record.to_pretty_json()
        ),
    }
}

pub fn unknown_record_notice(sender: &SenderId) -> String {
    format!("No user record exists for ID {sender}. Nothing was changed.")
}

pub fn cannot_resolve_admin_notice(sender: &SenderId) -> String {
    format!("ID {sender} is an admin and cannot be allowed or rejected.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_choices_carry_tags() {
        let choices = decision_choices(&SenderId::from(42));
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].label, "Allow");
        assert_eq!(choices[0].action_tag, "allow|42");
        assert_eq!(choices[1].label, "Reject");
        assert_eq!(choices[1].action_tag, "reject|42");
    }

    #[test]
    fn request_access_choice_tag() {
        let choices = request_access_choice(&SenderId::from(42));
        assert_eq!(choices[0].action_tag, "requestAccess|42");
    }

    #[test]
    fn notices_include_sender_details() {
        let profile = SenderProfile::bare(42).with_username("ada");
        let notice = unknown_sender_notice(&profile);
        assert!(notice.contains("ID 42"));
        assert!(notice.contains("\"username\": \"ada\""));

        let notice = access_request_notice(&profile);
        assert!(notice.contains("\"id\": \"42\""));
    }

    #[test]
    fn admin_outcome_echoes_record() {
        let record = UserRecord::from_profile(&SenderProfile::bare(42));
        let text = outcome_for_admin(Decision::Reject, &record);
        assert!(text.starts_with("User is now rejected"));
        assert!(text.contains("\"status\": \"new\""));
    }
}
