//! Canned-reply help chat.

pub const GREETING: &str = "Radhey Shyam 🙏 How can I help you today?";
pub const DEFAULT_REPLY: &str = "Radhe Shyam , Please contact on +91 95409 17385";

/// Keyword groups checked in order; the first group with any match wins.
const REPLIES: &[(&[&str], &str)] = &[
    (
        &["darshan timing"],
        "Our temple darshan timings are 6 AM - 12 PM and 4 PM - 8 PM.",
    ),
    (
        &["location"],
        "We are located at Gaur Kripa Dham Vrindavan, Uttar Pradesh.",
    ),
    (
        &["events", "programs"],
        "Upcoming events: Kirtan night on Sunday, and Satsang on Wednesday.",
    ),
    (&["contact"], "You can contact us at +91 95409 17385"),
    (&["radhe shyam"], "Radhe Shyam , How May we Help"),
];

/// Reply to `message`, or `None` for blank input.
pub fn reply(message: &str) -> Option<&'static str> {
    if message.trim().is_empty() {
        return None;
    }
    let lower = message.to_lowercase();
    let reply = REPLIES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_REPLY);
    Some(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_match_case_insensitively_in_order() {
        assert_eq!(
            reply("What are the DARSHAN TIMINGS?"),
            Some("Our temple darshan timings are 6 AM - 12 PM and 4 PM - 8 PM.")
        );
        assert_eq!(
            reply("location and contact please"),
            Some("We are located at Gaur Kripa Dham Vrindavan, Uttar Pradesh.")
        );
        assert_eq!(
            reply("any programs?"),
            Some("Upcoming events: Kirtan night on Sunday, and Satsang on Wednesday.")
        );
        assert_eq!(reply("Radhe Shyam"), Some("Radhe Shyam , How May we Help"));
    }

    #[test]
    fn unknown_and_blank_messages() {
        assert_eq!(reply("hello"), Some(DEFAULT_REPLY));
        assert_eq!(reply("   "), None);
    }
}
