use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLinkError {
    Blank,
    NotYoutubeWatch,
}

impl std::fmt::Display for AdminLinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "YouTube link cannot be blank."),
            Self::NotYoutubeWatch => write!(f, "Please enter a valid YouTube link."),
        }
    }
}

impl std::error::Error for AdminLinkError {}

/// Converts a `youtube.com/watch?v=` link into its embeddable form.
pub fn embed_link(raw: &str) -> Result<String, AdminLinkError> {
    let link = raw.trim();
    if link.is_empty() {
        return Err(AdminLinkError::Blank);
    }
    if !link.contains("youtube.com/watch?v=") {
        return Err(AdminLinkError::NotYoutubeWatch);
    }
    Ok(link.replacen("watch?v=", "embed/", 1))
}
