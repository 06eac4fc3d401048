pub const APP_NAME: &str = "Haul Scanner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");
pub const GIT_SHA: Option<&str> = option_env!("GIT_SHA");

/// Release tag when built from one, else `v<crate version>` plus the commit.
pub fn version_label() -> String {
    match (GIT_TAG, GIT_SHA) {
        (Some(tag), _) => tag.to_string(),
        (None, Some(sha)) => format!("v{APP_VERSION}-{sha}"),
        (None, None) => format!("v{APP_VERSION}"),
    }
}

/// ESI asks every client to identify itself and, ideally, give a contact
/// (mail address or character name) it can reach out to.
pub fn user_agent(contact: Option<&str>) -> String {
    let product = format!("{}/{}", APP_NAME.replace(' ', ""), version_label());
    match contact.map(str::trim).filter(|contact| !contact.is_empty()) {
        Some(contact) => format!("{product} ({contact})"),
        None => product,
    }
}
