//! Collection and field names used in the remote document store.

/// Collection names.
pub mod collections {
    pub const CONFIG: &str = "Config";
    pub const QUESTIONS: &str = "Questions";
    pub const REPLIES: &str = "Replies";
    pub const USERS: &str = "Users";
}

/// Id of the singleton site configuration document in `Config`.
pub const SITE_INFO: &str = "SiteInfo";

/// Document field names.
pub mod fields {
    pub const TITLE: &str = "Title";
    pub const DESCRIPTION: &str = "Description";
    pub const REPLIES: &str = "Replies";
    pub const CONTENT: &str = "Content";

    pub const UID: &str = "Uid";
    pub const DISPLAY_NAME: &str = "DisplayName";
    pub const PHOTO_URL: &str = "PhotoURL";
    pub const CREATED_AT: &str = "CreatedAt";
}
