use crate::api::Error;

pub const DEFAULT_ROOT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_REPLY_PAGE_SIZE: u32 = 10;

/// Page sizes used when the caller does not give one explicitly
///
/// The reply page size should stay fixed for a session: the next reply page is
/// derived from how many replies are already loaded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub root_page_size: u32,
    pub reply_page_size: u32,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            root_page_size: DEFAULT_ROOT_PAGE_SIZE,
            reply_page_size: DEFAULT_REPLY_PAGE_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.root_page_size == 0 {
            return Err(Error::Validation(String::from(
                "root page size must be positive",
            )));
        }
        if self.reply_page_size == 0 {
            return Err(Error::Validation(String::from(
                "reply page size must be positive",
            )));
        }
        Ok(())
    }
}
