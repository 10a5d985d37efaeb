use serde::Deserialize;
use validator::Validate;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

fn default_hours() -> u32 {
    24
}

/// Query parameters for the execution history
#[derive(Deserialize, Debug, Validate)]
pub struct ExecutionsQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,

    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 100, message = "per_page must be between 1 and 100"))]
    pub per_page: u32,
}

/// Query parameters for the readings window
#[derive(Deserialize, Debug, Validate)]
pub struct ReadingsQuery {
    #[serde(default = "default_hours")]
    #[validate(range(min = 1, max = 720, message = "hours must be between 1 and 720"))]
    pub hours: u32,
}
