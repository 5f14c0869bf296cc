// Validation bounds enforced by the handlers before anything reaches the store.

pub const MAX_TITLE_LENGTH: usize = 120;
pub const MAX_DESCRIPTION_LENGTH: usize = 4000;
pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_CATEGORY_LENGTH: usize = 64;
pub const MAX_IMAGES_PER_POST: usize = 5;
pub const MAX_IMAGE_URL_LENGTH: usize = 2048;
pub const MAX_REJECT_REASON_LENGTH: usize = 500;
