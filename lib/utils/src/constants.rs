pub const BEST_ORDER_BY_COLUMN: &str = "points";
pub const RECENT_ORDER_BY_COLUMN: &str = "create_timestamp";


pub const DELETED_MESSAGE: &str = "Deleted";
pub const IMAGE_TYPE: &str = "image/";
pub const VIDEO_TYPE: &str = "video/";


pub const MAX_USERNAME_LENGTH: usize = 30;
pub const MAX_TITLE_LENGTH: u64 = 250;
pub const MAX_CONTENT_LENGTH: u64 = 20000;
pub const MAX_CONTENT_TYPE_LENGTH: u64 = 100;
pub const MAX_EXTERNAL_ID_LENGTH: u64 = 200;


pub const THOUSAND: i32 = 1000;
pub const MILLION: i32 = 1000000;
