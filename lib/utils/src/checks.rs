use const_format::formatcp;
use validator::ValidationError;

use crate::constants::{IMAGE_TYPE, MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH, MAX_USERNAME_LENGTH, VIDEO_TYPE};
use crate::errors::AppError;

/// # Returns whether the given string `input` is shorter or equal than the given max length and, if not `is_empty_ok` than it's not empty
///
/// ```
/// use threadboard_utils::checks::{check_string_length};
/// use threadboard_utils::errors::AppError;
///
/// assert!(check_string_length("hello", "input", 5, false).is_ok());
/// assert_eq!(check_string_length("hello", "input", 4, false), Err(AppError::ValidationError(String::from("input exceeds the maximum length: 4."))));
/// assert_eq!(check_string_length("", "input", 4, false), Err(AppError::ValidationError(String::from("input cannot be empty."))));
/// assert!(check_string_length("", "input", 4, true).is_ok());
/// ```
pub fn check_string_length(
    input: &str,
    input_name: &str,
    max_length: usize,
    is_empty_ok: bool,
) -> Result<(), AppError> {
    match (input.len() > max_length, !is_empty_ok && input.is_empty()) {
        (true, _) => Err(AppError::ValidationError(format!("{input_name} exceeds the maximum length: {max_length}."))),
        (_, true) => Err(AppError::ValidationError(format!("{input_name} cannot be empty."))),
        (false, false) => Ok(()),
    }
}

/// # Returns whether a post's title is valid.
///
/// ```
/// use threadboard_utils::checks::{check_post_title};
/// use threadboard_utils::constants::MAX_TITLE_LENGTH;
///
/// assert!(check_post_title("title").is_ok());
/// assert!(check_post_title("").is_err());
/// assert!(check_post_title("invalid\ntitle").is_err());
/// assert!(check_post_title("also invalid\rtitle").is_err());
/// assert!(check_post_title(&"a".repeat(MAX_TITLE_LENGTH as usize)).is_ok());
/// assert!(check_post_title(&"a".repeat(MAX_TITLE_LENGTH as usize + 1)).is_err());
/// ```
pub fn check_post_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        Err(ValidationError::new("Post title cannot be empty."))
    } else if title.len() > MAX_TITLE_LENGTH as usize {
        Err(ValidationError::new(formatcp!("Post title cannot exceed {MAX_TITLE_LENGTH} characters.")))
    } else if title.contains(&['\r', '\n'][..]) {
        Err(ValidationError::new("Post title cannot contain newlines."))
    } else {
        Ok(())
    }
}

/// # Returns whether a comment's body is valid.
///
/// A comment body must contain at least one non-whitespace character.
///
/// ```
/// use threadboard_utils::checks::{check_comment_body};
/// use threadboard_utils::constants::MAX_CONTENT_LENGTH;
///
/// assert!(check_comment_body("hello").is_ok());
/// assert!(check_comment_body("multi\nline").is_ok());
/// assert!(check_comment_body("").is_err());
/// assert!(check_comment_body(" \n\t").is_err());
/// assert!(check_comment_body(&"a".repeat(MAX_CONTENT_LENGTH as usize)).is_ok());
/// assert!(check_comment_body(&"a".repeat(MAX_CONTENT_LENGTH as usize + 1)).is_err());
/// ```
pub fn check_comment_body(body: &str) -> Result<(), ValidationError> {
    if body.trim().is_empty() {
        Err(ValidationError::new("Comment cannot be empty."))
    } else if body.len() > MAX_CONTENT_LENGTH as usize {
        Err(ValidationError::new(formatcp!("Comment cannot exceed {MAX_CONTENT_LENGTH} characters.")))
    } else {
        Ok(())
    }
}

/// # Returns whether the mime type of an attached media is supported, i.e. an image or a video.
///
/// ```
/// use threadboard_utils::checks::{check_media_content_type};
///
/// assert!(check_media_content_type("image/png").is_ok());
/// assert!(check_media_content_type("video/mp4").is_ok());
/// assert!(check_media_content_type("image/").is_err());
/// assert!(check_media_content_type("application/pdf").is_err());
/// assert!(check_media_content_type("").is_err());
/// ```
pub fn check_media_content_type(content_type: &str) -> Result<(), ValidationError> {
    let subtype = content_type
        .strip_prefix(IMAGE_TYPE)
        .or_else(|| content_type.strip_prefix(VIDEO_TYPE));
    match subtype {
        Some(subtype) if !subtype.is_empty() => Ok(()),
        _ => Err(ValidationError::new("Media must be an image or a video.")),
    }
}

/// # Returns whether a username is valid.
///
/// # Valid usernames contain only ascii alphanumeric characters, '-', '_' and have a maximum length of `MAX_USERNAME_LENGTH`
///
/// ```
/// use threadboard_utils::checks::{check_username};
/// use threadboard_utils::constants::MAX_USERNAME_LENGTH;
///
/// assert!(check_username("-Abc123_").is_ok());
/// assert!(check_username(" name").is_err());
/// assert!(check_username("name%").is_err());
/// assert!(check_username("").is_err());
/// assert!(check_username(&"a".repeat(MAX_USERNAME_LENGTH)).is_ok());
/// assert!(check_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
/// ```
pub fn check_username(name: &str) -> Result<(), AppError> {
    if !name.chars().all(move |c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        Err(AppError::ValidationError(String::from("Username can only contain alphanumeric characters, dashes and underscores.")))
    } else {
        check_string_length(name, "Username", MAX_USERNAME_LENGTH, false)
    }
}
