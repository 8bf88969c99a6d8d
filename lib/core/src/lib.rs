pub mod comment;
pub mod media;
pub mod memory;
pub mod notification;
pub mod post;
pub mod ranking;
pub mod state;
pub mod store;
