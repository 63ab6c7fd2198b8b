pub mod prelude;

pub mod image;
pub mod response;
pub mod search;
pub mod social_profile;
pub mod user;
pub mod user_detail;
