pub use super::image::Entity as Image;
pub use super::response::Entity as Response;
pub use super::search::Entity as Search;
pub use super::social_profile::Entity as SocialProfile;
pub use super::user::Entity as User;
pub use super::user_detail::Entity as UserDetail;
