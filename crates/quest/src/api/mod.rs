pub mod auth;
pub mod error;
pub mod handler;
pub mod profile;
pub mod request;
pub mod response;
pub mod routes;
pub mod search;
pub mod wrapper;
