pub mod authentication_method;
pub mod user;
pub mod user_authentication_method;
