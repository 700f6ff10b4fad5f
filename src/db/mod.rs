pub mod cloud_accounts;
pub mod link_sessions;
pub mod users;
