pub mod cloud_account;
pub mod link_session;
pub mod resource;
pub mod user;

pub use cloud_account::{
    AwsCredentials, AzureCredentials, CloudAccount, CloudAccountInput, Credentials,
    GcpCredentials, NewCloudAccount, Provider,
};
pub use link_session::LinkSessionRow;
pub use resource::{
    AccountFailure, Ack, AggregateResponse, AggregateStatus, AggregatedResourceItem,
    FailureKind, ResourceKind,
};
pub use user::User;
