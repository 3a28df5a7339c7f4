mod user;
mod forms;
mod credit;

pub use user::{User, UserCollection};
pub use forms::{CredentialsForm, AddCreditForm};
pub use credit::Credit;
