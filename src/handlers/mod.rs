mod auth;
mod credit;
mod extract;

pub use auth::{handle_register, handle_login};
pub use credit::{add_credit, check_credit};
pub use extract::JsonBody;
