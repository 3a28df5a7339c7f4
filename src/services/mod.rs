mod user_store;
pub mod password;

pub use user_store::UserStore;
