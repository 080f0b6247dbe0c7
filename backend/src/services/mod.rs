pub mod session;
pub mod session_store;
pub mod session_sweep;
pub mod token;
pub mod users;
