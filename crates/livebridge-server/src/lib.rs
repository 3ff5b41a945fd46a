pub mod errors;
pub mod server;
pub mod session;

pub use errors::ServerError;
pub use server::{run_server, run_until, serve};
