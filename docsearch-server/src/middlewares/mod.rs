pub mod request_id;
pub mod server_time;

pub use request_id::request_id_middleware;
pub use server_time::ServerTimeLayer;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SERVER_TIME_HEADER: &str = "x-server-time";
