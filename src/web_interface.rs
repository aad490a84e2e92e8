// Authentication relay module root
pub mod routes;
pub mod types;
pub mod verify_client;
pub mod web_server;

// Re-export commonly used items
pub use routes::*;
pub use web_server::*;
