pub mod artifact_port;
pub mod session_port;
