pub mod hardware;
pub mod logging;
