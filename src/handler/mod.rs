pub mod support_handler;
pub mod ws_handler;
