pub mod chat;
pub mod config_cmd;
pub mod inspect;
pub mod parse;
