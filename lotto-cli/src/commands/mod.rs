pub mod bets;
pub mod serve;
pub mod submit;

pub use bets::{handle_bets_command, BetsCommands};
pub use serve::{handle_serve, ServeArgs};
pub use submit::{handle_submit, SubmitArgs};
