pub mod app;
pub mod cli;
pub mod error;
pub mod input;

pub use app::run;
pub use cli::Cli;
pub use error::CliError;
