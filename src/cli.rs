mod cli_model;
mod config;
mod model_type;
mod region;

pub use config::Config;
pub use model_type::ModelType;

use crate::log_utils::init_log;

pub fn handle_cli() -> anyhow::Result<Config> {
    let m = cli_model::cli_model().get_matches();
    init_log(&m)?;
    Config::from_matches(&m)
}
