#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

mod cli;
mod log_utils;
mod process;

fn main() -> anyhow::Result<()> {
    let cfg = cli::handle_cli()?;
    process::process_data(cfg)
}
