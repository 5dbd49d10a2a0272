//! Configuration commands.

use clap::Subcommand;
use tradeseal_types::Result;

use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file merged over defaults).
    Show,
}

pub fn run(action: ConfigAction, opts: &GlobalOpts) -> Result<()> {
    match action {
        ConfigAction::Show => {
            output::print_value(&opts.config, opts.json);
            Ok(())
        }
    }
}
