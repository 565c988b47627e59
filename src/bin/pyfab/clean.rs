use std::io::IsTerminal;

use clap::Args;
use inquire::Confirm;
use log::info;

use pyfab::tasks::TaskContext;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Remove without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Ask before removing an existing virtual environment from an interactive terminal.
///
/// # Errors
///
/// Returns an error if the prompt cannot be shown or read.
pub fn confirm(ctx: &TaskContext, yes: bool) -> Result<bool, Box<dyn std::error::Error>> {
    if yes || !ctx.venv_exists() || !std::io::stdin().is_terminal() {
        return Ok(true);
    }

    let question = format!(
        "Remove virtual environment `{}`?",
        ctx.settings.env_name
    );
    let answer = Confirm::new(&question).with_default(false).prompt()?;
    if !answer {
        info!("Clean aborted.");
    }
    Ok(answer)
}
