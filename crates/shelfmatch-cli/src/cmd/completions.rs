use clap::Args;
use clap_complete::{Shell, generate};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for the completion script.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write a completion script for `shell` to stdout.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> anyhow::Result<()> {
    let name = command.get_name().to_string();
    generate(shell, command, name, &mut std::io::stdout());
    Ok(())
}
