use std::process::ExitCode;

fn main() -> ExitCode {
    gatekeep_cli::run()
}
