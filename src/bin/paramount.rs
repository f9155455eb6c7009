use std::process::ExitCode;

fn main() -> ExitCode {
    paramount::cli::run()
}
