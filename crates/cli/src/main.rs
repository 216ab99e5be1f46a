use std::process::ExitCode;

fn main() -> ExitCode {
    tarif_cli::run()
}
