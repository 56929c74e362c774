use std::process::ExitCode;

fn main() -> ExitCode {
    linker_cli::main_entry()
}
