use std::process::ExitCode;

use linux_sandbox::main as linux_sandbox_main;

fn main() -> ExitCode {
    linux_sandbox_main(std::env::args_os())
}
