use std::process::ExitCode;

fn main() -> ExitCode {
    match ddi_audit_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
