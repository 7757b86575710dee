use std::process::ExitCode;

mod application;
mod presentation {
    pub mod cli;
}

fn main() -> ExitCode {
    match application::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zpkdev: {e}");
            // malformed packages are distinguished from operational failures
            if e.is_package_format() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
