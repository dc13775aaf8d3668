use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use wisp::{Wisp, WispErrorKind};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let wisp = Wisp {};
    match wisp.execute(&args) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if matches!(e.source, WispErrorKind::InvalidArguments) {
                eprintln!("usage: wisp <script>");
                return ExitCode::from(1);
            }
            eprintln!("{:?}", anyhow::Error::from(e));
            ExitCode::from(65)
        }
    }
}
