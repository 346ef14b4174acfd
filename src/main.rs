// src/main.rs

use std::process::ExitCode;

use bakedag::{Outcome, cli, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    match run(args).await {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::TasksFailed) => ExitCode::from(2),
        Err(err) => {
            eprintln!("bakedag error: {err:?}");
            ExitCode::from(1)
        }
    }
}
