// src/main.rs

use runtask::engine::RunResult;
use runtask::errors::Result;
use runtask::{cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(result) => {
            if let Some(container) = &result.failed_container {
                eprintln!("runtask: container {container} exited with {}", result.exit_code);
            }
            result.exit_code
        }
        Err(err) => {
            eprintln!("runtask error: {err}");
            if err.is_config() {
                eprintln!("runtask: no job was submitted");
            }
            err.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run_main() -> Result<RunResult> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
