//! kodegen_devtool - run CI devtools natively or in version-pinned containers.
//!
//! The process exit code is the tool's own exit code when it ran, 127 when
//! it could not be started, and 1 for every other failure.

use kodegen_devtool::cli;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = cli::run().await {
        log::error!("{}", e);

        let suggestions = e.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("\nRecovery suggestions:");
            for suggestion in suggestions {
                eprintln!("  • {}", suggestion);
            }
        }

        process::exit(e.exit_code());
    }
}
