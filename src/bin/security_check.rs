//! Pre-write hook for agent file edits.
//!
//! Reads `{"tool_input": {"file_path", "content", "new_string"}}` on stdin.
//! Exits 2 to block writes to sensitive paths, 0 otherwise; warnings about
//! secret-like content go to stderr. Unreadable input is allowed.

use rag_evaluator::security::SecurityPolicy;
use std::io::Read;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        return ExitCode::SUCCESS;
    }

    let policy = match SecurityPolicy::new() {
        Ok(policy) => policy,
        Err(err) => {
            error!(error = %err, "security rules failed to load, allowing write");
            return ExitCode::SUCCESS;
        }
    };

    let decision = policy.check_json(&input);
    for line in decision.report_lines() {
        eprintln!("{}", line);
    }

    ExitCode::from(decision.exit_code() as u8)
}
