use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use recurl::{CurlInterpreter, ExitStatus};

/// Execute a curl command string with curl-equivalent semantics.
#[derive(Parser, Debug)]
#[command(name = "recurl", version, about)]
struct Cli {
    /// Log filter (e.g. `debug`, `recurl=trace`)
    #[arg(long, env = "RECURL_LOG", default_value = "warn")]
    log: String,

    /// The command to interpret, with or without the leading `curl`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitStatus {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let interpreter = CurlInterpreter::new();

    // First Ctrl+C cancels the in-flight command so destructors run; a
    // second one forces exit.
    let cancel = interpreter.cancellation_token();
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(i32::from(ExitStatus::INTERRUPTED.0));
        }
        eprintln!("\nInterrupted");
        cancel.cancel();
    })
    .ok();

    let command = cli.command.join(" ");
    match interpreter.execute(&command).await {
        Ok(result) => {
            if let Some(body) = &result.body {
                print!("{}", body);
            }
            if let Some(binary) = &result.binary_data {
                let mut stdout = std::io::stdout().lock();
                if stdout.write_all(binary).is_err() {
                    return ExitStatus(recurl::Error::WriteError {
                        path: "<stdout>".into(),
                        source: std::io::Error::other("stdout write failed"),
                    }
                    .curl_code());
                }
            }
            ExitStatus::SUCCESS
        }
        Err(err) => {
            if matches!(err.error, recurl::Error::Aborted) {
                return ExitStatus::INTERRUPTED;
            }
            eprintln!("recurl: {}", err);
            ExitStatus::from_error(&err)
        }
    }
}
