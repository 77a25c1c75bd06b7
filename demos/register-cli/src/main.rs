//! Terminal walkthrough of one verification session.
//!
//! Usage:
//!
//! ```text
//! register-cli <personal-number> <mobile-number> [backend-url]
//! ```
//!
//! Starts a session against the backend (default `http://localhost:5000`),
//! prints the rotating QR payload and the countdown, and reports the
//! terminal outcome. Ctrl-C cancels the session cleanly before exiting.

use tracing::info;
use tracing_subscriber::EnvFilter;

use veriflow::{spawn_orchestrator, HttpGateway, SessionConfig, SessionStatus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(personal_number), Some(mobile_number)) = (args.next(), args.next()) else {
        eprintln!("usage: register-cli <personal-number> <mobile-number> [backend-url]");
        std::process::exit(2);
    };
    let base_url = args
        .next()
        .unwrap_or_else(|| "http://localhost:5000".to_string());

    let config = SessionConfig::default();
    let gateway = HttpGateway::with_timeout(&base_url, config.request_timeout)?;
    let handle = spawn_orchestrator(gateway, config);

    let session_ref = handle.start(personal_number, mobile_number).await?;
    info!(%session_ref, "session started, waiting for the authenticator app");

    let mut view = handle.watch();
    let outcome = loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break handle.view();
                }
                let snapshot = view.borrow().clone();
                match snapshot.status {
                    SessionStatus::AwaitingScan => {
                        if let Some(challenge) = &snapshot.challenge {
                            let remaining = snapshot.seconds_remaining().unwrap_or(0);
                            println!("scan: {}  ({remaining}s left)", challenge.payload);
                        }
                    }
                    status if status.is_terminal() => break snapshot,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, cancelling session");
                handle.cancel().await?;
                break handle.view();
            }
        }
    };

    match outcome.status {
        SessionStatus::Completed => {
            let identity = outcome.identity.ok_or("completed without identity data")?;
            println!("verified: {} ({})", identity.name, identity.personal_number);
            println!("address:  {}, {}", identity.address, identity.city);
            Ok(())
        }
        status => {
            if let Some(error) = outcome.last_error {
                eprintln!("session ended: {status} ({error})");
            } else {
                eprintln!("session ended: {status}");
            }
            std::process::exit(1);
        }
    }
}
