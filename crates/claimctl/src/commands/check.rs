//! Check command implementation.

use anyhow::Result;
use claimguard::{ActionKind, Coordinate, Identity, ProtectionService, Verdict};
use serde::Serialize;

use crate::OutputFormat;

#[derive(Serialize)]
struct CheckOutput {
    kind: ActionKind,
    coordinate: Coordinate,
    actor: Option<Identity>,
    verdict: Verdict,
}

pub async fn run(
    service: &ProtectionService,
    kind: ActionKind,
    coordinate: Coordinate,
    actor: Option<Identity>,
    format: OutputFormat,
) -> Result<()> {
    let verdict = service.guard.authorize(kind, coordinate, actor).await;

    match format {
        OutputFormat::Text => match verdict {
            Verdict::Allowed => println!("Allowed: {} at {}", kind.label(), coordinate),
            Verdict::Blocked { owner } => {
                println!("Blocked: {} at {} is claimed by {}", kind.label(), coordinate, owner);
            }
            Verdict::Unavailable => {
                println!("Denied: {} at {} (storage unavailable)", kind.label(), coordinate);
            }
        },
        OutputFormat::Json => {
            let output = CheckOutput {
                kind,
                coordinate,
                actor,
                verdict,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
