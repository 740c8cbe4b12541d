//! Claim commands: place, remove, inspect.

use anyhow::{Context, Result};
use claimguard::{Claim, Coordinate, Identity, ProtectionService};
use serde::Serialize;

use crate::OutputFormat;

#[derive(Serialize)]
struct PlaceOutput {
    owner: Identity,
    coordinate: Coordinate,
    temporary: bool,
    promoted: usize,
}

#[derive(Serialize)]
struct RemoveOutput {
    center: Coordinate,
    radius: Option<i32>,
    removed: usize,
}

pub async fn place(
    service: &ProtectionService,
    owner: Identity,
    coordinate: Coordinate,
    format: OutputFormat,
) -> Result<()> {
    let placement = service
        .registry
        .record_placement(owner, coordinate)
        .await
        .context("failed to record placement")?;

    let output = PlaceOutput {
        owner,
        coordinate,
        temporary: placement.temporary,
        promoted: placement.promoted,
    };
    match format {
        OutputFormat::Text => {
            let state = if output.temporary { "temporary" } else { "permanent" };
            println!("Recorded {} claim at {} for {}", state, coordinate, owner);
            if output.promoted > 0 {
                println!("  Promoted {} nearby claim(s)", output.promoted);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub async fn remove(
    service: &ProtectionService,
    center: Coordinate,
    radius: Option<i32>,
    format: OutputFormat,
) -> Result<()> {
    let removed = match radius {
        None => usize::from(
            service
                .registry
                .remove_one(center)
                .await
                .context("failed to remove claim")?,
        ),
        Some(radius) => {
            let claims = service
                .registry
                .claims_within(center, radius)
                .await
                .context("failed to list claims")?;
            service
                .registry
                .remove_many(claims.into_iter().map(|claim| claim.coordinate))
                .await
                .context("failed to remove claims")?
        }
    };

    match format {
        OutputFormat::Text => println!("Removed {} claim(s) at {}", removed, center),
        OutputFormat::Json => {
            let output = RemoveOutput {
                center,
                radius,
                removed,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub async fn inspect(
    service: &ProtectionService,
    center: Coordinate,
    radius: i32,
    format: OutputFormat,
) -> Result<()> {
    let claims = service
        .registry
        .claims_within(center, radius)
        .await
        .context("failed to list claims")?;

    match format {
        OutputFormat::Text => print_claims(service, &claims, center, radius),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}

fn print_claims(service: &ProtectionService, claims: &[Claim], center: Coordinate, radius: i32) {
    if claims.is_empty() {
        println!("No claims within {} of {}", radius, center);
        return;
    }

    let now = claimguard::clock::now_millis();
    let window = service.registry.settings().protection_window_millis();

    println!("{:<44} {:<38} {:<10} {}", "COORDINATE", "OWNER", "STATE", "LAST MODIFIED");
    for claim in claims {
        let state = if claim.temporary {
            "temporary"
        } else if claim.is_active(now, window) {
            "active"
        } else {
            "expired"
        };
        println!(
            "{:<44} {:<38} {:<10} {}",
            claim.coordinate.to_string(),
            claim.owner,
            state,
            claim.last_modified
        );
    }
}
