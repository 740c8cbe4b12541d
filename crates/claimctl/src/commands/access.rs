//! Access grant commands.

use anyhow::{Context, Result};
use claimguard::{Identity, ProtectionService};
use serde::Serialize;

use crate::OutputFormat;

#[derive(Serialize)]
struct GrantOutput {
    grantor: Identity,
    grantee: Identity,
    changed: bool,
}

#[derive(Serialize)]
struct RevokeAllOutput {
    grantor: Identity,
    revoked: usize,
}

#[derive(Serialize)]
struct ListOutput {
    identity: Identity,
    direction: &'static str,
    identities: Vec<Identity>,
}

pub async fn allow(
    service: &ProtectionService,
    grantor: Identity,
    grantee: Identity,
    format: OutputFormat,
) -> Result<()> {
    let changed = service
        .access
        .grant(grantor, grantee)
        .await
        .context("grant failed")?;

    let output = GrantOutput {
        grantor,
        grantee,
        changed,
    };
    match format {
        OutputFormat::Text => {
            if changed {
                println!("{} may now act near {}'s claims", grantee, grantor);
            } else {
                println!("{} already had access from {}", grantee, grantor);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub async fn disallow(
    service: &ProtectionService,
    grantor: Identity,
    grantee: Option<Identity>,
    format: OutputFormat,
) -> Result<()> {
    let Some(grantee) = grantee else {
        let revoked = service
            .access
            .revoke_all(grantor)
            .await
            .context("revoke failed")?;

        match format {
            OutputFormat::Text => println!("Revoked {} grant(s) made by {}", revoked, grantor),
            OutputFormat::Json => {
                let output = RevokeAllOutput { grantor, revoked };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        return Ok(());
    };

    let changed = service
        .access
        .revoke(grantor, grantee)
        .await
        .context("revoke failed")?;

    let output = GrantOutput {
        grantor,
        grantee,
        changed,
    };
    match format {
        OutputFormat::Text => {
            if changed {
                println!("{} no longer has access from {}", grantee, grantor);
            } else {
                println!("{} had no access from {}", grantee, grantor);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

pub async fn list(
    service: &ProtectionService,
    identity: Identity,
    grantors: bool,
    format: OutputFormat,
) -> Result<()> {
    let (direction, identities) = if grantors {
        let found = service
            .access
            .list_grantors(identity)
            .await
            .context("failed to list grantors")?;
        ("grantors", found)
    } else {
        let found = service
            .access
            .list_grantees(identity)
            .await
            .context("failed to list grantees")?;
        ("grantees", found)
    };

    match format {
        OutputFormat::Text => {
            if identities.is_empty() {
                println!("No {} for {}", direction, identity);
            } else {
                println!("{} {}:", identity, direction);
                for other in &identities {
                    println!("  {}", other);
                }
            }
        }
        OutputFormat::Json => {
            let output = ListOutput {
                identity,
                direction,
                identities: identities.into_iter().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
