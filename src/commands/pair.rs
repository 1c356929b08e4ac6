//! Pair command - request, accept, reject and list pairings.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use stegdrop::{Config, PairingId, UserId};

use super::{open_postbox, CommandExecutor};

/// Manage pairings. Messages can only be sent between paired users.
#[derive(Args, Debug)]
pub struct PairCommand {
    #[command(subcommand)]
    pub action: PairAction,
}

#[derive(Subcommand, Debug)]
pub enum PairAction {
    /// Ask another user to pair under a secret code
    Request(PairRequestArgs),

    /// Accept a pending request by entering the same secret code
    Accept(PairAcceptArgs),

    /// Decline a pending request
    Reject(PairRejectArgs),

    /// List partners and pending requests
    List(PairListArgs),
}

#[derive(Args, Debug)]
pub struct PairRequestArgs {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,

    /// User to pair with
    #[arg(long = "with")]
    pub partner: String,

    /// Secret code the other user must confirm
    #[arg(long)]
    pub code: String,
}

#[derive(Args, Debug)]
pub struct PairAcceptArgs {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,

    /// Pairing id from the request
    #[arg(long)]
    pub id: String,

    /// The secret code agreed with the requester
    #[arg(long)]
    pub code: String,
}

#[derive(Args, Debug)]
pub struct PairRejectArgs {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,

    /// Pairing id from the request
    #[arg(long)]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct PairListArgs {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,
}

impl CommandExecutor for PairCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let postbox = open_postbox(config)?;

        match &self.action {
            PairAction::Request(args) => {
                let pairing = postbox
                    .request_pairing(&UserId::new(&args.user), &UserId::new(&args.partner), &args.code)
                    .context("Pairing request failed")?;
                println!("Pairing requested with {}.", pairing.recipient);
                println!("  Pairing id: {}", pairing.id);
                println!();
                println!("Share the id; they accept with the same secret code.");
            }
            PairAction::Accept(args) => {
                let pairing = postbox
                    .accept_pairing(&PairingId::new(args.id.as_str()), &UserId::new(&args.user), &args.code)
                    .context("Pairing acceptance failed")?;
                println!("Paired with {}.", pairing.requester);
            }
            PairAction::Reject(args) => {
                postbox
                    .reject_pairing(&PairingId::new(args.id.as_str()), &UserId::new(&args.user))
                    .context("Pairing rejection failed")?;
                println!("Pairing request {} rejected.", args.id);
            }
            PairAction::List(args) => {
                let user = UserId::new(&args.user);
                let partners = postbox.partners(&user)?;
                let requests = postbox.incoming_requests(&user)?;

                if partners.is_empty() {
                    println!("No partners yet.");
                } else {
                    println!("Partners:");
                    for partner in &partners {
                        println!("  {}", partner);
                    }
                }

                if !requests.is_empty() {
                    println!();
                    println!("Pending requests:");
                    for request in &requests {
                        println!(
                            "  {}  from {}  ({})",
                            request.id,
                            request.requester,
                            request.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
