//! `kiln key`: the identity extensions use to verify requests.

use anyhow::Result;
use clap::Subcommand;
use kiln_protocol::defaults::SIGNATURE_KEY_ID;
use kiln_store::RequestContext;

use super::context::GlobalArgs;

#[derive(Subcommand, Debug, Clone)]
pub enum KeyAction {
    /// Print the PEM-encoded public key
    Public,
    /// Print the key id and public key fingerprint
    Fingerprint,
}

pub async fn run(ctx: &RequestContext, global: &GlobalArgs, action: KeyAction) -> Result<()> {
    let services = global.services(ctx).await?;
    let keys = services.keys();
    match action {
        KeyAction::Public => print!("{}", keys.public_key_pem()?),
        KeyAction::Fingerprint => println!("{}  {}", SIGNATURE_KEY_ID, keys.fingerprint()),
    }
    Ok(())
}
