//! Clickrank gateway binary
//!
//! Runs the runtime against the in-memory score store and the local
//! identity provider.

use std::sync::Arc;

use clap::Parser;

use clickrank_gateway::{init_tracing, serve, GatewayArgs};
use clickrank_identity::LocalIdentityProvider;
use clickrank_runtime::Runtime;
use clickrank_store::MemoryScoreStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = GatewayArgs::parse();
    init_tracing(args.log_format)?;

    let verifier = match args.identity_key()? {
        Some(key) => LocalIdentityProvider::from_bytes(&key),
        None => {
            tracing::warn!("no identity key configured; credentials will not survive a restart");
            LocalIdentityProvider::generate()
        }
    };
    let store = MemoryScoreStore::new();

    let runtime = Runtime::start(Arc::new(verifier), Arc::new(store), args.coordinator_config()).await?;
    serve(Arc::new(runtime), &args).await
}
