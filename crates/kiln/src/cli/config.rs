//! `kiln config`: the pipeline config Kiln would run, read from a checkout.

use anyhow::Result;
use clap::Args;
use kiln_protocol::{ConfigFile, Pipeline, Repo};
use kiln_store::RequestContext;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use kiln::CheckoutForge;

use super::context::{load_json, GlobalArgs};
use super::output::{print_json, print_table};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Repository as inline JSON or a path to a JSON file
    #[arg(long)]
    pub repo: String,

    /// Pipeline as inline JSON or a path to a JSON file
    #[arg(long)]
    pub pipeline: String,

    /// Working tree to read config files from
    #[arg(long, default_value = ".")]
    pub checkout: PathBuf,

    /// Output file names and contents as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ConfigView<'a> {
    name: &'a str,
    data: &'a str,
}

pub async fn run(ctx: &RequestContext, global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    let repo: Repo = load_json(&args.repo, "repo")?;
    let pipeline: Pipeline = load_json(&args.pipeline, "pipeline")?;

    let services = global.services(ctx).await?;
    let fetcher = services.config_fetcher(Arc::new(CheckoutForge::new(&args.checkout)));
    let configs: Vec<ConfigFile> = fetcher.fetch(ctx, &repo, &pipeline).await?;

    if args.json {
        let views: Vec<ConfigView> = configs
            .iter()
            .map(|c| ConfigView {
                name: &c.name,
                data: &c.data,
            })
            .collect();
        return print_json(&views);
    }
    print_table(
        &["FILE", "BYTES"],
        configs
            .iter()
            .map(|c| vec![c.name.clone(), c.data.len().to_string()])
            .collect(),
    );
    Ok(())
}
