//! `kiln resolve`: the credentials a pipeline would receive.

use anyhow::Result;
use clap::{Args, Subcommand};
use kiln_protocol::{Credential, Pipeline, Repo};
use kiln_store::RequestContext;

use super::context::{load_json, GlobalArgs};
use super::output::{credential_rows, print_credentials, print_json};

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Repository as inline JSON or a path to a JSON file
    #[arg(long)]
    pub repo: String,

    /// Pipeline as inline JSON or a path to a JSON file
    #[arg(long)]
    pub pipeline: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TargetArgs {
    fn load(&self) -> Result<(Repo, Pipeline)> {
        Ok((
            load_json(&self.repo, "repo")?,
            load_json(&self.pipeline, "pipeline")?,
        ))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ResolveKind {
    /// Secrets visible to the pipeline
    Secrets {
        #[command(flatten)]
        target: TargetArgs,

        /// Only secrets a step running this image may receive
        #[arg(long)]
        image: Option<String>,
    },
    /// Registry logins visible to the pipeline
    Registries(TargetArgs),
}

pub async fn run(ctx: &RequestContext, global: &GlobalArgs, kind: ResolveKind) -> Result<()> {
    let services = global.services(ctx).await?;
    match kind {
        ResolveKind::Secrets { target, image } => {
            let (repo, pipeline) = target.load()?;
            let mut secrets = services
                .secrets()
                .list_for_pipeline(ctx, &repo, &pipeline)
                .await?;
            if let Some(image) = &image {
                secrets.retain(|s| s.allows(pipeline.event, image));
            }
            render(&secrets, &target, &repo, &pipeline)
        }
        ResolveKind::Registries(target) => {
            let (repo, pipeline) = target.load()?;
            let registries = services
                .registries()
                .list_for_pipeline(ctx, &repo, &pipeline)
                .await?;
            render(&registries, &target, &repo, &pipeline)
        }
    }
}

fn render<T: Credential>(items: &[T], target: &TargetArgs, repo: &Repo, pipeline: &Pipeline) -> Result<()> {
    let rows = credential_rows(items);
    if target.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No {} for {} #{}", T::KIND.plural(), repo.full_name, pipeline.number);
        return Ok(());
    }
    print_credentials(&rows);
    Ok(())
}
