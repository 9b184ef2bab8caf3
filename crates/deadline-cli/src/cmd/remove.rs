//! `dl remove`: drop a group's deadline and its dedicated settings.

use anyhow::Result;
use clap::Args;
use deadline_core::unassign;

use super::RunContext;
use crate::output::{fail, render_success};

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Group (deck) name.
    pub group: String,
}

pub fn run_remove(args: &RemoveArgs, ctx: &RunContext) -> Result<()> {
    let registry = ctx.registry()?;
    let mut collection = ctx.open_collection()?;
    unassign(&registry, &mut collection, &ctx.profile, &args.group)
        .map_err(|err| fail(ctx.output, err))?;
    render_success(
        ctx.output,
        &format!("Removed deadline for {} ({})", args.group, ctx.profile),
    )
}
