use std::{collections::BTreeSet, io::Write};

use anyhow::{Context as _, Result};
use gitpub::{adapter::RemoteSpec, tracking::TrackingBranch, vcs, vcs::VersionControl};

use super::Context;

/// Handle `remote list`
/// Print each remote that has at least one tracking branch
pub fn list<W: Write>(ctx: &Context, output: &mut W) -> Result<()> {
    let remotes: BTreeSet<String> = ctx
        .vcs
        .list_branches()?
        .iter()
        .filter_map(|branch| vcs::parse_tracking_branch(branch))
        .map(|(remote, _)| remote.to_string())
        .collect();

    for remote in remotes {
        writeln!(output, "{}", remote)?;
    }
    Ok(())
}

/// Handle `remote add`
/// Create and initialize the tracking branch for a new remote
pub fn add<W: Write>(
    ctx: &Context,
    name: &str,
    spec: &str,
    branch: Option<&str>,
    fetch: bool,
    output: &mut W,
) -> Result<()> {
    let spec = RemoteSpec::parse(spec, &ctx.config.user())?;

    let branch = match branch {
        Some(branch) => branch.to_string(),
        None => ctx.vcs.current_branch()?,
    };
    if vcs::parse_tracking_branch(&branch).is_some() {
        anyhow::bail!(
            "cannot add a remote from tracking branch {}; check out a local branch or pass --branch",
            branch
        );
    }

    let mut tb = TrackingBranch::create(&ctx.vcs, &ctx.config, name, &branch, spec)
        .with_context(|| format!("Failed to add remote {}", name))?;
    writeln!(output, "Added remote {} on branch {}", name, tb.branch())?;

    if fetch {
        tb.fetch()
            .with_context(|| format!("Failed to fetch from remote {}", name))?;
        writeln!(output, "Fetched {}", name)?;
    }
    Ok(())
}
