use std::io::Write;

use anyhow::{Context as _, Result};
use gitpub::{binding::PushReport, tracking::TrackingBranch, vcs, vcs::VersionControl};

use super::Context;

/// Handle `push`
/// Publish map changes since the last push and commit the new snapshot
pub fn push<W: Write>(
    ctx: &Context,
    remote: Option<&str>,
    branch: Option<&str>,
    output: &mut W,
) -> Result<()> {
    let (name, report) = ctx
        .with_tracking_branch(remote, branch, |tb| {
            let report = tb.push()?;
            Ok((tb.branch().to_string(), report))
        })
        .context("Push failed")?;

    write_push_report(&name, &report, output)?;
    if !report.is_clean() {
        anyhow::bail!(
            "push to {} incomplete: {} failed, {} with unresolved references",
            name,
            report.failed.len(),
            report.unresolved.len()
        );
    }
    Ok(())
}

/// Handle `fetch`
/// Import remote changes onto the tracking branch
pub fn fetch<W: Write>(
    ctx: &Context,
    remote: Option<&str>,
    branch: Option<&str>,
    output: &mut W,
) -> Result<()> {
    let (name, commit) = ctx
        .with_tracking_branch(remote, branch, |tb| {
            let commit = tb.fetch()?;
            Ok((tb.branch().to_string(), commit))
        })
        .context("Fetch failed")?;

    match commit {
        Some(commit) => writeln!(output, "Fetched into {} ({})", name, commit)?,
        None => writeln!(output, "{} is up to date", name)?,
    }
    Ok(())
}

/// Handle `merge`
/// Merge a local branch into the current tracking branch and refresh the
/// content hashes of its mapped documents
pub fn merge<W: Write>(
    ctx: &Context,
    source: Option<&str>,
    update_only: bool,
    output: &mut W,
) -> Result<()> {
    let current = ctx.vcs.current_branch()?;
    let mut tb = TrackingBranch::current(&ctx.vcs, &ctx.config)?;

    let source = match source {
        Some(source) => source.to_string(),
        None => vcs::parse_tracking_branch(&current)
            .map(|(_, branch)| branch.to_string())
            .unwrap_or(current.clone()),
    };

    match tb
        .merge(&source, update_only)
        .with_context(|| format!("Failed to merge {} into {}", source, current))?
    {
        Some(commit) => writeln!(output, "Merged {} into {} ({})", source, current, commit)?,
        None => writeln!(output, "{} docmap already up to date", current)?,
    }
    Ok(())
}

fn write_push_report<W: Write>(branch: &str, report: &PushReport, output: &mut W) -> Result<()> {
    for path in &report.published {
        writeln!(output, "published {}", path)?;
    }
    for path in &report.updated {
        writeln!(output, "updated {}", path)?;
    }
    for remote_id in &report.deleted {
        writeln!(output, "deleted {}", remote_id)?;
    }
    for path in &report.unresolved {
        writeln!(output, "unresolved references in {}", path)?;
    }
    for (target, error) in &report.failed {
        writeln!(output, "failed {}: {}", target, error)?;
    }

    let total = report.published.len() + report.updated.len() + report.deleted.len();
    if total == 0 && report.failed.is_empty() {
        writeln!(output, "{}: nothing to push", branch)?;
    }
    Ok(())
}
