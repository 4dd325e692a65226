use std::io::Write;

use anyhow::Result;
use gitpub::{vcs, vcs::VersionControl, Error};

use super::Context;

/// Handle `commit`
/// Commit saved map changes on the current tracking branch; does not push
pub fn handle<W: Write>(ctx: &Context, message: &str, output: &mut W) -> Result<()> {
    let current = ctx.vcs.current_branch()?;
    if vcs::parse_tracking_branch(&current).is_none() {
        return Err(Error::NotOnTrackingBranch { current }.into());
    }
    if !ctx.vcs.has_staged_changes()? {
        return Err(Error::NothingStaged.into());
    }

    let commit = ctx.vcs.commit(message)?;
    writeln!(output, "[{}] {}", current, commit)?;
    Ok(())
}
