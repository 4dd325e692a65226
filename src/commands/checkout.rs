use std::io::Write;

use anyhow::Result;
use gitpub::{vcs, vcs::VersionControl, Error};

use super::Context;

/// Handle `checkout`
/// Switch to the tracking branch of `remote`
pub fn handle<W: Write>(
    ctx: &Context,
    remote: &str,
    branch: Option<&str>,
    output: &mut W,
) -> Result<()> {
    let branch = branch.unwrap_or(&ctx.config.default_branch);
    let name = vcs::tracking_branch_name(remote, branch);
    if !ctx.vcs.branch_exists(&name)? {
        return Err(Error::NoSuchRemoteBranch { branch: name }.into());
    }

    ctx.vcs.checkout(&name)?;
    writeln!(output, "Switched to {}", name)?;
    Ok(())
}
