use std::io::Write;

use anyhow::Result;
use gitpub::binding::StatusReport;

use super::Context;

/// Handle `status`
pub fn handle<W: Write>(
    ctx: &Context,
    remote: Option<&str>,
    branch: Option<&str>,
    json: bool,
    output: &mut W,
) -> Result<()> {
    let report = ctx.with_tracking_branch(remote, branch, |tb| tb.binding_mut().status())?;

    if json {
        serde_json::to_writer_pretty(&mut *output, &report)?;
        writeln!(output)?;
    } else {
        write_text(&report, output)?;
    }
    Ok(())
}

fn write_text<W: Write>(report: &StatusReport, output: &mut W) -> Result<()> {
    writeln!(output, "remote {} ({})", report.remote, report.adapter)?;
    if report.is_clean() {
        writeln!(output, "nothing to push")?;
        return Ok(());
    }

    let sections = [
        ("new", &report.added),
        ("modified", &report.changed),
        ("deleted", &report.removed),
        ("missing on remote", &report.missing_on_remote),
    ];
    for (label, entries) in sections {
        for entry in entries {
            writeln!(output, "  {:>18}: {}", label, entry)?;
        }
    }
    Ok(())
}
