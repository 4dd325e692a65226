use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use gitpub::tracking::TrackingBranch;

use super::Context;

/// Handle `add`
/// Map documents for publishing, with optional adapter attributes
pub fn add<W: Write>(
    ctx: &Context,
    paths: &[PathBuf],
    docargs: &[(String, String)],
    output: &mut W,
) -> Result<()> {
    let paths = relative_all(ctx, paths)?;
    let attrs: BTreeMap<String, String> = docargs.iter().cloned().collect();

    let mut tb = TrackingBranch::current(&ctx.vcs, &ctx.config)?;
    for path in &paths {
        tb.add(path, attrs.clone())?;
        writeln!(output, "add {}", path)?;
    }
    tb.save_stage()?;
    Ok(())
}

/// Handle `rm`
/// Unmap documents so the next push deletes them from the remote
pub fn rm<W: Write>(ctx: &Context, paths: &[PathBuf], output: &mut W) -> Result<()> {
    let paths = relative_all(ctx, paths)?;

    let mut tb = TrackingBranch::current(&ctx.vcs, &ctx.config)?;
    for path in &paths {
        tb.rm(path)?;
        writeln!(output, "rm {}", path)?;
    }
    tb.save_stage()?;
    Ok(())
}

/// Handle `mv`
/// Rename documents, keeping them published under the same remote id.
/// With several sources the destination must be a directory.
pub fn mv<W: Write>(ctx: &Context, sources: &[PathBuf], dest: &Path, output: &mut W) -> Result<()> {
    let into_dir = sources.len() > 1 || dest.is_dir();
    let mut moves = Vec::new();
    for source in sources {
        let target = if into_dir {
            let file_name = source
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("cannot move {:?}", source))?;
            dest.join(file_name)
        } else {
            dest.to_path_buf()
        };
        moves.push((ctx.relative(source)?, ctx.relative(&target)?));
    }

    let mut tb = TrackingBranch::current(&ctx.vcs, &ctx.config)?;
    for (old, new) in &moves {
        tb.mv(old, new)?;
        writeln!(output, "mv {} -> {}", old, new)?;
    }
    tb.save_stage()?;
    Ok(())
}

fn relative_all(ctx: &Context, paths: &[PathBuf]) -> Result<Vec<String>> {
    paths.iter().map(|path| ctx.relative(path)).collect()
}
