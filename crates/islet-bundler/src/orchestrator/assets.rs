use rustc_hash::FxHashSet;
use rolldown_common::Output;

use crate::{Error, Result};

/// Output filename of a chunk or asset.
pub fn output_filename(output: &Output) -> &str {
    match output {
        Output::Chunk(chunk) => chunk.filename.as_str(),
        Output::Asset(asset) => asset.filename.as_str(),
    }
}

/// Fail if any of `inner` would overwrite an output already in `outer`.
pub fn check_collisions<'a>(
    outer: impl IntoIterator<Item = &'a Output>,
    inner: &[Output],
) -> Result<()> {
    let taken: FxHashSet<&str> = outer.into_iter().map(output_filename).collect();
    match inner
        .iter()
        .map(output_filename)
        .find(|filename| taken.contains(filename))
    {
        Some(clash) => Err(Error::AssetCollision {
            filename: clash.to_string(),
        }),
        None => Ok(()),
    }
}

/// Append the child compilation's outputs to the outer bundle.
///
/// Fails without modifying `outer` if any filename is claimed by both sides.
pub fn merge_assets(outer: &mut Vec<Output>, inner: Vec<Output>) -> Result<()> {
    check_collisions(outer.iter(), &inner)?;
    outer.extend(inner);
    Ok(())
}
