use super::{TaskContext, TaskEntry, TaskError};
use crate::invocation::Invocation;

fn tree_invocation(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<Invocation, TaskError> {
    let depth = ctx.options.depth.unwrap_or(ctx.settings.tree_depth);
    let mut invocation = ctx.invocation(entry)?.current_dir(&ctx.cwd);
    if depth > 0 {
        invocation = invocation.args(["-L".to_string(), depth.to_string()]);
    }
    Ok(invocation.args(extra_args.iter().cloned()))
}

/// Print the tree of the working directory; a depth of 0 lists everything.
pub(super) fn tree(
    ctx: &TaskContext,
    entry: &TaskEntry,
    extra_args: &[String],
) -> Result<i32, TaskError> {
    Ok(tree_invocation(ctx, entry, extra_args)?.run(false)?.exit_code)
}
