use crate::cmd::{StateArgs, TargetArgs};
use crate::exit::{ipc_error, CliResult, SUCCESS};

pub fn save(args: StateArgs, target: &TargetArgs) -> CliResult<i32> {
    let mut conn = target.connect()?;
    conn.save_state(args.slot)
        .map_err(|err| ipc_error(&format!("save to slot {} failed", args.slot), err))?;
    tracing::info!(slot = args.slot, "state saved");
    Ok(SUCCESS)
}

pub fn load(args: StateArgs, target: &TargetArgs) -> CliResult<i32> {
    let mut conn = target.connect()?;
    conn.load_state(args.slot)
        .map_err(|err| ipc_error(&format!("load from slot {} failed", args.slot), err))?;
    tracing::info!(slot = args.slot, "state loaded");
    Ok(SUCCESS)
}
