use pcsx2ipc_frame::{Command, EmuStatus};
use pcsx2ipc_session::{Batch, Connection, IpcError};
use serde::Serialize;

use crate::cmd::{InfoArgs, TargetArgs};
use crate::exit::{ipc_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    endpoint: String,
    emulator_version: String,
    status: &'static str,
    title: Option<String>,
    game_id: Option<String>,
    game_uuid: Option<String>,
    game_version: Option<String>,
}

pub fn run(_args: InfoArgs, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut conn = target.connect()?;

    // Version and status always succeed, so they share one round trip.
    let mut batch = Batch::new(conn.config().limits);
    let version = batch
        .push(Command::Version)
        .map_err(|err| ipc_error("batch rejected", err))?;
    let status = batch
        .push(Command::Status)
        .map_err(|err| ipc_error("batch rejected", err))?;
    let replies = conn
        .send_batch(&batch)
        .map_err(|err| ipc_error("info query failed", err))?;

    let emulator_version = replies.text(version).unwrap_or_default().to_string();
    let status = replies
        .get(status)
        .and_then(|reply| reply.as_status())
        .unwrap_or(EmuStatus::Shutdown);

    let out = InfoOutput {
        endpoint: conn.config().endpoint.to_string(),
        emulator_version,
        status: status.name(),
        title: game_field(&mut conn, Connection::title)?,
        game_id: game_field(&mut conn, Connection::game_id)?,
        game_uuid: game_field(&mut conn, Connection::game_uuid)?,
        game_version: game_field(&mut conn, Connection::game_version)?,
    };

    let shown = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    let fields = [
        ("Endpoint", out.endpoint.clone()),
        ("Emulator", out.emulator_version.clone()),
        ("Status", out.status.to_string()),
        ("Title", shown(&out.title)),
        ("Game ID", shown(&out.game_id)),
        ("Game UUID", shown(&out.game_uuid)),
        ("Game version", shown(&out.game_version)),
    ];
    print_fields(&out, &fields, format);
    Ok(SUCCESS)
}

/// Game queries answer FAIL when nothing is running; report that as absent.
fn game_field(
    conn: &mut Connection,
    query: fn(&mut Connection) -> Result<String, IpcError>,
) -> CliResult<Option<String>> {
    match query(conn) {
        Ok(text) if text.is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(IpcError::Fail) => Ok(None),
        Err(err) => Err(ipc_error("info query failed", err)),
    }
}
