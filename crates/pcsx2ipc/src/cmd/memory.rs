use pcsx2ipc_session::Batch;

use crate::cmd::{usage, ReadArgs, TargetArgs, WriteArgs};
use crate::exit::{ipc_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

pub fn read(args: ReadArgs, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == 0 {
        return Err(usage("--count must be at least 1"));
    }
    let addresses = addresses(args.address, args.size.bytes(), args.count)?;
    let mut conn = target.connect()?;

    let values = if let &[address] = addresses.as_slice() {
        let value = conn
            .read(address, args.size)
            .map_err(|err| ipc_error("read failed", err))?;
        vec![(address, value)]
    } else {
        let mut batch = Batch::new(conn.config().limits);
        for &address in &addresses {
            batch
                .read(address, args.size)
                .map_err(|err| ipc_error("batch rejected", err))?;
        }
        let replies = conn
            .send_batch(&batch)
            .map_err(|err| ipc_error("read failed", err))?;
        addresses
            .iter()
            .zip(replies.iter())
            .filter_map(|(&address, reply)| reply.as_u64().map(|value| (address, value)))
            .collect()
    };

    print_values(&values, args.size, format);
    Ok(SUCCESS)
}

pub fn write(args: WriteArgs, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut conn = target.connect()?;
    conn.write(args.address, args.size, args.value)
        .map_err(|err| ipc_error("write failed", err))?;
    tracing::debug!(address = args.address, size = args.size.bits(), "write acknowledged");

    if args.verify {
        let value = conn
            .read(args.address, args.size)
            .map_err(|err| ipc_error("verify read failed", err))?;
        print_values(&[(args.address, value)], args.size, format);
    }
    Ok(SUCCESS)
}

/// Consecutive addresses `start, start + stride, ...`, rejecting wrap-around.
fn addresses(start: u32, stride: usize, count: u32) -> CliResult<Vec<u32>> {
    let stride = stride as u32;
    (0..count)
        .map(|i| {
            i.checked_mul(stride)
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| usage(format!("--count {count} runs past the end of the address space")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_addresses() {
        assert_eq!(addresses(0x100, 4, 3).unwrap(), vec![0x100, 0x104, 0x108]);
        assert_eq!(addresses(7, 1, 1).unwrap(), vec![7]);
        assert!(addresses(u32::MAX - 3, 4, 2).is_err());
    }
}
