//! Client-side registration exchanges with the hub.
//!
//! Each exchange is a one-shot connection: frame the record, write it,
//! optionally read the one-byte status reply, close.

use spoke_wire::{encode_frame, Endpoint, Opcode, Status, WireMessage};
use tracing::trace;

use crate::config::IO_TIMEOUT;
use crate::error::{Result, SpokeError};
use crate::transport::{read_full, write_full, Client, ClientFactory};

/// Register a record with the hub and wait for its verdict.
pub(crate) fn register<M: WireMessage>(
    factory: &ClientFactory,
    hub: &Endpoint,
    opcode: Opcode,
    record: &M,
) -> Result<()> {
    let client = factory();
    client
        .connect(hub)
        .map_err(|_| SpokeError::ConnectFailed(hub.to_string()))?;
    write_full(&*client, &encode_frame(opcode, record))?;

    let mut reply = [0u8; 1];
    read_full(&*client, &mut reply, IO_TIMEOUT)?;
    let status = Status::from_bytes(&reply)?;
    if !status.is_ok() {
        return Err(SpokeError::Rejected(status.error));
    }
    Ok(())
}

/// Deregister a record. Best effort: no reply is expected and failures
/// only surface in the trace log.
pub(crate) fn deregister<M: WireMessage>(
    factory: &ClientFactory,
    hub: &Endpoint,
    opcode: Opcode,
    record: &M,
) {
    let client = factory();
    if client.connect(hub).is_err() {
        trace!(%hub, ?opcode, "deregistration skipped: hub unreachable");
        return;
    }
    if let Err(e) = write_full(&*client, &encode_frame(opcode, record)) {
        trace!(%hub, ?opcode, error = %e, "deregistration write failed");
    }
}
