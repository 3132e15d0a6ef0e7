use core::error::Error;
use std::str::from_utf8;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    received_signal_command::ReceivedSignalCommand, signal_event_id::SignalEventId,
    signal_payload_type::SignalPayloadType,
};

// Upper bound for a single frame payload; SDP bodies stay well under this.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum SignalCommand {
    Simple(SignalEventId),
    String(SignalEventId, String),
    Json(SignalEventId, Value),
}

impl SignalCommand {
    pub fn event_id(&self) -> SignalEventId {
        match self {
            SignalCommand::Simple(id) => *id,
            SignalCommand::String(id, _) => *id,
            SignalCommand::Json(id, _) => *id,
        }
    }

    pub async fn write_to_stream<W>(
        &self,
        stream: &mut W,
    ) -> Result<(), Box<dyn Error + Send + Sync>>
    where
        W: AsyncWrite + Unpin,
    {
        match &self {
            SignalCommand::Simple(id) => {
                stream.write_all(&[id.to_byte()]).await?;
            }
            SignalCommand::String(id, payload) => {
                Self::write_frame(stream, *id, payload.as_bytes()).await?;
            }
            SignalCommand::Json(id, payload) => {
                let payload = serde_json::to_vec(payload)?;
                Self::write_frame(stream, *id, &payload).await?;
            }
        }

        Ok(())
    }

    async fn write_frame<W>(
        stream: &mut W,
        id: SignalEventId,
        payload: &[u8],
    ) -> Result<(), Box<dyn Error + Send + Sync>>
    where
        W: AsyncWrite + Unpin,
    {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err("Payload too large".into());
        }

        let mut bytes = vec![id.to_byte()];
        bytes.extend((payload.len() as u32).to_be_bytes());
        bytes.extend(payload);

        stream.write_all(&bytes).await?;

        Ok(())
    }

    pub async fn read_from_stream<R>(
        stream: &mut R,
    ) -> Result<ReceivedSignalCommand, Box<dyn Error + Send + Sync>>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0; 1];

        let first_byte = match stream.read(&mut buf).await {
            Ok(0) => return Ok(ReceivedSignalCommand::EOF),
            Ok(_) => buf[0],
            Err(e) => return Err(e.into()),
        };

        let event_id = SignalEventId::from_byte(first_byte)?;

        match event_id.get_payload_type() {
            SignalPayloadType::Simple => Ok(ReceivedSignalCommand::Command(SignalCommand::Simple(
                event_id,
            ))),
            SignalPayloadType::String => {
                let payload_buf = Self::read_frame_payload(stream).await?;
                let payload = from_utf8(&payload_buf)?.to_string();

                Ok(ReceivedSignalCommand::Command(SignalCommand::String(
                    event_id, payload,
                )))
            }
            SignalPayloadType::Json => {
                let payload_buf = Self::read_frame_payload(stream).await?;
                let payload = serde_json::from_slice(&payload_buf)?;

                Ok(ReceivedSignalCommand::Command(SignalCommand::Json(
                    event_id, payload,
                )))
            }
        }
    }

    async fn read_frame_payload<R>(stream: &mut R) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>
    where
        R: AsyncRead + Unpin,
    {
        let mut payload_len_buf = [0; 4];
        stream.read_exact(&mut payload_len_buf).await?;
        let payload_len = u32::from_be_bytes(payload_len_buf) as usize;

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err("Incoming payload too large".into());
        }

        let mut payload_buf = vec![0; payload_len];
        stream.read_exact(&mut payload_buf).await?;

        Ok(payload_buf)
    }
}
