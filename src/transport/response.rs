//! Upload-pack response: shallow updates, acknowledgements, then the packfile

use crate::artifacts::objects::object_id::ObjectId;
use crate::transport::TransportError;
use crate::transport::pkt_line::{PktLine, read_pkt_line};
use bytes::{Bytes, BytesMut};

const PACK_DATA_BAND: u8 = 1;
const PROGRESS_BAND: u8 = 2;
const ERROR_BAND: u8 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPackResponse {
    pub shallow: Vec<ObjectId>,
    pub unshallow: Vec<ObjectId>,
    pub acks: Vec<String>,
    pub pack: Bytes,
}

impl UploadPackResponse {
    pub fn parse(mut body: Bytes, side_band: bool) -> Result<Self, TransportError> {
        let mut response = UploadPackResponse::default();

        loop {
            if body.starts_with(b"PACK") {
                response.pack = body;
                return Ok(response);
            }

            let Some(line) = read_pkt_line(&mut body)? else {
                return Err(TransportError::Protocol(
                    "upload-pack response ended before the packfile".to_string(),
                ));
            };
            let Some(text) = line.as_text() else {
                continue;
            };

            if let Some(oid) = text.strip_prefix("shallow ") {
                response.shallow.push(parse_oid(oid)?);
            } else if let Some(oid) = text.strip_prefix("unshallow ") {
                response.unshallow.push(parse_oid(oid)?);
            } else if let Some(message) = text.strip_prefix("ERR ") {
                return Err(TransportError::Remote(message.to_string()));
            } else if text == "NAK" || text.starts_with("ACK ") {
                response.acks.push(text.to_string());
                break;
            } else {
                tracing::warn!(line = text, "unexpected upload-pack line");
            }
        }

        response.pack = if side_band && !body.starts_with(b"PACK") {
            demultiplex(body)?
        } else {
            body
        };

        Ok(response)
    }
}

fn parse_oid(oid: &str) -> Result<ObjectId, TransportError> {
    ObjectId::try_parse(oid.trim().to_string())
        .map_err(|_| TransportError::Protocol(format!("invalid object id {oid:?}")))
}

/// Join band 1 of a side-band stream, logging band 2 and failing on band 3
pub fn demultiplex(mut body: Bytes) -> Result<Bytes, TransportError> {
    let mut pack = BytesMut::new();

    while let Some(line) = read_pkt_line(&mut body)? {
        let PktLine::Data(data) = line else {
            continue;
        };
        let Some((&band, payload)) = data.split_first() else {
            continue;
        };

        match band {
            PACK_DATA_BAND => pack.extend_from_slice(payload),
            PROGRESS_BAND => {
                for message in String::from_utf8_lossy(payload)
                    .split(['\r', '\n'])
                    .filter(|message| !message.trim().is_empty())
                {
                    tracing::info!(target: "moonwalk::remote", "{}", message.trim());
                }
            }
            ERROR_BAND => {
                return Err(TransportError::Remote(
                    String::from_utf8_lossy(payload).trim().to_string(),
                ));
            }
            other => {
                return Err(TransportError::Protocol(format!(
                    "unknown side-band channel {other}"
                )));
            }
        }
    }

    Ok(pack.freeze())
}
