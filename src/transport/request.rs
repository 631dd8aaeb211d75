use crate::artifacts::objects::object_id::ObjectId;
use crate::transport::capabilities::Capabilities;
use crate::transport::pkt_line::{write_flush, write_pkt_text};
use bytes::{Bytes, BytesMut};

/// Body of a `POST <url>/git-upload-pack` for a clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPackRequest {
    pub wants: Vec<ObjectId>,
    pub depth: Option<usize>,
    pub capabilities: Capabilities,
    pub agent: String,
}

impl UploadPackRequest {
    /// `want` lines (capabilities on the first), an optional `deepen`, a flush and `done`
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::new();

        let mut wants = self.wants.iter();
        if let Some(first) = wants.next() {
            let agent = format!("agent={}", self.agent);
            let mut capabilities: Vec<&str> = self.capabilities.names();
            capabilities.push(&agent);
            write_pkt_text(
                &mut buffer,
                &format!("want {first} {}\n", capabilities.join(" ")),
            );
        }
        for want in wants {
            write_pkt_text(&mut buffer, &format!("want {want}\n"));
        }

        if let Some(depth) = self.depth {
            write_pkt_text(&mut buffer, &format!("deepen {depth}\n"));
        }
        write_flush(&mut buffer);
        write_pkt_text(&mut buffer, "done\n");

        buffer.freeze()
    }
}
