//! Ref advertisement returned by `GET <url>/info/refs?service=git-upload-pack`

use crate::artifacts::branch::branch_name::is_valid_ref_name;
use crate::artifacts::objects::object_id::ObjectId;
use crate::transport::TransportError;
use crate::transport::capabilities::Capabilities;
use crate::transport::pkt_line::{PktLine, read_pkt_line};
use bytes::Bytes;

const PEELED_SUFFIX: &str = "^{}";
const EMPTY_REPOSITORY_REF: &str = "capabilities^{}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub name: String,
    pub oid: ObjectId,
    /// Commit an annotated tag points at, from the `<tag>^{}` line
    pub peeled: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefAdvertisement {
    pub refs: Vec<AdvertisedRef>,
    pub capabilities: Vec<String>,
}

impl RefAdvertisement {
    pub fn parse(mut body: Bytes) -> Result<Self, TransportError> {
        let mut advertisement = RefAdvertisement::default();
        let mut first_ref = true;

        while let Some(line) = read_pkt_line(&mut body)? {
            let PktLine::Data(data) = line else {
                continue;
            };
            let text = String::from_utf8(data.to_vec()).map_err(|_| {
                TransportError::Protocol("ref advertisement is not valid UTF-8".to_string())
            })?;
            let text = text.trim_end_matches('\n');

            if text.starts_with("# service=") {
                tracing::debug!(header = text, "ref advertisement");
                continue;
            }
            if let Some(message) = text.strip_prefix("ERR ") {
                return Err(TransportError::Remote(message.to_string()));
            }

            let (reference, capabilities) = match text.split_once('\0') {
                Some((reference, capabilities)) => (reference, Some(capabilities)),
                None => (text, None),
            };
            if first_ref {
                if let Some(capabilities) = capabilities {
                    advertisement.capabilities = capabilities
                        .split(' ')
                        .filter(|capability| !capability.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                first_ref = false;
            }

            let (oid, name) = reference.split_once(' ').ok_or_else(|| {
                TransportError::Protocol(format!("malformed ref line {reference:?}"))
            })?;
            let oid = ObjectId::try_parse(oid.to_string())
                .map_err(|_| TransportError::Protocol(format!("invalid object id {oid:?}")))?;

            if name == EMPTY_REPOSITORY_REF {
                continue;
            }
            if !is_valid_ref_name(name.strip_suffix(PEELED_SUFFIX).unwrap_or(name)) {
                return Err(TransportError::Protocol(format!("invalid ref name {name:?}")));
            }
            if let Some(tag) = name.strip_suffix(PEELED_SUFFIX) {
                if let Some(target) = advertisement.refs.iter_mut().find(|r| r.name == tag) {
                    target.peeled = Some(oid);
                }
                continue;
            }

            advertisement.refs.push(AdvertisedRef {
                name: name.to_string(),
                oid,
                peeled: None,
            });
        }

        Ok(advertisement)
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn offered(&self) -> Capabilities {
        Capabilities::from_advertised(self.capabilities.as_slice())
    }

    /// Target of the remote `HEAD` from `symref=HEAD:<target>`
    pub fn head_symref(&self) -> Option<&str> {
        self.capabilities
            .iter()
            .filter_map(|capability| capability.strip_prefix("symref="))
            .find_map(|symref| symref.strip_prefix("HEAD:"))
    }

    pub fn find(&self, name: &str) -> Option<&AdvertisedRef> {
        self.refs.iter().find(|reference| reference.name == name)
    }

    pub fn head(&self) -> Option<&AdvertisedRef> {
        self.find("HEAD")
    }

    pub fn branches(&self) -> impl Iterator<Item = &AdvertisedRef> {
        self.refs
            .iter()
            .filter(|reference| reference.name.starts_with("refs/heads/"))
    }

    pub fn tags(&self) -> impl Iterator<Item = &AdvertisedRef> {
        self.refs
            .iter()
            .filter(|reference| reference.name.starts_with("refs/tags/"))
    }
}
