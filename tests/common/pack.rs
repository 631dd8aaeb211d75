use flate2::Compression;
use flate2::write::ZlibEncoder;
use moonwalk::areas::repository::Repository;
use moonwalk::artifacts::objects::object::Object;
use moonwalk::artifacts::objects::object_type::ObjectType;
use sha1::{Digest, Sha1};
use std::io::Write;

fn type_code(object_type: ObjectType) -> u8 {
    match object_type {
        ObjectType::Commit => 1,
        ObjectType::Tree => 2,
        ObjectType::Blob => 3,
        ObjectType::Tag => 4,
    }
}

fn entry_header(type_code: u8, size: usize) -> Vec<u8> {
    let mut header = Vec::new();
    let mut byte = (type_code << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest > 0 {
        header.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    header.push(byte);
    header
}

/// Version 2 packfile holding every object of `repository`, undeltified
pub fn pack_repository(repository: &Repository) -> Vec<u8> {
    let database = repository.database();
    let oids = database
        .find_objects_by_prefix("")
        .expect("Failed to list objects");

    let mut pack = Vec::new();
    pack.extend_from_slice(b"PACK");
    pack.extend_from_slice(&2u32.to_be_bytes());
    pack.extend_from_slice(&(oids.len() as u32).to_be_bytes());

    for oid in &oids {
        let object = database.load_raw(oid).expect("Failed to load object");
        pack.extend(entry_header(type_code(object.object_type()), object.content().len()));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(object.content()).expect("Failed to deflate");
        pack.extend(encoder.finish().expect("Failed to deflate"));
    }

    let checksum = Sha1::digest(&pack);
    pack.extend_from_slice(&checksum);
    pack
}
