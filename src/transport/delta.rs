//! Git delta instructions
//!
//! A delta starts with the source and target sizes as little-endian base-128
//! varints, followed by instructions:
//!
//! - `1xxxxxxx`: copy from the source; the low four bits select offset bytes, the
//!   next three select size bytes; a size of zero means `0x10000`
//! - `0xxxxxxx`: insert the next `x` bytes literally (`x` must not be zero)

use crate::transport::TransportError;

const COPY_INSTRUCTION: u8 = 0x80;
const DEFAULT_COPY_SIZE: usize = 0x10000;

fn invalid(message: impl Into<String>) -> TransportError {
    TransportError::Delta(message.into())
}

fn read_size(delta: &[u8], position: &mut usize) -> Result<usize, TransportError> {
    let mut size = 0usize;
    let mut shift = 0;

    loop {
        let byte = *delta
            .get(*position)
            .ok_or_else(|| invalid("truncated size header"))?;
        *position += 1;

        if shift > 56 {
            return Err(invalid("size header overflows"));
        }
        size |= ((byte & 0x7f) as usize) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok(size);
        }
    }
}

/// Source size a delta expects
pub fn base_size(delta: &[u8]) -> Result<usize, TransportError> {
    read_size(delta, &mut 0)
}

pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut position = 0;
    let source_size = read_size(delta, &mut position)?;
    let target_size = read_size(delta, &mut position)?;

    if source_size != base.len() {
        return Err(invalid(format!(
            "base is {} bytes, delta expects {source_size}",
            base.len()
        )));
    }

    let mut target = Vec::with_capacity(target_size.min(base.len() + delta.len()));

    while position < delta.len() {
        let instruction = delta[position];
        position += 1;

        if instruction & COPY_INSTRUCTION != 0 {
            let mut offset = 0usize;
            let mut size = 0usize;
            for bit in 0..7 {
                if instruction & (1 << bit) == 0 {
                    continue;
                }
                let byte = *delta
                    .get(position)
                    .ok_or_else(|| invalid("truncated copy instruction"))?;
                position += 1;
                if bit < 4 {
                    offset |= (byte as usize) << (8 * bit);
                } else {
                    size |= (byte as usize) << (8 * (bit - 4));
                }
            }
            if size == 0 {
                size = DEFAULT_COPY_SIZE;
            }

            let chunk = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| {
                    invalid(format!(
                        "copy of {size} bytes at {offset} exceeds the {} byte base",
                        base.len()
                    ))
                })?;
            target.extend_from_slice(chunk);
        } else if instruction == 0 {
            return Err(invalid("reserved instruction 0"));
        } else {
            let size = instruction as usize;
            let chunk = delta
                .get(position..position + size)
                .ok_or_else(|| invalid("truncated insert instruction"))?;
            target.extend_from_slice(chunk);
            position += size;
        }

        if target.len() > target_size {
            return Err(invalid(format!(
                "result grows past the {target_size} bytes the delta promised"
            )));
        }
    }

    if target.len() != target_size {
        return Err(invalid(format!(
            "result is {} bytes, delta promised {target_size}",
            target.len()
        )));
    }

    Ok(target)
}
