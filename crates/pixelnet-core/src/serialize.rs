// Tensor serialization — raw binary dump
//
//   ┌───────────────────────────────────────┬──────────────────────────────┐
//   │ 4 × u64 LE                            │ elements × value             │
//   │ samples, maps, height, width          │ f32 LE  (or 1 byte, convert) │
//   └───────────────────────────────────────┴──────────────────────────────┘
//
// There is no magic, padding or checksum. With `convert` each value is
// narrowed to one byte as round(clamp(v, 0, 1) · 255), which is handy for
// looking at images but cannot be read back by `deserialize`.

use std::io::{self, Read, Write};

use crate::bail;
use crate::error::Result;
use crate::shape::Shape;
use crate::storage::Datum;
use crate::tensor::Tensor;

const HEADER_FIELDS: usize = 4;
const DATUM_BYTES: usize = std::mem::size_of::<Datum>();

/// Narrow a value to one byte for converted dumps.
pub fn to_byte(value: Datum) -> u8 {
    // NaN saturates to 0 under `as`.
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Tensor {
    /// Write the shape header followed by every element.
    pub fn serialize<W: Write>(&self, output: &mut W, convert: bool) -> Result<()> {
        let Shape {
            samples,
            maps,
            height,
            width,
        } = self.shape;
        let mut header = Vec::with_capacity(HEADER_FIELDS * 8);
        for field in [samples, maps, height, width] {
            header.extend_from_slice(&(field as u64).to_le_bytes());
        }
        output.write_all(&header)?;

        let data = self.data();
        let body: Vec<u8> = if convert {
            data.iter().map(|&v| to_byte(v)).collect()
        } else {
            data.iter().flat_map(|v| v.to_le_bytes()).collect()
        };
        output.write_all(&body)?;
        Ok(())
    }

    /// Read a tensor written by `serialize(.., false)`, resizing to the
    /// stored shape. Nothing is modified unless the whole tensor was read.
    pub fn deserialize<R: Read>(&mut self, input: &mut R) -> Result<()> {
        let mut header = [0u8; HEADER_FIELDS * 8];
        input.read_exact(&mut header)?;
        let mut fields = [0usize; HEADER_FIELDS];
        for (field, bytes) in fields.iter_mut().zip(header.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            let value = u64::from_le_bytes(raw);
            *field = match usize::try_from(value) {
                Ok(v) => v,
                Err(_) => bail!("tensor header field {value} does not fit in memory"),
            };
        }
        let shape = Shape::new(fields[0], fields[1], fields[2], fields[3]);
        let byte_len = match shape
            .checked_elements()
            .and_then(|n| n.checked_mul(DATUM_BYTES))
        {
            Some(len) => len,
            None => bail!("tensor header {shape} overflows"),
        };

        let mut raw = Vec::new();
        input.take(byte_len as u64).read_to_end(&mut raw)?;
        if raw.len() != byte_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "tensor {shape} needs {byte_len} bytes of data, stream had {}",
                    raw.len()
                ),
            )
            .into());
        }

        self.resize_to(shape)?;
        let mut data = self.data_mut();
        for (slot, bytes) in data.iter_mut().zip(raw.chunks_exact(DATUM_BYTES)) {
            let mut value = [0u8; DATUM_BYTES];
            value.copy_from_slice(bytes);
            *slot = Datum::from_le_bytes(value);
        }
        Ok(())
    }
}
