//! Persisted plugin state: all parameter values as little-endian 32-bit floats, in declared
//! parameter order.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    parameter::{ParameterValues, PARAMETER_COUNT},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Size of a persisted state blob in bytes.
pub const STATE_SIZE: usize = PARAMETER_COUNT * std::mem::size_of::<f32>();

// -------------------------------------------------------------------------------------------------

/// Serialize the given values into a state blob.
pub fn encode_state(values: &ParameterValues) -> [u8; STATE_SIZE] {
    let mut blob = [0u8; STATE_SIZE];
    LittleEndian::write_f32_into(values, &mut blob);
    blob
}

/// Deserialize a state blob. Fails when the blob is not exactly [`STATE_SIZE`] bytes long.
pub fn decode_state(blob: &[u8]) -> Result<ParameterValues, Error> {
    if blob.len() != STATE_SIZE {
        return Err(Error::StateSizeMismatch {
            expected: STATE_SIZE,
            actual: blob.len(),
        });
    }
    let mut values = [0.0; PARAMETER_COUNT];
    LittleEndian::read_f32_into(blob, &mut values);
    Ok(values)
}

/// Write the given values as state blob into the given stream.
pub fn save_state(values: &ParameterValues, stream: &mut impl Write) -> Result<(), Error> {
    stream.write_all(&encode_state(values))?;
    Ok(())
}

/// Read a state blob from the given stream. Reads exactly [`STATE_SIZE`] bytes: a shorter
/// stream is a [`Error::StateSizeMismatch`], trailing bytes are not consumed.
pub fn load_state(stream: &mut impl Read) -> Result<ParameterValues, Error> {
    let mut blob = [0u8; STATE_SIZE];
    let mut read = 0;
    while read < STATE_SIZE {
        match stream.read(&mut blob[read..]) {
            Ok(0) => break,
            Ok(count) => read += count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    decode_state(&blob[..read])
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{default_values, ParameterId};

    #[test]
    fn blob_layout() {
        assert_eq!(STATE_SIZE, 64);
        let mut values = default_values();
        values[ParameterId::Reverb.index()] = 0.5;
        let blob = encode_state(&values);
        // drawbar 0 = 7.0 at the start, reverb = 0.5 at the end
        assert_eq!(blob[0..4], 7.0f32.to_le_bytes());
        assert_eq!(blob[60..64], 0.5f32.to_le_bytes());
    }

    #[test]
    fn save_and_load() -> Result<(), Box<Error>> {
        let mut values = default_values();
        values[ParameterId::Drawbar5.index()] = 3.0;
        values[ParameterId::Character.index()] = 0.123;
        let mut stream: Vec<u8> = Vec::new();
        save_state(&values, &mut stream)?;
        assert_eq!(stream.len(), STATE_SIZE);
        assert_eq!(load_state(&mut stream.as_slice())?, values);
        Ok(())
    }

    #[test]
    fn short_blobs_fail() {
        let blob = encode_state(&default_values());
        match load_state(&mut &blob[..40]) {
            Err(Error::StateSizeMismatch { expected, actual }) => {
                assert_eq!(expected, STATE_SIZE);
                assert_eq!(actual, 40);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            decode_state(&[]),
            Err(Error::StateSizeMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_left_in_stream() -> Result<(), Box<Error>> {
        let mut blob = encode_state(&default_values()).to_vec();
        blob.extend_from_slice(&[1, 2, 3]);
        let mut stream = blob.as_slice();
        assert_eq!(load_state(&mut stream)?, default_values());
        assert_eq!(stream, &[1, 2, 3]);
        Ok(())
    }
}
