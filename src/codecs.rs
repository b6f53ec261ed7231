use bytes::Bytes;
use thiserror::Error;

/// Text encodings a code line can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CodecType {
    Base64,
    Hex,
}

/// Converts raw IR code bytes to and from a transport-safe text form.
pub trait Codec {
    type Error;

    fn decode(&self, input: &str) -> Result<Bytes, Self::Error>;
    fn encode(&self, code: &[u8]) -> Result<String, Self::Error>;
}

pub fn create_codec(ty: CodecType) -> Box<dyn Codec<Error = CodecError>> {
    match ty {
        CodecType::Base64 => Box::new(Base64),
        CodecType::Hex => Box::new(Hex),
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode hex string: {0}")]
    HexDecodeError(#[from] hex::FromHexError),
    #[error("failed to decode base64 string: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),
    #[error("empty input")]
    EmptyInput,
}

pub struct Base64;

impl Codec for Base64 {
    type Error = CodecError;

    fn decode(&self, input: &str) -> Result<Bytes, Self::Error> {
        let decoded = base64::decode(input)?;
        if decoded.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(Bytes::from(decoded))
    }

    fn encode(&self, code: &[u8]) -> Result<String, Self::Error> {
        Ok(base64::encode(code))
    }
}

pub struct Hex;

impl Codec for Hex {
    type Error = CodecError;

    fn decode(&self, input: &str) -> Result<Bytes, Self::Error> {
        let decoded = hex::decode(input)?;
        if decoded.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(Bytes::from(decoded))
    }

    fn encode(&self, code: &[u8]) -> Result<String, Self::Error> {
        Ok(hex::encode(code))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn base64_roundtrip() {
        let codec = create_codec(CodecType::Base64);
        let decoded = codec.decode("JgBIAAAB").unwrap();
        assert_eq!(codec.encode(&decoded).unwrap(), "JgBIAAAB");
    }

    #[test]
    fn hex_decodes_to_raw_bytes() {
        let codec = create_codec(CodecType::Hex);
        let decoded = codec.decode("260048").unwrap();
        assert_eq!(decoded.as_ref(), &[0x26, 0x00, 0x48]);
    }

    #[test]
    fn empty_input_is_rejected() {
        let codec = create_codec(CodecType::Base64);
        assert!(matches!(codec.decode(""), Err(CodecError::EmptyInput)));
    }

    #[test]
    fn codec_type_parses_lowercase_names() {
        assert_eq!(CodecType::from_str("base64").unwrap(), CodecType::Base64);
        assert_eq!(CodecType::from_str("hex").unwrap(), CodecType::Hex);
        assert!(CodecType::from_str("raw").is_err());
    }
}
