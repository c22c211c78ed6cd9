//! Wire envelope: JSON inside gzip.
//!
//! All three protocol messages share the same envelope; byte-valued fields
//! are hex strings inside the JSON, and points use SEC1.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("gzip: {0}")]
    Gzip(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    let json = serde_json::to_vec(message)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elliptic::curves::CurveId;
    use crate::protocol::{
        query_gen, req_bf_gen, req_init, resp_deployment, response_gen, QueryMessage,
        QueryMessagePlus, ResponseMessage,
    };

    #[test]
    fn all_message_types_round_trip() {
        let (pk, _, para) = req_init(CurveId::P256, 128, 30, 20, 4, true);
        let bf = req_bf_gen(&para, "Simba");
        let query = query_gen(&pk, &para, &bf).unwrap();
        let deployed = resp_deployment(&query).unwrap();
        let response = response_gen(&deployed, "Nala").unwrap();

        let decoded: QueryMessage = decode(&encode(&query).unwrap()).unwrap();
        assert_eq!(decoded, query);
        let decoded: QueryMessagePlus = decode(&encode(&deployed).unwrap()).unwrap();
        assert_eq!(decoded, deployed);
        let decoded: ResponseMessage = decode(&encode(&response).unwrap()).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn envelope_shrinks_the_query() {
        let (pk, _, para) = req_init(CurveId::P256, 64, 16, 8, 2, true);
        let bf = req_bf_gen(&para, "Simba");
        let query = query_gen(&pk, &para, &bf).unwrap();
        let packed = encode(&query).unwrap();
        assert!(packed.len() < serde_json::to_vec(&query).unwrap().len());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode::<ResponseMessage>(b"not gzip at all").is_err());

        // Valid gzip around invalid JSON must fail at the JSON layer.
        let packed = encode(&42u32).unwrap();
        assert!(decode::<ResponseMessage>(&packed).is_err());
    }

    #[test]
    fn missing_fields_are_errors() {
        let packed = encode(&serde_json::json!({ "Z1": { "C1": "00", "C2": "00" } })).unwrap();
        assert!(decode::<ResponseMessage>(&packed).is_err());
    }
}
