//! JSON-bearing message payloads (file, ballot, VoIP signaling).

use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

use super::error::DecodeError;
use super::ids::BlobId;
use crate::crypto::SymmetricKey;

fn parse_json<'a, T: Deserialize<'a>>(text: &'a str, what: &str) -> Result<T, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError::drop(format!("invalid {} json: {}", what, e)))
}

/// How a file message should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum RenderingType {
    #[default]
    File,
    Media,
    Sticker,
}

impl From<u8> for RenderingType {
    fn from(value: u8) -> Self {
        match value {
            1 => RenderingType::Media,
            2 => RenderingType::Sticker,
            _ => RenderingType::File,
        }
    }
}

impl From<RenderingType> for u8 {
    fn from(value: RenderingType) -> Self {
        match value {
            RenderingType::File => 0,
            RenderingType::Media => 1,
            RenderingType::Sticker => 2,
        }
    }
}

/// File message metadata.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    #[serde(rename = "b")]
    #[serde_as(as = "Hex")]
    pub blob_id: BlobId,

    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<Hex>")]
    pub thumbnail_blob_id: Option<BlobId>,

    #[serde(rename = "k")]
    #[serde_as(as = "Hex")]
    pub key: SymmetricKey,

    #[serde(rename = "m")]
    pub mime_type: String,

    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_mime_type: Option<String>,

    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(rename = "s")]
    pub size: u64,

    #[serde(rename = "j", default)]
    pub rendering: RenderingType,

    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl FileData {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        parse_json(text, "file")
    }
}

/// One option of a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotChoice {
    #[serde(rename = "i")]
    pub id: u32,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "o")]
    pub order: u32,
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<u32>,
}

/// Ballot definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotData {
    #[serde(rename = "d")]
    pub description: String,
    /// 0 open, 1 closed.
    #[serde(rename = "s")]
    pub state: u8,
    /// 0 single choice, 1 multiple choice.
    #[serde(rename = "a")]
    pub assessment: u8,
    /// 0 results on close, 1 intermediate results.
    #[serde(rename = "t")]
    pub kind: u8,
    #[serde(rename = "o", default)]
    pub choice_type: u8,
    #[serde(rename = "c")]
    pub choices: Vec<BallotChoice>,
    #[serde(rename = "p", default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
}

impl BallotData {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        parse_json(text, "ballot")
    }
}

/// A single vote: (choice id, value).
pub type BallotVote = (u32, u32);

pub fn parse_votes(text: &str) -> Result<Vec<BallotVote>, DecodeError> {
    parse_json(text, "ballot vote")
}

/// VoIP signaling payload. Only checked for being a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoipData(pub serde_json::Map<String, serde_json::Value>);

impl VoipData {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        parse_json(text, "voip")
    }

    /// The `callId` field, if present.
    pub fn call_id(&self) -> Option<u64> {
        self.0.get("callId").and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_data_parses_short_keys() {
        let json = r#"{
            "b":"000102030405060708090a0b0c0d0e0f",
            "t":"202122232425262728292a2b2c2d2e2f",
            "k":"000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            "m":"image/jpg","n":"testfile.jpg","s":123,"j":0,"d":"this is a caption",
            "x":{"a":1,"b":1.2,"c":"drei"}
        }"#;
        let data = FileData::parse(json).unwrap();
        assert_eq!(data.blob_id.as_bytes()[15], 15);
        assert_eq!(data.thumbnail_blob_id.unwrap().as_bytes()[0], 32);
        assert_eq!(data.mime_type, "image/jpg");
        assert_eq!(data.size, 123);
        assert_eq!(data.rendering, RenderingType::File);
        assert_eq!(data.correlation_id, None);
        assert_eq!(data.metadata.unwrap().len(), 3);
    }

    #[test]
    fn test_file_data_rejects_bad_key() {
        let json = r#"{"b":"00","k":"00","m":"a/b","s":1}"#;
        assert!(FileData::parse(json).unwrap_err().is_drop());
    }

    #[test]
    fn test_votes_parse() {
        assert_eq!(parse_votes("[[1,0],[2,1]]").unwrap(), vec![(1, 0), (2, 1)]);
        assert!(parse_votes("{}").is_err());
    }

    #[test]
    fn test_voip_requires_object() {
        assert_eq!(VoipData::parse(r#"{"callId":42}"#).unwrap().call_id(), Some(42));
        assert!(VoipData::parse("[1]").is_err());
    }
}
