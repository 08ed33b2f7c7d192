use std::collections::HashMap;
use crate::{ByteReader, Error, Result};

/// AMF0 values that appear in script data records
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),                                    // 0x00
    Boolean(bool),                                  // 0x01
    String(String),                                 // 0x02
    Object(HashMap<String, Amf0Value>),             // 0x03
    Null,                                           // 0x05
    Undefined,                                      // 0x06
    EcmaArray(HashMap<String, Amf0Value>),          // 0x08
    Array(Vec<Amf0Value>),                          // 0x0A
    Date(f64, i16),                                 // 0x0B
    LongString(String),                             // 0x0C
}

// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
}

impl Amf0Value {
    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) | Amf0Value::LongString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract object reference
    pub fn as_object(&self) -> Option<&HashMap<String, Amf0Value>> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Deepest object/array nesting accepted in one value
const MAX_NESTING: usize = 64;

/// Decoder for the AMF0 subset used by script data
pub struct Amf0Decoder<'a> {
    reader: ByteReader<'a>,
    depth: usize,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Amf0Decoder {
            reader: ByteReader::new(data),
            depth: 0,
        }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.reader.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        if self.depth >= MAX_NESTING {
            return Err(Error::malformed(format!(
                "AMF0 nesting deeper than {}",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let value = self.decode_value();
        self.depth -= 1;
        value
    }

    fn decode_value(&mut self) -> Result<Amf0Value> {
        let marker = self.reader.read_u8()?;
        match marker {
            markers::NUMBER => Ok(Amf0Value::Number(self.reader.read_f64_be()?)),
            markers::BOOLEAN => Ok(Amf0Value::Boolean(self.reader.read_u8()? != 0)),
            markers::STRING => {
                let len = self.reader.read_u16_be()? as usize;
                Ok(Amf0Value::String(self.read_utf8(len)?))
            }
            markers::OBJECT => Ok(Amf0Value::Object(self.decode_properties()?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => {
                let _count = self.reader.read_u32_be()?; // advisory only
                Ok(Amf0Value::EcmaArray(self.decode_properties()?))
            }
            markers::STRICT_ARRAY => {
                let count = self.reader.read_u32_be()? as usize;
                let mut array = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    array.push(self.decode()?);
                }
                Ok(Amf0Value::Array(array))
            }
            markers::DATE => {
                let timestamp = self.reader.read_f64_be()?;
                let timezone = self.reader.read_i16_be()?;
                Ok(Amf0Value::Date(timestamp, timezone))
            }
            markers::LONG_STRING => {
                let len = self.reader.read_u32_be()? as usize;
                Ok(Amf0Value::LongString(self.read_utf8(len)?))
            }
            _ => Err(Error::malformed(format!("Unknown AMF0 marker: 0x{:02x}", marker))),
        }
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.reader.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::malformed(format!("Invalid UTF-8 in AMF0 string: {}", e)))
    }

    fn decode_properties(&mut self) -> Result<HashMap<String, Amf0Value>> {
        let mut object = HashMap::new();
        loop {
            let name_len = self.reader.read_u16_be()? as usize;
            if name_len == 0 {
                let end = self.reader.read_u8()?;
                if end != markers::OBJECT_END {
                    return Err(Error::malformed(format!("Expected object end, got 0x{:02x}", end)));
                }
                break;
            }
            let name = self.read_utf8(name_len)?;
            let value = self.decode()?;
            object.insert(name, value);
        }
        Ok(object)
    }
}

/// A decoded script data record: handler name and its argument
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptData {
    pub name: String,
    pub value: Amf0Value,
}

/// Decode a script data payload
pub fn parse_script_data(payload: &[u8]) -> Result<ScriptData> {
    let mut decoder = Amf0Decoder::new(payload);
    let mut name = match decoder.decode()? {
        Amf0Value::String(s) | Amf0Value::LongString(s) => s,
        other => {
            return Err(Error::malformed(format!(
                "script data name is not a string: {:?}",
                other
            )));
        }
    };
    // @setDataFrame wraps the real handler name
    if name == "@setDataFrame" && decoder.has_remaining() {
        if let Amf0Value::String(inner) = decoder.decode()? {
            name = inner;
        }
    }
    let value = if decoder.has_remaining() {
        decoder.decode()?
    } else {
        Amf0Value::Null
    };
    Ok(ScriptData { name, value })
}

/// Stream properties announced by `onMetaData`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamMetadata {
    // Video properties
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub video_codec_id: Option<f64>,
    pub video_data_rate: Option<f64>,
    pub framerate: Option<f64>,

    // Audio properties
    pub audio_codec_id: Option<f64>,
    pub audio_data_rate: Option<f64>,
    pub audio_sample_rate: Option<f64>,
    pub audio_sample_size: Option<f64>,
    pub stereo: Option<bool>,

    pub duration: Option<f64>,
    pub encoder: Option<String>,
}

impl StreamMetadata {
    pub fn from_amf(obj: &HashMap<String, Amf0Value>) -> Self {
        let number = |key: &str| obj.get(key).and_then(|v| v.as_number());
        StreamMetadata {
            width: number("width"),
            height: number("height"),
            video_codec_id: number("videocodecid"),
            video_data_rate: number("videodatarate"),
            framerate: number("framerate"),
            audio_codec_id: number("audiocodecid"),
            audio_data_rate: number("audiodatarate"),
            audio_sample_rate: number("audiosamplerate"),
            audio_sample_size: number("audiosamplesize"),
            stereo: obj.get("stereo").and_then(|v| v.as_boolean()),
            duration: number("duration"),
            encoder: obj.get("encoder").and_then(|v| v.as_string()).map(String::from),
        }
    }

    /// Get video resolution
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w as u32, h as u32)),
            _ => None,
        }
    }
}

pub struct MetadataProcessor {
    /// Last `onMetaData` seen
    metadata: Option<StreamMetadata>,
}

impl MetadataProcessor {
    /// Create new metadata processor
    pub fn new() -> Self {
        MetadataProcessor { metadata: None }
    }

    /// Decode a script data payload, caching `onMetaData`
    pub fn process(&mut self, payload: &[u8]) -> Result<ScriptData> {
        let data = parse_script_data(payload)?;

        if data.name == "onMetaData" {
            if let Some(obj) = data.value.as_object() {
                self.metadata = Some(StreamMetadata::from_amf(obj));
            }
        }

        Ok(data)
    }

    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.as_ref()
    }
}

impl Default for MetadataProcessor {
    fn default() -> Self {
        Self::new()
    }
}
