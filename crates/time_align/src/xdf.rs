//! XDF capture files
//!
//! XDF is the container Lab Streaming Layer recorders write: the magic
//! `XDF:` followed by chunks `[n: u8][length: n bytes][tag: u16][content]`,
//! all little-endian. Stream headers carry an XML `<info>` document; sample
//! chunks carry values in the stream's channel format.
//!
//! Loading follows the usual LSL conventions: a sample without timestamp is
//! stamped `previous + 1/srate`, and each stream's timestamps are corrected
//! by a least-squares fit of its clock-offset measurements over time.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use tracing::{debug, info, warn};

use crate::error::{AlignmentError, Result, XdfError};
use crate::events::{EventLog, EventRecord};
use crate::model::AffineClockModel;

const MAGIC: &[u8; 4] = b"XDF:";

const TAG_FILE_HEADER: u16 = 1;
const TAG_STREAM_HEADER: u16 = 2;
const TAG_SAMPLES: u16 = 3;
const TAG_CLOCK_OFFSET: u16 = 4;
const TAG_BOUNDARY: u16 = 5;
const TAG_STREAM_FOOTER: u16 = 6;

/// Stream type used for event streams
pub const EVENT_STREAM_TYPE: &str = "Event";

/// Channel value format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XdfChannelFormat {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Double64,
    String,
}

impl XdfChannelFormat {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "float32" => Self::Float32,
            "double64" => Self::Double64,
            "string" => Self::String,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Double64 => "double64",
            Self::String => "string",
        }
    }
}

/// Parsed `<info>` of a stream header
#[derive(Debug, Clone, PartialEq)]
pub struct XdfStreamHeader {
    pub name: String,
    pub stream_type: String,
    pub channel_count: usize,
    pub channel_format: XdfChannelFormat,
    /// 0 for irregular streams
    pub nominal_srate: f64,
    pub source_id: String,
    /// Every text element, keyed by path below `<info>` (e.g. `desc/acquisition/model`)
    fields: Vec<(String, String)>,
}

impl XdfStreamHeader {
    pub fn new(
        name: impl Into<String>,
        stream_type: impl Into<String>,
        channel_format: XdfChannelFormat,
        channel_count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            stream_type: stream_type.into(),
            channel_count,
            channel_format,
            nominal_srate: 0.0,
            source_id: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn with_nominal_srate(mut self, srate: f64) -> Self {
        self.nominal_srate = srate;
        self
    }

    /// Add a `desc/acquisition` entry
    pub fn with_acquisition(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields
            .push((format!("desc/acquisition/{key}"), value.into()));
        self
    }

    /// Text of the element at `path` below `<info>`
    pub fn field(&self, path: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v.as_str())
    }

    pub fn acquisition(&self, key: &str) -> Option<&str> {
        self.field(&format!("desc/acquisition/{key}"))
    }

    pub fn world_camera_serial(&self) -> Option<&str> {
        self.acquisition("world_camera_serial")
    }

    fn acquisition_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(path, value)| {
            path.strip_prefix("desc/acquisition/")
                .map(|key| (key, value.as_str()))
        })
    }

    fn from_fields(fields: Vec<(String, String)>) -> std::result::Result<Self, XdfError> {
        let get = |key: &str| {
            fields
                .iter()
                .find(|(p, _)| p == key)
                .map(|(_, v)| v.trim().to_string())
        };
        let format_name = get("channel_format").ok_or(XdfError::MissingField("channel_format"))?;
        let channel_format =
            XdfChannelFormat::parse(&format_name).ok_or(XdfError::UnknownChannelFormat(format_name))?;
        let count = get("channel_count").ok_or(XdfError::MissingField("channel_count"))?;
        let channel_count = count.parse::<usize>().map_err(|_| XdfError::InvalidField {
            field: "channel_count",
            value: count,
        })?;
        let nominal_srate = match get("nominal_srate") {
            Some(value) => value.parse::<f64>().map_err(|_| XdfError::InvalidField {
                field: "nominal_srate",
                value,
            })?,
            None => 0.0,
        };

        Ok(Self {
            name: get("name").unwrap_or_default(),
            stream_type: get("type").unwrap_or_default(),
            channel_count,
            channel_format,
            nominal_srate,
            source_id: get("source_id").unwrap_or_default(),
            fields,
        })
    }
}

/// Decoded sample values, one inner vector per sample
#[derive(Debug, Clone, PartialEq)]
pub enum XdfValues {
    Numeric(Vec<Vec<f64>>),
    Text(Vec<Vec<String>>),
}

impl XdfValues {
    fn empty(format: XdfChannelFormat) -> Self {
        match format {
            XdfChannelFormat::String => Self::Text(Vec::new()),
            _ => Self::Numeric(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One recorded stream
#[derive(Debug, Clone)]
pub struct XdfStream {
    pub id: u32,
    pub header: XdfStreamHeader,
    /// Clock-corrected timestamps
    pub timestamps: Vec<f64>,
    pub values: XdfValues,
    /// `(collection_time, offset)` measurements
    pub clock_offsets: Vec<(f64, f64)>,
}

impl XdfStream {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_event_stream(&self) -> bool {
        self.header.stream_type == EVENT_STREAM_TYPE
    }

    /// First channel of a string stream as an event log
    pub fn event_log(&self) -> Option<EventLog> {
        let XdfValues::Text(samples) = &self.values else {
            return None;
        };
        Some(
            samples
                .iter()
                .zip(&self.timestamps)
                .filter_map(|(values, &timestamp)| {
                    values.first().map(|name| EventRecord {
                        name: name.clone(),
                        timestamp,
                    })
                })
                .collect(),
        )
    }
}

/// Loaded capture file
#[derive(Debug, Clone)]
pub struct XdfFile {
    pub streams: Vec<XdfStream>,
}

impl XdfFile {
    pub fn event_streams(&self) -> impl Iterator<Item = &XdfStream> {
        self.streams.iter().filter(|s| s.is_event_stream())
    }
}

/// Load and clock-correct a capture file
pub fn read_xdf(path: &Path) -> Result<XdfFile> {
    let data = std::fs::read(path).map_err(|e| AlignmentError::invalid_capture(path, e))?;
    let file = parse_xdf(&data).map_err(|e| AlignmentError::invalid_capture(path, e))?;
    info!(path = %path.display(), streams = file.streams.len(), "capture file loaded");
    Ok(file)
}

type DecodeResult<T> = std::result::Result<T, XdfError>;

fn read_varlen(cursor: &mut Cursor<&[u8]>) -> DecodeResult<u64> {
    match cursor.read_u8()? {
        1 => Ok(u64::from(cursor.read_u8()?)),
        4 => Ok(u64::from(cursor.read_u32::<LittleEndian>()?)),
        8 => Ok(cursor.read_u64::<LittleEndian>()?),
        n => Err(XdfError::LengthWidth(n)),
    }
}

fn read_value(cursor: &mut Cursor<&[u8]>, format: XdfChannelFormat) -> DecodeResult<f64> {
    Ok(match format {
        XdfChannelFormat::Int8 => f64::from(cursor.read_i8()?),
        XdfChannelFormat::Int16 => f64::from(cursor.read_i16::<LittleEndian>()?),
        XdfChannelFormat::Int32 => f64::from(cursor.read_i32::<LittleEndian>()?),
        XdfChannelFormat::Int64 => cursor.read_i64::<LittleEndian>()? as f64,
        XdfChannelFormat::Float32 => f64::from(cursor.read_f32::<LittleEndian>()?),
        XdfChannelFormat::Double64 => cursor.read_f64::<LittleEndian>()?,
        XdfChannelFormat::String => return Err(XdfError::StringAsNumeric),
    })
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> DecodeResult<String> {
    let len = usize::try_from(read_varlen(cursor)?).map_err(|_| XdfError::StringOverflow)?;
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if len > remaining {
        return Err(XdfError::StringOverflow);
    }
    let mut bytes = vec![0u8; len];
    cursor.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Text elements of an XML document keyed by path below the root
fn xml_fields(xml: &str) -> DecodeResult<Vec<(String, String)>> {
    let mut reader = XmlReader::from_str(xml);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut fields = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                text.clear();
            }
            Event::Text(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => match e.resolve_char_ref()? {
                Some(c) => text.push(c),
                None => {
                    let name = String::from_utf8_lossy(&e);
                    let resolved = resolve_predefined_entity(&name)
                        .ok_or_else(|| XdfError::UnknownEntity(name.to_string()))?;
                    text.push_str(resolved);
                }
            },
            Event::End(_) => {
                let value = text.trim();
                if !value.is_empty() && path.len() > 1 {
                    fields.push((path[1..].join("/"), value.to_string()));
                }
                text.clear();
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(fields)
}

struct StreamBuilder {
    header: XdfStreamHeader,
    timestamps: Vec<f64>,
    values: XdfValues,
    clock_offsets: Vec<(f64, f64)>,
    last_timestamp: f64,
}

impl StreamBuilder {
    fn new(header: XdfStreamHeader) -> Self {
        let values = XdfValues::empty(header.channel_format);
        Self {
            header,
            timestamps: Vec::new(),
            values,
            clock_offsets: Vec::new(),
            last_timestamp: 0.0,
        }
    }

    fn read_samples(&mut self, cursor: &mut Cursor<&[u8]>) -> DecodeResult<()> {
        let count = read_varlen(cursor)?;
        let delta = if self.header.nominal_srate > 0.0 {
            1.0 / self.header.nominal_srate
        } else {
            0.0
        };
        let channels = self.header.channel_count;
        let format = self.header.channel_format;

        for _ in 0..count {
            let timestamp = match cursor.read_u8()? {
                8 => cursor.read_f64::<LittleEndian>()?,
                0 => self.last_timestamp + delta,
                n => return Err(XdfError::TimestampWidth(n)),
            };
            self.last_timestamp = timestamp;
            self.timestamps.push(timestamp);

            match &mut self.values {
                XdfValues::Text(samples) => {
                    let sample = (0..channels)
                        .map(|_| read_string(cursor))
                        .collect::<DecodeResult<Vec<_>>>()?;
                    samples.push(sample);
                }
                XdfValues::Numeric(samples) => {
                    let sample = (0..channels)
                        .map(|_| read_value(cursor, format))
                        .collect::<DecodeResult<Vec<_>>>()?;
                    samples.push(sample);
                }
            }
        }
        Ok(())
    }

    /// Apply the fitted clock offset to every timestamp
    fn synchronize(&mut self) {
        let correction = match self.clock_offsets.as_slice() {
            [] => return,
            [(_, offset)] => AffineClockModel {
                intercept: *offset,
                slope: 0.0,
            },
            offsets => {
                let (times, values): (Vec<f64>, Vec<f64>) = offsets.iter().copied().unzip();
                AffineClockModel::fit(&times, &values).unwrap_or_else(|e| {
                    debug!(stream = %self.header.name, reason = %e, "clock offsets not fittable, using mean");
                    AffineClockModel {
                        intercept: values.iter().sum::<f64>() / values.len() as f64,
                        slope: 0.0,
                    }
                })
            }
        };
        for ts in &mut self.timestamps {
            *ts += correction.predict(*ts);
        }
    }

    fn build(mut self, id: u32) -> XdfStream {
        self.synchronize();
        XdfStream {
            id,
            header: self.header,
            timestamps: self.timestamps,
            values: self.values,
            clock_offsets: self.clock_offsets,
        }
    }
}

/// Decode an in-memory XDF file
pub fn parse_xdf(data: &[u8]) -> DecodeResult<XdfFile> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(XdfError::MissingMagic);
    }
    let body = &data[MAGIC.len()..];
    let mut cursor = Cursor::new(body);
    let mut streams: BTreeMap<u32, StreamBuilder> = BTreeMap::new();

    while (cursor.position() as usize) < body.len() {
        let chunk_len = read_varlen(&mut cursor)?;
        let tag = cursor.read_u16::<LittleEndian>()?;
        let start = cursor.position() as usize;
        let content_len = usize::try_from(chunk_len.saturating_sub(2)).map_err(|_| XdfError::ChunkTooLarge)?;
        let end = start
            .checked_add(content_len)
            .filter(|&end| end <= body.len())
            .ok_or(XdfError::TruncatedChunk { tag })?;
        let content = &body[start..end];
        cursor.set_position(end as u64);

        let mut chunk = Cursor::new(content);
        match tag {
            TAG_FILE_HEADER => debug!(bytes = content.len(), "file header"),
            TAG_STREAM_HEADER => {
                let id = chunk.read_u32::<LittleEndian>()?;
                let xml = String::from_utf8_lossy(&content[4..]);
                let header = xml_fields(&xml)
                    .and_then(XdfStreamHeader::from_fields)
                    .map_err(|e| e.in_stream(id))?;
                debug!(stream = id, name = %header.name, kind = %header.stream_type, "stream header");
                streams.insert(id, StreamBuilder::new(header));
            }
            TAG_SAMPLES => {
                let id = chunk.read_u32::<LittleEndian>()?;
                match streams.get_mut(&id) {
                    Some(stream) => stream.read_samples(&mut chunk).map_err(|e| e.in_stream(id))?,
                    None => warn!(stream = id, "samples for unknown stream skipped"),
                }
            }
            TAG_CLOCK_OFFSET => {
                let id = chunk.read_u32::<LittleEndian>()?;
                let time = chunk.read_f64::<LittleEndian>()?;
                let offset = chunk.read_f64::<LittleEndian>()?;
                if let Some(stream) = streams.get_mut(&id) {
                    stream.clock_offsets.push((time, offset));
                }
            }
            TAG_BOUNDARY | TAG_STREAM_FOOTER => {}
            other => debug!(tag = other, "unknown chunk skipped"),
        }
    }

    Ok(XdfFile {
        streams: streams
            .into_iter()
            .map(|(id, builder)| builder.build(id))
            .collect(),
    })
}

// ============================================================================
// Writer
// ============================================================================

/// In-memory XDF writer
pub struct XdfWriter {
    buf: Vec<u8>,
}

fn push_varlen(buf: &mut Vec<u8>, value: u64) {
    if value <= u64::from(u8::MAX) {
        buf.push(1);
        buf.push(value as u8);
    } else if value <= u64::from(u32::MAX) {
        buf.push(4);
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        buf.push(8);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

impl Default for XdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XdfWriter {
    pub fn new() -> Self {
        let mut writer = Self { buf: MAGIC.to_vec() };
        writer.chunk(
            TAG_FILE_HEADER,
            b"<?xml version=\"1.0\"?><info><version>1.0</version></info>",
        );
        writer
    }

    fn chunk(&mut self, tag: u16, content: &[u8]) {
        push_varlen(&mut self.buf, content.len() as u64 + 2);
        self.buf.extend_from_slice(&tag.to_le_bytes());
        self.buf.extend_from_slice(content);
    }

    pub fn stream_header(&mut self, id: u32, header: &XdfStreamHeader) -> &mut Self {
        let mut xml = format!(
            "<?xml version=\"1.0\"?><info><name>{}</name><type>{}</type><channel_count>{}</channel_count>\
             <nominal_srate>{}</nominal_srate><channel_format>{}</channel_format><source_id>{}</source_id><desc>",
            escape(&header.name),
            escape(&header.stream_type),
            header.channel_count,
            header.nominal_srate,
            header.channel_format.as_str(),
            escape(&header.source_id),
        );
        let acquisition: Vec<_> = header.acquisition_entries().collect();
        if !acquisition.is_empty() {
            xml.push_str("<acquisition>");
            for (key, value) in acquisition {
                xml.push_str(&format!("<{key}>{}</{key}>", escape(value)));
            }
            xml.push_str("</acquisition>");
        }
        xml.push_str("</desc></info>");

        let mut content = id.to_le_bytes().to_vec();
        content.extend_from_slice(xml.as_bytes());
        self.chunk(TAG_STREAM_HEADER, &content);
        self
    }

    /// String samples; `None` timestamps are left to the delta convention
    pub fn string_samples(&mut self, id: u32, samples: &[(Option<f64>, Vec<String>)]) -> &mut Self {
        let mut content = id.to_le_bytes().to_vec();
        push_varlen(&mut content, samples.len() as u64);
        for (timestamp, values) in samples {
            Self::push_timestamp(&mut content, *timestamp);
            for value in values {
                push_varlen(&mut content, value.len() as u64);
                content.extend_from_slice(value.as_bytes());
            }
        }
        self.chunk(TAG_SAMPLES, &content);
        self
    }

    /// Double64 samples
    pub fn numeric_samples(&mut self, id: u32, samples: &[(Option<f64>, Vec<f64>)]) -> &mut Self {
        let mut content = id.to_le_bytes().to_vec();
        push_varlen(&mut content, samples.len() as u64);
        for (timestamp, values) in samples {
            Self::push_timestamp(&mut content, *timestamp);
            for value in values {
                content.extend_from_slice(&value.to_le_bytes());
            }
        }
        self.chunk(TAG_SAMPLES, &content);
        self
    }

    fn push_timestamp(content: &mut Vec<u8>, timestamp: Option<f64>) {
        match timestamp {
            Some(ts) => {
                content.push(8);
                content.extend_from_slice(&ts.to_le_bytes());
            }
            None => content.push(0),
        }
    }

    pub fn clock_offset(&mut self, id: u32, collection_time: f64, offset: f64) -> &mut Self {
        let mut content = id.to_le_bytes().to_vec();
        content.extend_from_slice(&collection_time.to_le_bytes());
        content.extend_from_slice(&offset.to_le_bytes());
        self.chunk(TAG_CLOCK_OFFSET, &content);
        self
    }

    pub fn boundary(&mut self) -> &mut Self {
        const BOUNDARY_UUID: [u8; 16] = [
            0x43, 0xA5, 0x46, 0xDC, 0xCB, 0xF5, 0x41, 0x0F, 0xB3, 0x0E, 0xD5, 0x46, 0x73, 0x83, 0xCB, 0xE4,
        ];
        self.chunk(TAG_BOUNDARY, &BOUNDARY_UUID);
        self
    }

    pub fn stream_footer(&mut self, id: u32, sample_count: usize) -> &mut Self {
        let mut content = id.to_le_bytes().to_vec();
        content.extend_from_slice(
            format!("<?xml version=\"1.0\"?><info><sample_count>{sample_count}</sample_count></info>").as_bytes(),
        );
        self.chunk(TAG_STREAM_FOOTER, &content);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, &self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_header(serial: &str) -> XdfStreamHeader {
        XdfStreamHeader::new("pupil_invisible_Event", "Event", XdfChannelFormat::String, 1)
            .with_source_id("phone_Event")
            .with_acquisition("manufacturer", "Pupil Labs")
            .with_acquisition("world_camera_serial", serial)
    }

    #[test]
    fn test_event_stream_round_trip() {
        let mut writer = XdfWriter::new();
        writer
            .stream_header(1, &event_header("SERIAL-1"))
            .string_samples(
                1,
                &[
                    (Some(10.0), vec!["recording.begin".into()]),
                    (Some(12.5), vec!["lsl.time_sync.x.0".into()]),
                ],
            )
            .boundary()
            .stream_footer(1, 2);

        let file = parse_xdf(writer.bytes()).unwrap();
        assert_eq!(file.streams.len(), 1);
        let stream = &file.streams[0];
        assert!(stream.is_event_stream());
        assert_eq!(stream.header.world_camera_serial(), Some("SERIAL-1"));
        assert_eq!(stream.header.source_id, "phone_Event");

        let log = stream.event_log().unwrap();
        assert_eq!(log.names().collect::<Vec<_>>(), ["recording.begin", "lsl.time_sync.x.0"]);
        assert_eq!(log.timestamps(), vec![10.0, 12.5]);
    }

    #[test]
    fn test_delta_timestamps() {
        let header = XdfStreamHeader::new("gaze", "Gaze", XdfChannelFormat::Double64, 2).with_nominal_srate(4.0);
        let mut writer = XdfWriter::new();
        writer.stream_header(3, &header).numeric_samples(
            3,
            &[
                (Some(1.0), vec![1.0, 2.0]),
                (None, vec![3.0, 4.0]),
                (None, vec![5.0, 6.0]),
            ],
        );

        let file = parse_xdf(writer.bytes()).unwrap();
        let stream = &file.streams[0];
        assert_eq!(stream.timestamps, vec![1.0, 1.25, 1.5]);
        assert_eq!(
            stream.values,
            XdfValues::Numeric(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
        );
        assert!(stream.event_log().is_none());
    }

    #[test]
    fn test_clock_offset_correction() {
        let mut writer = XdfWriter::new();
        writer
            .stream_header(1, &event_header("S"))
            .string_samples(1, &[(Some(100.0), vec!["a".into()]), (Some(200.0), vec!["b".into()])])
            .clock_offset(1, 0.0, 1.0)
            .clock_offset(1, 1000.0, 2.0);

        let file = parse_xdf(writer.bytes()).unwrap();
        let ts = &file.streams[0].timestamps;
        assert!((ts[0] - 101.1).abs() < 1e-9, "got {}", ts[0]);
        assert!((ts[1] - 201.2).abs() < 1e-9, "got {}", ts[1]);
    }

    #[test]
    fn test_invalid_input() {
        assert!(parse_xdf(b"NOPE").is_err());

        let mut writer = XdfWriter::new();
        writer.stream_header(1, &event_header("S"));
        let mut bytes = writer.bytes().to_vec();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse_xdf(&bytes).unwrap_err(),
            XdfError::TruncatedChunk { tag: TAG_STREAM_HEADER }
        ));
    }

    #[test]
    fn test_escaped_header_text_round_trip() {
        let header = XdfStreamHeader::new("a & b", "Event", XdfChannelFormat::String, 1)
            .with_acquisition("world_camera_serial", "CAM&1<x>");
        let mut writer = XdfWriter::new();
        writer.stream_header(1, &header);

        let file = parse_xdf(writer.bytes()).unwrap();
        let parsed = &file.streams[0].header;
        assert_eq!(parsed.name, "a & b");
        assert_eq!(parsed.world_camera_serial(), Some("CAM&1<x>"));
    }

    fn raw_header(writer: &mut XdfWriter, id: u32, xml: &str) {
        let mut content = id.to_le_bytes().to_vec();
        content.extend_from_slice(xml.as_bytes());
        writer.chunk(TAG_STREAM_HEADER, &content);
    }

    #[test]
    fn test_character_references() {
        let mut writer = XdfWriter::new();
        raw_header(
            &mut writer,
            2,
            "<info><name>cam&#32;&#x41;</name><channel_count>1</channel_count>\
             <channel_format>string</channel_format></info>",
        );
        let file = parse_xdf(writer.bytes()).unwrap();
        assert_eq!(file.streams[0].header.name, "cam A");
    }

    #[test]
    fn test_header_errors_name_stream() {
        let mut writer = XdfWriter::new();
        raw_header(
            &mut writer,
            7,
            "<info><name>&bogus;</name><channel_count>1</channel_count>\
             <channel_format>string</channel_format></info>",
        );
        let err = parse_xdf(writer.bytes()).unwrap_err();
        match &err {
            XdfError::Stream { id: 7, source } => {
                assert!(matches!(**source, XdfError::UnknownEntity(ref name) if name == "bogus"))
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut writer = XdfWriter::new();
        raw_header(&mut writer, 3, "<info><channel_format>string</channel_format></info>");
        let err = parse_xdf(writer.bytes()).unwrap_err();
        assert_eq!(err.to_string(), "stream 3: stream header without channel_count");
    }

    #[test]
    fn test_read_xdf_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xdf");
        std::fs::write(&path, b"garbage").unwrap();
        let err = read_xdf(&path).unwrap_err();
        assert!(err.to_string().contains("broken.xdf"), "got: {err}");
        assert!(matches!(
            err,
            AlignmentError::InvalidCapture {
                source: XdfError::MissingMagic,
                ..
            }
        ));
    }
}
