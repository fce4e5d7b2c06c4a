//! # Container duration probe
//!
//! Reads the playable duration of a video from container metadata only,
//! without decoding any frame. Two families are understood:
//!
//! - ISO-BMFF (MP4, MOV) through `mp4`: `moov/mvhd` carries `timescale` and `duration`.
//! - Matroska / WebM through `matroska-demuxer`: `Segment/Info` carries
//!   `TimestampScale` and `Duration`.

use matroska_demuxer::MatroskaFile;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ProbeError {
    #[error("unsupported container")]
    Unsupported,

    #[error("container metadata is truncated")]
    Truncated,

    #[error("malformed container: {0}")]
    Malformed(String),

    /// The container is valid but does not record a duration (live WebM)
    #[error("container does not record a duration")]
    DurationUnknown,
}

/// Reads a video's duration from its bytes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait MediaProbe: Send + Sync {
    fn video_duration(&self, data: &[u8]) -> Result<Duration, ProbeError>;
}

/// Probe for MP4/MOV and WebM/Matroska containers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerProbe;

impl MediaProbe for ContainerProbe {
    fn video_duration(&self, data: &[u8]) -> Result<Duration, ProbeError> {
        if data.len() >= 8 && &data[4..8] == b"ftyp" {
            return mp4_duration(data);
        }
        if data.starts_with(&EBML_MAGIC) {
            return matroska_duration(data);
        }
        Err(ProbeError::Unsupported)
    }
}

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

fn mp4_duration(data: &[u8]) -> Result<Duration, ProbeError> {
    let reader = mp4::Mp4Reader::read_header(Cursor::new(data), data.len() as u64).map_err(|e| match e {
        // A moov that comes after mdat is lost when the upload is cut short.
        mp4::Error::BoxNotFound(mp4::BoxType::MoovBox) => ProbeError::Truncated,
        other => ProbeError::Malformed(other.to_string()),
    })?;

    let mvhd = &reader.moov.mvhd;
    if mvhd.timescale == 0 {
        return Err(ProbeError::Malformed("mvhd timescale is zero".into()));
    }
    // All-ones is the "unknown" sentinel for fragmented files.
    if (mvhd.version == 0 && mvhd.duration == u32::MAX as u64) || mvhd.duration == u64::MAX {
        return Err(ProbeError::DurationUnknown);
    }
    let nanos = mvhd.duration as u128 * 1_000_000_000 / mvhd.timescale as u128;
    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .map_err(|_| ProbeError::Malformed("mvhd duration overflows".into()))
}

fn matroska_duration(data: &[u8]) -> Result<Duration, ProbeError> {
    let file = MatroskaFile::open(Cursor::new(data)).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    let info = file.info();

    let ticks = info.duration().ok_or(ProbeError::DurationUnknown)?;
    if !ticks.is_finite() || ticks < 0.0 {
        return Err(ProbeError::Malformed(format!("Duration value {ticks}")));
    }
    let nanos = (ticks * info.timestamp_scale().get() as f64).round();
    if nanos >= u64::MAX as f64 {
        return Err(ProbeError::Malformed("Duration overflows".into()));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

#[cfg(any(test, feature = "testing"))]
pub mod fixtures {
    //! Smallest well-formed containers the demuxers accept. No media samples.

    fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    /// `ftyp` + `moov/mvhd` (version 0) + `mdat` for the given timescale and duration.
    pub fn mp4(timescale: u32, units: u32) -> Vec<u8> {
        let mut mvhd = vec![0u8; 4]; // version + flags
        mvhd.extend_from_slice(&0u32.to_be_bytes()); // creation
        mvhd.extend_from_slice(&0u32.to_be_bytes()); // modification
        mvhd.extend_from_slice(&timescale.to_be_bytes());
        mvhd.extend_from_slice(&units.to_be_bytes());
        mvhd.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
        mvhd.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
        mvhd.extend_from_slice(&[0u8; 10]);
        for m in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
            mvhd.extend_from_slice(&m.to_be_bytes());
        }
        mvhd.extend_from_slice(&[0u8; 24]);
        mvhd.extend_from_slice(&1u32.to_be_bytes()); // next track id

        let mut out = mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2mp41");
        out.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd)));
        out.extend(mp4_box(b"mdat", &[0u8; 32]));
        out
    }

    /// Length of the `ftyp` box that opens every [`mp4`] fixture.
    pub const MP4_FTYP_LEN: usize = 28;

    fn ebml(id: &[u8], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        match body.len() {
            n if n < 0x7F => out.push(0x80 | n as u8),
            n if n < 0x3FFF => out.extend_from_slice(&(0x4000 | n as u16).to_be_bytes()),
            n => panic!("fixture element of {n} bytes"),
        }
        out.extend_from_slice(body);
        out
    }

    fn uint(id: &[u8], value: u32) -> Vec<u8> {
        ebml(id, &value.to_be_bytes())
    }

    /// EBML header + Segment with Info (optional float64 Duration in ms at a
    /// 1 ms timestamp scale), one video track and an empty cluster.
    pub fn webm(duration_ms: Option<f64>) -> Vec<u8> {
        let mut header = uint(&[0x42, 0x86], 1); // EBMLVersion
        header.extend(uint(&[0x42, 0xF7], 1)); // EBMLReadVersion
        header.extend(uint(&[0x42, 0xF2], 4)); // EBMLMaxIDLength
        header.extend(uint(&[0x42, 0xF3], 8)); // EBMLMaxSizeLength
        header.extend(ebml(&[0x42, 0x82], b"webm"));
        header.extend(uint(&[0x42, 0x87], 4)); // DocTypeVersion
        header.extend(uint(&[0x42, 0x85], 2)); // DocTypeReadVersion

        let mut info = uint(&[0x2A, 0xD7, 0xB1], 1_000_000);
        if let Some(ms) = duration_ms {
            info.extend(ebml(&[0x44, 0x89], &ms.to_be_bytes()));
        }
        info.extend(ebml(&[0x4D, 0x80], b"memory-wall"));
        info.extend(ebml(&[0x57, 0x41], b"memory-wall"));

        let mut video = uint(&[0xB0], 1280);
        video.extend(uint(&[0xBA], 720));
        let mut track = uint(&[0xD7], 1); // TrackNumber
        track.extend(uint(&[0x73, 0xC5], 1)); // TrackUID
        track.extend(uint(&[0x83], 1)); // TrackType: video
        track.extend(ebml(&[0x86], b"V_VP8"));
        track.extend(ebml(&[0xE0], &video));
        let tracks = ebml(&[0xAE], &track);

        let mut segment = ebml(&[0x15, 0x49, 0xA9, 0x66], &info);
        segment.extend(ebml(&[0x16, 0x54, 0xAE, 0x6B], &tracks));
        segment.extend(ebml(&[0x1F, 0x43, 0xB6, 0x75], &uint(&[0xE7], 0)));

        let mut out = ebml(&[0x1A, 0x45, 0xDF, 0xA3], &header);
        out.extend(ebml(&[0x18, 0x53, 0x80, 0x67], &segment));
        out
    }
}
