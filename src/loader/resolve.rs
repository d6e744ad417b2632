//! Media resolution: fetch each item and work out its displayed aspect ratio

use crate::constants::{DEFAULT_READ_LIMIT_BYTES, VIDEO_FALLBACK_RATIO};
use crate::error::ItemError;
use crate::source::MediaSource;
use crate::types::{LoadedItem, MediaDescriptor, MediaKind};
use crate::utils::format_bytes;
use image::metadata::Orientation as ImageOrientation;
use image::ImageDecoder;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// Turns the leading bytes of a media file into an aspect ratio
type HeaderDecoder = fn(&MediaDescriptor, &[u8]) -> Result<f64, ItemError>;

/// Resolves descriptors one at a time. Calls share no mutable state.
pub struct Resolver<'a> {
    source: &'a dyn MediaSource,
    timeout: Option<Duration>,
    read_limit: usize,
    decoder: HeaderDecoder,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a dyn MediaSource, timeout: Option<Duration>) -> Self {
        Self {
            source,
            timeout,
            read_limit: DEFAULT_READ_LIMIT_BYTES,
            decoder: decode_header,
        }
    }

    /// Cap on the bytes read per item; headers past it count as missing
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_decoder(mut self, decoder: HeaderDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Every failure (missing file, bad data, timeout) comes back as `None`.
    pub async fn resolve(&self, descriptor: &MediaDescriptor) -> Option<LoadedItem> {
        if descriptor.kind == MediaKind::Unsupported {
            return None;
        }

        let attempt = self.measure(descriptor);
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or(Err(ItemError::Timeout(limit))),
            None => attempt.await,
        };

        match outcome {
            Ok(ratio) => Some(LoadedItem::new(descriptor, ratio)),
            Err(e) => {
                debug!(name = %descriptor.name, error = %e, "Dropping media item");
                None
            }
        }
    }

    async fn measure(&self, descriptor: &MediaDescriptor) -> Result<f64, ItemError> {
        let prefix = self
            .source
            .fetch_prefix(&descriptor.path, self.read_limit)
            .await?;
        debug!(
            name = %descriptor.name,
            size = %format_bytes(prefix.bytes.len() as u64),
            complete = prefix.complete,
            "Media header fetched"
        );

        // Decoders may spin on corrupt input; run them off the runtime so the timeout still fires
        let decoder = self.decoder;
        let descriptor = descriptor.clone();
        tokio::task::spawn_blocking(move || decoder(&descriptor, &prefix.bytes))
            .await
            .map_err(|e| ItemError::decode(format!("header decode task failed: {}", e)))?
    }
}

fn decode_header(descriptor: &MediaDescriptor, bytes: &[u8]) -> Result<f64, ItemError> {
    match descriptor.kind {
        MediaKind::Image => {
            let format = descriptor.image_format().ok_or(ItemError::Unsupported)?;
            image_ratio(bytes, format)
        }
        MediaKind::Video => video_ratio(bytes),
        MediaKind::Unsupported => Err(ItemError::Unsupported),
    }
}

/// Decode only the image header, trusting the suffix-derived format.
/// EXIF quarter turns swap the displayed width and height.
pub fn image_ratio(bytes: &[u8], format: image::ImageFormat) -> Result<f64, ItemError> {
    let mut decoder = image::ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .map_err(|e| ItemError::decode(e.to_string()))?;
    let (width, height) = decoder.dimensions();
    let (width, height) = match decoder.orientation() {
        Ok(
            ImageOrientation::Rotate90
            | ImageOrientation::Rotate270
            | ImageOrientation::Rotate90FlipH
            | ImageOrientation::Rotate270FlipH,
        ) => (height, width),
        _ => (width, height),
    };
    if width == 0 || height == 0 {
        return Err(ItemError::decode(format!("degenerate size {}x{}", width, height)));
    }
    Ok(f64::from(width) / f64::from(height))
}

/// Ratio of the first video track with real dimensions, or the fallback
/// ratio when the container has none (audio-only, metadata omitted).
///
/// `bytes` may be a truncated prefix as long as `ftyp` and `moov` fit in it.
pub fn video_ratio(bytes: &[u8]) -> Result<f64, ItemError> {
    let header = movie_header(bytes)?;
    let reader = mp4::Mp4Reader::read_header(Cursor::new(header.as_slice()), header.len() as u64)
        .map_err(|e| ItemError::decode(e.to_string()))?;

    let mut tracks: Vec<_> = reader.tracks().iter().collect();
    tracks.sort_by_key(|(id, _)| **id);

    let dimensions = tracks
        .into_iter()
        .filter(|(_, track)| matches!(track.track_type(), Ok(mp4::TrackType::Video)))
        .map(|(_, track)| displayed_size(track))
        .find(|&(width, height)| width > 0 && height > 0);

    Ok(match dimensions {
        Some((width, height)) => f64::from(width) / f64::from(height),
        None => VIDEO_FALLBACK_RATIO,
    })
}

/// Coded size with the track matrix applied: quarter turns zero its diagonal.
fn displayed_size(track: &mp4::Mp4Track) -> (u16, u16) {
    let (width, height) = (track.width(), track.height());
    let m = &track.trak.tkhd.matrix;
    if m.a == 0 && m.d == 0 && m.b != 0 && m.c != 0 {
        (height, width)
    } else {
        (width, height)
    }
}

/// Copy the top-level `ftyp` and `moov` boxes out of a possibly truncated
/// file so the header parses without the media data behind it.
fn movie_header(bytes: &[u8]) -> Result<Vec<u8>, ItemError> {
    let mut ftyp = None;
    let mut moov = None;
    let mut pos = 0usize;

    while pos + 8 <= bytes.len() {
        let size = box_size(bytes, pos).ok_or_else(|| ItemError::decode("truncated box header"))?;
        if size < 8 {
            return Err(ItemError::decode(format!("invalid box size {} at offset {}", size, pos)));
        }
        let end = (pos as u64).saturating_add(size);
        let contained = end <= bytes.len() as u64;

        match &bytes[pos + 4..pos + 8] {
            b"ftyp" | b"moov" if !contained => {
                return Err(ItemError::decode(format!(
                    "header box runs past the first {} bytes",
                    bytes.len()
                )))
            }
            b"ftyp" => ftyp = Some(&bytes[pos..end as usize]),
            b"moov" => moov = Some(&bytes[pos..end as usize]),
            _ => {}
        }

        if !contained || (ftyp.is_some() && moov.is_some()) {
            break;
        }
        pos = end as usize;
    }

    match (ftyp, moov) {
        (Some(ftyp), Some(moov)) => Ok([ftyp, moov].concat()),
        (_, None) => Err(ItemError::decode(format!(
            "no movie header in the first {} bytes",
            bytes.len()
        ))),
        (None, Some(_)) => Err(ItemError::decode("missing ftyp box")),
    }
}

/// Declared size of the box at `pos`; `None` when its header is cut off
fn box_size(bytes: &[u8], pos: usize) -> Option<u64> {
    let size = u32::from_be_bytes(bytes.get(pos..pos + 4)?.try_into().ok()?);
    match size {
        // Runs to the end of the file
        0 => Some((bytes.len() - pos) as u64),
        1 => Some(u64::from_be_bytes(bytes.get(pos + 8..pos + 16)?.try_into().ok()?)),
        n => Some(u64::from(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::MemorySource;
    use async_trait::async_trait;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    /// An MP4 with a movie header and no tracks at all
    fn trackless_mp4() -> Vec<u8> {
        let mut writer = mp4::Mp4Writer::write_start(Cursor::new(Vec::new()), &mp4_config()).unwrap();
        writer.write_end().unwrap();
        writer.into_writer().into_inner()
    }

    fn mp4_config() -> mp4::Mp4Config {
        mp4::Mp4Config {
            major_brand: str::parse("isom").unwrap(),
            minor_version: 512,
            compatible_brands: vec![str::parse("isom").unwrap(), str::parse("mp41").unwrap()],
            timescale: 1000,
        }
    }

    /// An MP4 with one empty AVC track of the given coded size
    fn avc_mp4(width: u16, height: u16) -> Vec<u8> {
        let mut writer = mp4::Mp4Writer::write_start(Cursor::new(Vec::new()), &mp4_config()).unwrap();
        writer
            .add_track(&mp4::TrackConfig {
                track_type: mp4::TrackType::Video,
                timescale: 1000,
                language: "und".to_string(),
                media_conf: mp4::MediaConfig::AvcConfig(mp4::AvcConfig {
                    width,
                    height,
                    seq_param_set: vec![0x67, 0x42, 0x00, 0x1e],
                    pic_param_set: vec![0x68, 0xce, 0x38, 0x80],
                }),
            })
            .unwrap();
        writer.write_end().unwrap();
        writer.into_writer().into_inner()
    }

    /// Rewrite the track header matrix as a 90 degree turn
    fn rotate_quarter(mut bytes: Vec<u8>) -> Vec<u8> {
        let kind = bytes.windows(4).position(|w| w == b"tkhd").unwrap();
        let version = bytes[kind + 4];
        let matrix = kind - 4 + if version == 1 { 60 } else { 48 };
        let entries: [i32; 5] = [0, 0x0001_0000, 0, -0x0001_0000, 0];
        for (i, value) in entries.iter().enumerate() {
            bytes[matrix + i * 4..matrix + i * 4 + 4].copy_from_slice(&value.to_be_bytes());
        }
        bytes
    }

    /// Top-level boxes of a file written with 32-bit sizes
    fn top_level_boxes(bytes: &[u8]) -> Vec<(&[u8], &[u8])> {
        let mut boxes = Vec::new();
        let mut pos = 0;
        while pos + 8 <= bytes.len() {
            let size = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            boxes.push((&bytes[pos + 4..pos + 8], &bytes[pos..pos + size]));
            pos += size;
        }
        boxes
    }

    /// `ftyp` and `moov` around a media payload of `payload` zero bytes
    fn with_payload(file: &[u8], payload: usize, moov_first: bool) -> Vec<u8> {
        let boxes = top_level_boxes(file);
        let find = |kind: &[u8]| boxes.iter().find(|(k, _)| *k == kind).unwrap().1;
        let mut mdat = ((payload + 8) as u32).to_be_bytes().to_vec();
        mdat.extend_from_slice(b"mdat");
        mdat.resize(payload + 8, 0);

        let mut out = find(b"ftyp").to_vec();
        if moov_first {
            out.extend_from_slice(find(b"moov"));
            out.extend_from_slice(&mdat);
        } else {
            out.extend_from_slice(&mdat);
            out.extend_from_slice(find(b"moov"));
        }
        out
    }

    /// A JPEG carrying an EXIF orientation tag
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08\x00\x01".to_vec();
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut app1 = vec![0xff, 0xe1];
        app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        app1.extend_from_slice(b"Exif\x00\x00");
        app1.extend_from_slice(&tiff);

        let plain = jpeg(width, height);
        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&plain[2..]);
        out
    }

    fn slow_decode(_: &MediaDescriptor, _: &[u8]) -> Result<f64, ItemError> {
        std::thread::sleep(Duration::from_secs(2));
        Ok(1.0)
    }

    fn panicking_decode(_: &MediaDescriptor, _: &[u8]) -> Result<f64, ItemError> {
        panic!("decoder blew up")
    }

    fn descriptor(name: &str, kind: MediaKind) -> MediaDescriptor {
        MediaDescriptor {
            name: name.to_string(),
            kind,
            path: format!("portfolio/{name}"),
        }
    }

    struct HangingSource;

    #[async_trait]
    impl MediaSource for HangingSource {
        async fn fetch(&self, _path: &str, _fresh: bool) -> Result<Vec<u8>, SourceError> {
            futures::future::pending().await
        }
    }

    #[test]
    fn image_ratio_is_width_over_height() {
        assert_eq!(image_ratio(&png(16, 8), image::ImageFormat::Png).unwrap(), 2.0);
        assert_eq!(image_ratio(&jpeg(4, 8), image::ImageFormat::Jpeg).unwrap(), 0.5);
    }

    #[test]
    fn image_format_is_not_sniffed() {
        // PNG bytes behind a .jpg name fail like any corrupt file
        assert!(image_ratio(&png(16, 8), image::ImageFormat::Jpeg).is_err());
    }

    #[test]
    fn trackless_video_falls_back() {
        assert_eq!(video_ratio(&trackless_mp4()).unwrap(), VIDEO_FALLBACK_RATIO);
    }

    #[test]
    fn garbage_video_is_an_error() {
        assert!(video_ratio(b"definitely not an mp4 container").is_err());
    }

    #[tokio::test]
    async fn resolve_success_paths() {
        let source = MemorySource::new();
        source.insert("portfolio/a.jpg", jpeg(16, 8));
        source.insert("portfolio/b.mp4", trackless_mp4());
        let resolver = Resolver::new(&source, None);

        let image = resolver
            .resolve(&descriptor("a.jpg", MediaKind::Image))
            .await
            .unwrap();
        assert_eq!(image.aspect_ratio, 2.0);
        assert_eq!(image.kind, MediaKind::Image);

        let video = resolver
            .resolve(&descriptor("b.mp4", MediaKind::Video))
            .await
            .unwrap();
        assert_eq!(video.aspect_ratio, 1.77);
    }

    #[tokio::test]
    async fn resolve_failures_are_none() {
        let source = MemorySource::new();
        source.insert_status("portfolio/missing.png", 404);
        source.insert("portfolio/broken.png", b"\x89PNG truncated".to_vec());
        source.insert("portfolio/broken.mp4", b"nope".to_vec());
        let resolver = Resolver::new(&source, None);

        assert!(resolver
            .resolve(&descriptor("missing.png", MediaKind::Image))
            .await
            .is_none());
        assert!(resolver
            .resolve(&descriptor("broken.png", MediaKind::Image))
            .await
            .is_none());
        assert!(resolver
            .resolve(&descriptor("broken.mp4", MediaKind::Video))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unsupported_is_never_fetched() {
        let source = MemorySource::new();
        let resolver = Resolver::new(&source, None);

        assert!(resolver
            .resolve(&descriptor("notes.txt", MediaKind::Unsupported))
            .await
            .is_none());
        assert!(source.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_item_times_out() {
        let source = HangingSource;
        let resolver = Resolver::new(&source, Some(Duration::from_secs(5)));

        assert!(resolver
            .resolve(&descriptor("slow.jpg", MediaKind::Image))
            .await
            .is_none());
    }

    #[test]
    fn exif_quarter_turn_swaps_image_sides() {
        let rotated = jpeg_with_orientation(16, 8, 6);
        assert_eq!(image_ratio(&rotated, image::ImageFormat::Jpeg).unwrap(), 0.5);

        let upside_down = jpeg_with_orientation(16, 8, 3);
        assert_eq!(image_ratio(&upside_down, image::ImageFormat::Jpeg).unwrap(), 2.0);
    }

    #[test]
    fn video_track_size_gives_the_ratio() {
        let ratio = video_ratio(&avc_mp4(1920, 1080)).unwrap();
        assert!((ratio - 1920.0 / 1080.0).abs() < 1e-9);
    }

    #[test]
    fn rotated_video_track_swaps_sides() {
        let ratio = video_ratio(&rotate_quarter(avc_mp4(1920, 1080))).unwrap();
        assert!((ratio - 1080.0 / 1920.0).abs() < 1e-9);
    }

    #[test]
    fn movie_header_ahead_of_media_survives_truncation() {
        let file = with_payload(&avc_mp4(640, 480), 1024 * 1024, true);
        let prefix = &file[..64 * 1024];
        let ratio = video_ratio(prefix).unwrap();
        assert!((ratio - 640.0 / 480.0).abs() < 1e-9);
    }

    #[test]
    fn movie_header_past_the_prefix_is_an_error() {
        let file = with_payload(&avc_mp4(640, 480), 1024 * 1024, false);
        assert!(video_ratio(&file[..64 * 1024]).is_err());
        // The whole file still parses
        assert!(video_ratio(&file).is_ok());
    }

    #[tokio::test]
    async fn resolve_reads_at_most_the_limit() {
        let source = MemorySource::new();
        source.insert(
            "portfolio/long.mp4",
            with_payload(&avc_mp4(1080, 1920), 4 * 1024 * 1024, true),
        );
        let resolver = Resolver::new(&source, None).with_read_limit(32 * 1024);

        let video = resolver
            .resolve(&descriptor("long.mp4", MediaKind::Video))
            .await
            .unwrap();
        assert!((video.aspect_ratio - 1080.0 / 1920.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn blocking_decode_still_times_out() {
        let source = MemorySource::new();
        source.insert("portfolio/stuck.mp4", avc_mp4(640, 480));
        let resolver =
            Resolver::new(&source, Some(Duration::from_millis(200))).with_decoder(slow_decode);

        let started = std::time::Instant::now();
        assert!(resolver
            .resolve(&descriptor("stuck.mp4", MediaKind::Video))
            .await
            .is_none());
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn decoder_panic_drops_the_item() {
        let source = MemorySource::new();
        source.insert("portfolio/bad.jpg", jpeg(4, 4));
        let resolver = Resolver::new(&source, None).with_decoder(panicking_decode);

        assert!(resolver
            .resolve(&descriptor("bad.jpg", MediaKind::Image))
            .await
            .is_none());
    }
}
