use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crossbeam_channel::Sender;

use crate::capture::domain::stream_recorder::{
    RecorderFactory, RecorderProfile, StreamFormat, StreamRecorder, VideoCodec,
};
use crate::shared::frame::Frame;

const DEFAULT_BIT_RATE: usize = 2_500_000;

/// Builds libvpx-backed WebM recorders.
pub struct FfmpegRecorderFactory;

impl RecorderFactory for FfmpegRecorderFactory {
    fn create(
        &self,
        profile: &RecorderProfile,
    ) -> Result<Box<dyn StreamRecorder>, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let codec_id = match profile.codec {
            VideoCodec::Vp8 => ffmpeg_next::codec::Id::VP8,
            VideoCodec::Vp9 => ffmpeg_next::codec::Id::VP9,
        };
        let codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| format!("no {:?} encoder in this ffmpeg build", profile.codec))?;
        Ok(Box::new(FfmpegStreamRecorder::new(*profile, codec)))
    }
}

struct Encoding {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    chunks: Sender<Vec<u8>>,
    /// The muxer's output file; chunks are the bytes it has grown by.
    spool: tempfile::NamedTempFile,
    delivered: u64,
    width: u32,
    height: u32,
    fps: i32,
    frames_per_chunk: usize,
    frame_count: usize,
    frames_since_chunk: usize,
}

/// Encodes RGB frames to a live WebM stream via ffmpeg-next.
///
/// The muxer writes in live mode, so it never seeks back and the chunks
/// concatenate into a playable file. A chunk is cut whenever a timeslice
/// worth of frames has been encoded.
pub struct FfmpegStreamRecorder {
    profile: RecorderProfile,
    codec: ffmpeg_next::Codec,
    encoding: Option<Encoding>,
}

// Safety: FfmpegStreamRecorder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegStreamRecorder {}

impl FfmpegStreamRecorder {
    fn new(profile: RecorderProfile, codec: ffmpeg_next::Codec) -> Self {
        Self {
            profile,
            codec,
            encoding: None,
        }
    }

    fn open(&self, format: StreamFormat, chunks: Sender<Vec<u8>>) -> Result<Encoding, Box<dyn std::error::Error>> {
        let spool = tempfile::Builder::new()
            .prefix("posecast-capture-")
            .suffix(".webm")
            .tempfile()?;
        let mut octx = ffmpeg_next::format::output_as(spool.path(), "webm")?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let mut ost = octx.add_stream(Some(self.codec))?;
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(self.codec)
            .encoder()
            .video()?;

        let fps = format.fps.round() as i32;
        let fps = if fps <= 0 { 30 } else { fps };

        encoder_ctx.set_width(format.width);
        encoder_ctx.set_height(format.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        encoder_ctx.set_bit_rate(DEFAULT_BIT_RATE);
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("deadline", "realtime");
        let encoder = encoder_ctx.open_with(options)?;
        ost.set_parameters(&encoder);

        let mut muxer_options = ffmpeg_next::Dictionary::new();
        muxer_options.set("live", "1");
        octx.write_header_with(muxer_options)?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            format.width,
            format.height,
            ffmpeg_next::format::Pixel::YUV420P,
            format.width,
            format.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let frames_per_chunk = (format.timeslice.as_secs_f64() * fps as f64).ceil().max(1.0) as usize;

        Ok(Encoding {
            octx,
            encoder,
            scaler,
            chunks,
            spool,
            delivered: 0,
            width: format.width,
            height: format.height,
            fps,
            frames_per_chunk,
            frame_count: 0,
            frames_since_chunk: 0,
        })
    }
}

impl Encoding {
    fn write_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or("recorder output stream disappeared")?
            .time_base();
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, self.fps), ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    /// Sends whatever the muxer has written since the last chunk.
    fn deliver_chunk(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let chunk = read_from(self.spool.path(), self.delivered)?;
        self.delivered += chunk.len() as u64;
        self.frames_since_chunk = 0;
        // A vanished receiver means the capture was abandoned.
        let _ = self.chunks.send(chunk);
        Ok(())
    }
}

fn read_from(path: &Path, offset: u64) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

impl StreamRecorder for FfmpegStreamRecorder {
    fn mime_type(&self) -> &str {
        self.profile.mime_type
    }

    fn start(&mut self, format: StreamFormat, chunks: Sender<Vec<u8>>) -> Result<(), Box<dyn std::error::Error>> {
        if self.encoding.is_some() {
            return Err("recorder already started".into());
        }
        self.encoding = Some(self.open(format, chunks)?);
        log::info!(
            "Recording {}x{} {} ({:?})",
            format.width,
            format.height,
            self.profile.mime_type,
            format.timeslice
        );
        Ok(())
    }

    fn record(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let enc = self.encoding.as_mut().ok_or("FfmpegStreamRecorder: not started")?;
        if frame.width() != enc.width || frame.height() != enc.height || frame.channels() != 3 {
            return Err(format!(
                "frame is {}x{}x{}, recorder expects {}x{}x3",
                frame.width(),
                frame.height(),
                frame.channels(),
                enc.width,
                enc.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            enc.width,
            enc.height,
        );
        let stride = rgb_frame.stride(0);
        let row_len = enc.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            let dst = row * stride;
            data[dst..dst + row_len].copy_from_slice(src);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        enc.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(enc.frame_count as i64));
        enc.encoder.send_frame(&yuv_frame)?;
        enc.write_packets()?;

        enc.frame_count += 1;
        enc.frames_since_chunk += 1;
        if enc.frames_since_chunk >= enc.frames_per_chunk {
            enc.deliver_chunk()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut enc) = self.encoding.take() else {
            return Ok(());
        };
        enc.encoder.send_eof()?;
        enc.write_packets()?;
        enc.octx.write_trailer()?;

        let Encoding {
            octx,
            chunks,
            spool,
            delivered,
            frame_count,
            ..
        } = enc;
        // Closing the output flushes the muxer's buffer to the spool file.
        drop(octx);
        let rest = read_from(spool.path(), delivered)?;
        let _ = chunks.send(rest);
        log::info!("Recorder stopped after {frame_count} frames");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::stream_recorder::{negotiate, NEGOTIATION_ORDER};
    use std::time::Duration;

    fn format(width: u32, height: u32) -> StreamFormat {
        StreamFormat {
            width,
            height,
            fps: 10.0,
            timeslice: Duration::from_millis(100),
        }
    }

    /// libvpx is optional in ffmpeg builds; skip when the host lacks it.
    fn recorder() -> Option<Box<dyn StreamRecorder>> {
        match negotiate(&FfmpegRecorderFactory) {
            Ok((_, recorder)) => Some(recorder),
            Err(tried) => {
                eprintln!("skipping: no WebM encoder ({tried:?})");
                None
            }
        }
    }

    #[test]
    fn test_chunks_concatenate_to_webm() {
        let Some(mut recorder) = recorder() else { return };
        let (tx, rx) = crossbeam_channel::unbounded();
        recorder.start(format(32, 24), tx).unwrap();

        for i in 0..5u8 {
            recorder.record(&Frame::filled(32, 24, [i * 40, 0, 0], i as usize)).unwrap();
        }
        recorder.stop().unwrap();

        let chunks: Vec<Vec<u8>> = rx.iter().collect();
        assert!(chunks.len() >= 2);
        let bytes = chunks.concat();
        // EBML magic
        assert_eq!(&bytes[..4], &[0x1a, 0x45, 0xdf, 0xa3]);
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let Some(mut recorder) = recorder() else { return };
        let (tx, _rx) = crossbeam_channel::unbounded();
        recorder.start(format(32, 24), tx).unwrap();

        assert!(recorder.record(&Frame::filled(16, 16, [0, 0, 0], 0)).is_err());
        recorder.stop().unwrap();
    }

    #[test]
    fn test_record_before_start_fails() {
        let Some(mut recorder) = recorder() else { return };
        assert!(recorder.record(&Frame::filled(8, 8, [0, 0, 0], 0)).is_err());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let Some(mut recorder) = recorder() else { return };
        assert!(recorder.stop().is_ok());
    }

    #[test]
    fn test_factory_reports_profile_mime() {
        for profile in NEGOTIATION_ORDER {
            if let Ok(recorder) = FfmpegRecorderFactory.create(&profile) {
                assert_eq!(recorder.mime_type(), profile.mime_type);
            }
        }
    }
}
