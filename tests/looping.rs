use bgmloop::segment::SegmentSource;
use bgmloop::source::{adapt, compose, LoopStream, Source};
use bgmloop::AudioFormat;
use quickcheck::{quickcheck, TestResult};

use test_support::{channels, ramp, rate, read_all, read_chunked, segment, write_wav};

mod test_support;

/// The segment's samples repeated and cut to `len` samples.
fn repeated(samples: &[f32], len: usize) -> Vec<f32> {
    samples.iter().copied().cycle().take(len).collect()
}

quickcheck! {
    fn loop_output_is_segment_repeated(frames: u8, channels: u8, wanted: u16, chunk: u8) -> TestResult {
        if frames == 0 || chunk == 0 || !(1..=4).contains(&channels) {
            return TestResult::discard();
        }
        let channels = u16::from(channels);
        let buffer = ramp(channels, 44100, usize::from(frames), 0.0);
        let expected_cycle = buffer.samples().to_vec();

        let mut stream = LoopStream::new(segment(buffer)).unwrap();
        let wanted = usize::from(wanted) * usize::from(channels);
        let got = read_chunked(&mut stream, wanted, usize::from(chunk));

        TestResult::from_bool(got == repeated(&expected_cycle, wanted))
    }
}

#[test]
fn never_returns_short() {
    let mut stream = LoopStream::new(segment(ramp(2, 8000, 3, 0.0))).unwrap();
    let mut buf = vec![0.0; 1000];
    for _ in 0..10 {
        assert_eq!(stream.read(&mut buf), buf.len());
    }
    assert_eq!(stream.loops(), 10 * 1000 / 6);
}

#[test]
fn loops_a_wav_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "loop.wav", 2, 44100, 44100, -20000);
    let once = read_all(SegmentSource::open(&path).unwrap());
    assert_eq!(once.len(), 2 * 44100);

    let mut stream = compose(None, SegmentSource::open(&path).unwrap()).unwrap();
    let wanted = 2 * 100_000;
    let got = read_chunked(&mut stream, wanted, 4096);

    assert_eq!(got.len(), wanted);
    assert!(got == repeated(&once, wanted), "loop output diverges from the segment");
}

#[test]
fn wrap_lands_on_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "short_loop.wav", 1, 8000, 5, 100);
    let mut stream = LoopStream::new(SegmentSource::open(&path).unwrap()).unwrap();

    let got = read_chunked(&mut stream, 12, 5);
    let first = got[0];
    assert_eq!(got[5], first);
    assert_eq!(got[10], first);
    assert_eq!(stream.loops(), 2);
}

#[test]
fn loop_adapted_to_a_device_format_keeps_playing() {
    let looped = compose(None, segment(ramp(1, 22050, 300, 0.0))).unwrap();
    let target = AudioFormat::new(rate(48000), channels(2));
    let mut adapted = adapt(looped, target);
    assert_eq!(adapted.format(), target);

    let got = read_chunked(&mut adapted, 2 * 48000, 512);
    assert_eq!(got.len(), 2 * 48000);
    for frame in got.chunks(2) {
        assert_eq!(frame[0], frame[1]);
    }
    assert!(got.iter().all(|sample| (0.0..300.0).contains(sample)));
}
