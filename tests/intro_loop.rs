use bgmloop::segment::SegmentSource;
use bgmloop::source::{compose, ComposeError, IntroLoopStream, LoopStream, Phase, Source};
use quickcheck::{quickcheck, TestResult};
use rstest::rstest;

use test_support::{ramp, read_all, read_chunked, segment, write_wav};

mod test_support;

const INTRO_FRAMES: usize = 50;
const LOOP_FRAMES: usize = 30;
const CHANNELS: u16 = 2;

fn stitched(intro_frames: usize, loop_frames: usize) -> (IntroLoopStream, Vec<f32>, Vec<f32>) {
    let intro = ramp(CHANNELS, 44100, intro_frames, 0.0);
    let looped = ramp(CHANNELS, 44100, loop_frames, 10_000.0);
    let (intro_samples, loop_samples) = (intro.samples().to_vec(), looped.samples().to_vec());

    let stream = IntroLoopStream::new(
        segment(intro),
        LoopStream::new(segment(looped)).unwrap(),
    )
    .unwrap();
    (stream, intro_samples, loop_samples)
}

#[rstest]
fn boundary_is_sample_exact(
    #[values(1, 2, 7, 64, 99, 100, 101, 4096)] chunk: usize,
    #[values(0, 1, 13, 29)] k: usize,
) {
    let (mut stream, intro, looped) = stitched(INTRO_FRAMES, LOOP_FRAMES);
    let wanted = (INTRO_FRAMES + k) * usize::from(CHANNELS);
    let got = read_chunked(&mut stream, wanted, chunk);

    let split = INTRO_FRAMES * usize::from(CHANNELS);
    assert_eq!(got.len(), wanted);
    assert_eq!(got[..split], intro[..]);
    assert_eq!(got[split..], looped[..k * usize::from(CHANNELS)]);
}

quickcheck! {
    fn intro_then_loop(intro_frames: u8, loop_frames: u8, extra: u16, chunk: u16) -> TestResult {
        if loop_frames == 0 || chunk == 0 {
            return TestResult::discard();
        }
        let (mut stream, intro, looped) = stitched(usize::from(intro_frames), usize::from(loop_frames));
        let wanted = intro.len() + usize::from(extra);
        let got = read_chunked(&mut stream, wanted, usize::from(chunk));

        let expected: Vec<f32> = intro
            .iter()
            .copied()
            .chain(looped.iter().copied().cycle())
            .take(wanted)
            .collect();
        TestResult::from_bool(got == expected)
    }
}

#[test]
fn phase_flips_at_the_boundary() {
    let (mut stream, _, _) = stitched(INTRO_FRAMES, LOOP_FRAMES);
    let mut buf = vec![0.0; 2 * (INTRO_FRAMES - 1)];
    stream.read(&mut buf);
    assert_eq!(stream.phase(), Phase::Intro);

    let mut buf = [0.0; 2];
    stream.read(&mut buf);
    assert_eq!(stream.phase(), Phase::Loop);
}

#[test]
fn intro_and_loop_wav_files() {
    let dir = tempfile::tempdir().unwrap();
    let intro = write_wav(dir.path(), "stage_intro.wav", 2, 44100, 5000, 0);
    let looped = write_wav(dir.path(), "stage_loop.wav", 2, 44100, 3000, 12000);
    let intro_samples = read_all(SegmentSource::open(&intro).unwrap());
    let loop_samples = read_all(SegmentSource::open(&looped).unwrap());

    let mut stream = compose(
        Some(SegmentSource::open(&intro).unwrap()),
        SegmentSource::open(&looped).unwrap(),
    )
    .unwrap();
    let got = read_chunked(&mut stream, 2 * 7000, 1024);

    assert_eq!(got.len(), 2 * 7000);
    assert!(got[..2 * 5000] == intro_samples[..], "intro differs");
    assert!(got[2 * 5000..] == loop_samples[..2 * 2000], "loop start differs");
}

#[rstest]
#[case::sample_rate((2, 44100), (2, 48000))]
#[case::channels((1, 44100), (2, 44100))]
fn mismatched_formats_fail_before_reading(#[case] intro: (u16, u32), #[case] looped: (u16, u32)) {
    let dir = tempfile::tempdir().unwrap();
    let intro = write_wav(dir.path(), "a_intro.wav", intro.0, intro.1, 100, 0);
    let looped = write_wav(dir.path(), "a_loop.wav", looped.0, looped.1, 100, 0);

    let err = compose(
        Some(SegmentSource::open(&intro).unwrap()),
        SegmentSource::open(&looped).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, ComposeError::FormatMismatch { .. }), "{err:?}");
}
