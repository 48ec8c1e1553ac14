//! Request/answer/timeout behaviour of the oxygen probe driver over mock links.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cell_core::error::CellError;
use cell_core::mocks::{GatedClock, MockProbe, ProbeMode};
use cell_core::{ProbeCfg, ProbeDriver};
use cell_traits::MonotonicClock;
use cell_traits::clock::test_clock::TestClock;
use rstest::rstest;

fn cfg() -> ProbeCfg {
    ProbeCfg {
        vendor_id: 0x0B1E,
        product_id: 0x0001,
        response_timeout: Duration::from_secs(3),
        poll: Duration::from_millis(5),
    }
}

fn driver(probe: &MockProbe, clock: Arc<dyn cell_traits::Clock>) -> ProbeDriver {
    ProbeDriver::new(probe.connector(), cfg(), clock)
}

fn answering(status: u32) -> ProbeMode {
    ProbeMode::Answer {
        phase: 30.5,
        temperature_k: 298.15,
        pressure_hpa: 1001.5,
        status,
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn measure_before_connect_is_rejected() {
    let probe = MockProbe::new(ProbeMode::nominal());
    let d = driver(&probe, Arc::new(MonotonicClock::new()));
    assert_eq!(d.get_measure().unwrap_err(), CellError::ProbeNotConnected);
    assert!(probe.sent().is_empty());
}

#[test]
fn unplugged_probe_fails_to_connect() {
    let probe = MockProbe::new(ProbeMode::nominal()).unplugged();
    let d = driver(&probe, Arc::new(MonotonicClock::new()));
    assert!(matches!(d.connect(), Err(CellError::ProbeConnect(_))));
    assert!(!d.is_connected());
}

#[test]
fn malformed_serial_fails_to_connect() {
    let probe = MockProbe::new(ProbeMode::nominal()).with_serial("FBX-xyz");
    let d = driver(&probe, Arc::new(MonotonicClock::new()));
    assert!(matches!(d.connect(), Err(CellError::InvalidSerial(_))));
}

#[test]
fn answer_is_decoded_into_si_units() {
    let probe = MockProbe::new(answering(0));
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.connect().unwrap();

    let a = d.get_measure().unwrap();
    assert_eq!(a.phase, 30.5);
    assert!((a.temperature_c - 25.0).abs() < 1e-9);
    assert!((a.pressure_pa - 100_150.0).abs() < 1e-6);
    assert!(a.errors.is_empty());
    clock.release();
}

#[test]
fn request_frames_carry_device_id_and_consecutive_ids() {
    let probe = MockProbe::new(answering(0));
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.connect().unwrap();
    assert_eq!(d.next_request_id(), Some(0));

    d.get_measure().unwrap();
    d.get_measure().unwrap();
    assert_eq!(d.next_request_id(), Some(2));

    let sent = probe.sent();
    assert_eq!(sent.len(), 4);
    let (header, footer) = (&sent[2], &sent[3]);
    assert_eq!(header.len(), 48);
    assert_eq!(&header[..3], &[0xFF, 0x01, 0x01]);
    // "FBX-00001234": 1234 = 0x04D2
    assert_eq!(&header[3..7], &[0x00, 0xD2, 0x04, 0x00]);
    assert_eq!(&header[40..42], &[0x10, 0x00]);
    assert_eq!(&header[42..44], &1u16.to_le_bytes());
    assert_eq!(footer, &vec![0xFF, 0x02, 0x01, 0x00]);
    clock.release();
    clock.release();
}

#[test]
fn silent_probe_times_out_and_latches() {
    let probe = MockProbe::new(ProbeMode::Silent);
    let d = driver(&probe, Arc::new(TestClock::new()));
    d.connect().unwrap();

    assert_eq!(d.get_measure().unwrap_err(), CellError::ProbeTimeout(3000));
    assert!(d.is_critical());

    // latched: no further traffic until reconnect
    let before = probe.sent().len();
    assert_eq!(d.get_measure().unwrap_err(), CellError::ProbeCritical);
    assert_eq!(probe.sent().len(), before);
}

#[test]
fn late_watcher_does_not_latch_after_answer() {
    let probe = MockProbe::new(ProbeMode::nominal());
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.connect().unwrap();

    d.get_measure().unwrap();
    assert!(wait_until(|| clock.sleepers() == 1));
    clock.release();
    assert!(wait_until(|| clock.sleepers() == 0));
    std::thread::sleep(Duration::from_millis(20));

    assert!(!d.is_critical());
    assert!(d.get_measure().is_ok());
    clock.release();
}

#[test]
fn stale_watcher_cannot_time_out_a_newer_request() {
    let probe = MockProbe::new(ProbeMode::nominal());
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.connect().unwrap();

    d.get_measure().unwrap();
    probe.set_mode(ProbeMode::Silent);

    let d = Arc::new(d);
    let worker = {
        let d = d.clone();
        std::thread::spawn(move || d.get_measure())
    };
    assert!(wait_until(|| clock.sleepers() == 2));
    // wakes one watcher; only the second request's watcher may deliver
    clock.release();
    clock.release();
    let result = worker.join().unwrap();
    assert_eq!(result.unwrap_err(), CellError::ProbeTimeout(3000));
}

#[rstest]
#[case::temp_bit_ignored(false, 0b1, true)]
#[case::temp_bit_fatal(true, 0b1, false)]
#[case::other_bit(false, 0b100, false)]
fn status_bits_follow_enable_temp(#[case] enable: bool, #[case] bits: u32, #[case] ok: bool) {
    let probe = MockProbe::new(answering(bits));
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.set_enable_temp_fibox(enable);
    d.connect().unwrap();

    let r = d.get_measure();
    assert_eq!(r.is_ok(), ok, "{r:?}");
    assert_eq!(d.is_critical(), !ok);
    if let Err(e) = r {
        assert!(matches!(e, CellError::ProbeSensorFault(_)));
    }
    clock.release();
}

#[test]
fn sensor_fault_lists_every_flag() {
    let probe = MockProbe::new(answering(0b101));
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.set_enable_temp_fibox(true);
    d.connect().unwrap();

    let CellError::ProbeSensorFault(msg) = d.get_measure().unwrap_err() else {
        panic!("expected a sensor fault");
    };
    assert!(msg.contains("(code 1)"), "{msg}");
    assert!(msg.contains("(code 4)"), "{msg}");
    clock.release();
}

#[test]
fn broken_link_latches_on_send() {
    let probe = MockProbe::new(ProbeMode::Broken);
    let d = driver(&probe, Arc::new(TestClock::new()));
    d.connect().unwrap();

    assert!(matches!(
        d.get_measure(),
        Err(CellError::BusFault { sensor: "probe", .. })
    ));
    assert!(d.is_critical());
}

#[test]
fn reconnect_clears_the_latch() {
    let probe = MockProbe::new(ProbeMode::Broken);
    let clock = GatedClock::new();
    let d = driver(&probe, Arc::new(clock.clone()));
    d.connect().unwrap();
    assert!(d.get_measure().is_err());
    assert!(d.is_critical());

    probe.set_mode(ProbeMode::nominal());
    d.connect().unwrap();
    assert!(!d.is_critical());
    assert_eq!(d.next_request_id(), Some(0));
    assert!(d.get_measure().is_ok());
    clock.release();
}
