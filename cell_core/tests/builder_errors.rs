use std::time::Duration;

use cell_core::error::BuildError;
use cell_core::mocks::{MockProbe, ProbeMode, ScriptedCo2};
use cell_core::{MeasureModule, SamplingCfg};
use rstest::rstest;

#[rstest]
fn missing_co2_sensor_yields_typed_build_error() {
    let err = MeasureModule::builder()
        .with_probe(MockProbe::new(ProbeMode::nominal()).connector())
        .try_build()
        .err()
        .expect("should fail with MissingCo2Sensor");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingCo2Sensor) => {}
        other => panic!("expected MissingCo2Sensor, got: {other:?}"),
    }
}

#[rstest]
fn missing_probe_yields_typed_build_error() {
    let err = MeasureModule::builder()
        .with_co2_sensor(ScriptedCo2::new(0.04, 20.0))
        .try_build()
        .err()
        .expect("should fail with MissingProbe");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingProbe)
    ));
}

#[rstest]
#[case::small_window(SamplingCfg { n_sample: 2, ..SamplingCfg::default() })]
#[case::zero_replicas(SamplingCfg { replicas: [1, 1, 0, 1, 1, 1], ..SamplingCfg::default() })]
#[case::zero_period(SamplingCfg { sensor_period: Duration::ZERO, ..SamplingCfg::default() })]
fn invalid_sampling_is_rejected(#[case] sampling: SamplingCfg) {
    let err = MeasureModule::builder()
        .with_co2_sensor(ScriptedCo2::new(0.04, 20.0))
        .with_probe(MockProbe::new(ProbeMode::nominal()).connector())
        .with_sampling(sampling)
        .try_build()
        .err()
        .expect("invalid sampling must be rejected");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn config_file_values_reach_the_module() {
    let cfg = cell_config::load_toml(
        r#"
        [calibration]
        altitude = 0
        enable_temp_fibox = true
        "#,
    )
    .unwrap();
    let m = MeasureModule::builder()
        .from_config(&cfg)
        .with_co2_sensor(ScriptedCo2::new(0.04, 20.0))
        .with_probe(MockProbe::new(ProbeMode::nominal()).connector())
        .try_build()
        .unwrap();

    assert_eq!(m.config().altitude, 0.0);
    assert!(m.config().enable_temp_fibox);
    assert!(m.probe().enable_temp_fibox());
}
