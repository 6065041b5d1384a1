#[cfg(test)]
mod network_tests {
    use std::sync::Arc;
    use std::time::Duration;
    use crate::config::AppConfig;
    use crate::network::{
        EffectiveType, HttpLatencyProbe, LatencyProbe, NetworkClassifier, StaticDeviceInfo,
    };
    use crate::tests::support::*;

    fn classifier(device: StaticDeviceInfo, probe: Arc<FakeProbe>) -> NetworkClassifier {
        NetworkClassifier::new(
            Arc::new(device),
            probe,
            Duration::from_millis(150),
            Duration::from_millis(3000),
        )
    }

    #[tokio::test]
    async fn test_desktop_without_metadata_is_wifi_without_probing() {
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::RoundTrip(Duration::from_millis(900))));
        let profile = classifier(StaticDeviceInfo::desktop(), probe.clone()).classify().await;

        assert!(!profile.is_cellular);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_metadata_takes_precedence_over_probe() {
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::RoundTrip(Duration::from_millis(10))));
        let profile = classifier(cellular_device(EffectiveType::TwoG), probe.clone())
            .classify()
            .await;

        assert!(profile.is_cellular);
        assert_eq!(profile.effective_type, EffectiveType::TwoG);
        assert_eq!(profile.round_trip_ms, Some(1800.0));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_mobile_probe_below_threshold_is_wifi() {
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::RoundTrip(Duration::from_millis(40))));
        let profile = classifier(StaticDeviceInfo::new(true, None), probe.clone())
            .classify()
            .await;

        assert!(!profile.is_cellular);
        assert_eq!(profile.effective_type, EffectiveType::Unknown);
        assert_eq!(profile.round_trip_ms, Some(40.0));
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_mobile_probe_above_threshold_is_cellular() {
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::RoundTrip(Duration::from_millis(420))));
        let profile = classifier(StaticDeviceInfo::new(true, None), probe)
            .classify()
            .await;

        assert!(profile.is_cellular);
        assert_eq!(profile.round_trip_ms, Some(420.0));
    }

    #[tokio::test]
    async fn test_failed_probe_assumes_cellular() {
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::Fail("dns failure".to_string())));
        let profile = classifier(StaticDeviceInfo::new(true, None), probe)
            .classify()
            .await;

        assert!(profile.is_cellular);
        assert_eq!(profile.effective_type, EffectiveType::Unknown);
        assert!(profile.round_trip_ms.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out_as_cellular() {
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::Hang));
        let started = tokio::time::Instant::now();

        let profile = classifier(StaticDeviceInfo::new(true, None), probe)
            .classify()
            .await;

        assert!(profile.is_cellular);
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(started.elapsed() < Duration::from_millis(3100));
    }

    #[tokio::test]
    async fn test_configured_device_metadata_classifies() {
        let mut config = AppConfig::default();
        config.device.mobile = true;
        config.device.effective_type = Some("slow-2g".to_string());

        let probe = Arc::new(FakeProbe::new(ProbeOutcome::RoundTrip(Duration::from_millis(10))));
        let profile = classifier(config.to_device_info(), probe.clone()).classify().await;

        assert!(profile.is_cellular);
        assert_eq!(profile.effective_type, EffectiveType::Slow2g);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_http_probe_reports_unreachable_endpoint() {
        // Port 9 (discard) is closed on test machines
        let probe = HttpLatencyProbe::new("http://127.0.0.1:9/health", Duration::from_millis(500)).unwrap();
        assert!(probe.round_trip().await.is_err());
    }
}
