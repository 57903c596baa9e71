mod common;

use std::sync::Arc;

use ayah_timeline::{
    AudioMetadataCache, CoreConfig, CoreError, CoreEvent, DurationPolicy, DurationSource, EventBus,
};
use common::{MockContent, MockProbe, url_for};
use tokio_util::sync::CancellationToken;

const EDITION: &str = "ar.alafasy";

fn cache(content: &Arc<MockContent>, probe: &Arc<MockProbe>, config: &CoreConfig) -> AudioMetadataCache {
    AudioMetadataCache::new(content.clone(), probe.clone(), EventBus::default(), config)
}

#[tokio::test]
async fn concurrent_requests_for_one_key_resolve_once() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(42, EDITION, 6.5));
    let cache = cache(&content, &probe, &CoreConfig::default());

    let (a, b) = tokio::join!(
        cache.get_audio_info(42, EDITION, false),
        cache.get_audio_info(42, EDITION, false)
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(content.calls(), 1);
    assert_eq!(probe.calls(), 1);
    assert_eq!(a.duration_seconds, 6.5);
    assert_eq!(a.url, url_for(42, EDITION));
}

#[tokio::test]
async fn cached_entry_is_returned_without_refetch() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(1, EDITION, 4.0));
    let cache = cache(&content, &probe, &CoreConfig::default());

    cache.get_audio_info(1, EDITION, false).await.unwrap();
    cache.get_audio_info(1, EDITION, false).await.unwrap();

    assert_eq!(content.calls(), 1);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
}

#[tokio::test]
async fn editions_are_cached_separately() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(1, EDITION, 4.0).duration(1, "ar.husary", 5.0));
    let cache = cache(&content, &probe, &CoreConfig::default());

    let a = cache.get_audio_info(1, EDITION, false).await.unwrap();
    let b = cache.get_audio_info(1, "ar.husary", false).await.unwrap();

    assert_ne!(a.url, b.url);
    assert_eq!(content.calls(), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn forced_refetch_replaces_entry() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(7, EDITION, 3.0));
    let cache = cache(&content, &probe, &CoreConfig::default());

    let first = cache.get_audio_info(7, EDITION, false).await.unwrap();
    let second = cache.get_audio_info(7, EDITION, true).await.unwrap();

    assert_eq!(content.calls(), 2);
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &cache.cached(7, EDITION).unwrap()));
}

#[tokio::test]
async fn missing_url_is_audio_unavailable_and_not_cached() {
    let content = Arc::new(MockContent::new().missing(9));
    let probe = Arc::new(MockProbe::new());
    let cache = cache(&content, &probe, &CoreConfig::default());

    let err = cache.get_audio_info(9, EDITION, false).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::AudioUnavailable { global_number: 9, edition_id: EDITION.to_string() }
    );
    assert!(cache.cached(9, EDITION).is_none());
    assert_eq!(probe.calls(), 0);

    cache.get_audio_info(9, EDITION, false).await.unwrap_err();
    assert_eq!(content.calls(), 2);
}

#[tokio::test]
async fn failed_forced_refetch_restores_previous_entry() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(3, EDITION, 2.0).fail_from_call(1));
    let strict = CoreConfig { duration_policy: DurationPolicy::Fail, ..CoreConfig::default() };
    let cache = cache(&content, &probe, &strict);

    let original = cache.get_audio_info(3, EDITION, false).await.unwrap();
    assert!(cache.get_audio_info(3, EDITION, true).await.is_err());

    assert!(Arc::ptr_eq(&original, &cache.cached(3, EDITION).unwrap()));
    assert_eq!(probe.calls(), 2);
}

#[tokio::test]
async fn probe_failure_falls_back_by_default() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::failing());
    let cache = cache(&content, &probe, &CoreConfig::default());

    let info = cache.get_audio_info(5, EDITION, false).await.unwrap();
    assert_eq!(info.duration_seconds, 5.0);
    assert_eq!(info.duration_source, DurationSource::Fallback);
}

#[tokio::test]
async fn non_positive_duration_uses_configured_fallback() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(5, EDITION, 0.0));
    let config = CoreConfig {
        duration_policy: DurationPolicy::Fallback { seconds: 2.5 },
        ..CoreConfig::default()
    };
    let cache = cache(&content, &probe, &config);

    let info = cache.get_audio_info(5, EDITION, false).await.unwrap();
    assert_eq!(info.duration_seconds, 2.5);
    assert_eq!(info.duration_source, DurationSource::Fallback);
}

#[tokio::test]
async fn strict_policy_reports_unresolved_duration() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::failing());
    let config = CoreConfig { duration_policy: DurationPolicy::Fail, ..CoreConfig::default() };
    let cache = cache(&content, &probe, &config);

    match cache.get_audio_info(5, EDITION, false).await {
        Err(CoreError::DurationUnresolved { url, .. }) => assert_eq!(url, url_for(5, EDITION)),
        other => panic!("expected DurationUnresolved, got {other:?}"),
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn unusable_fallback_is_unresolved_not_zero_length() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::failing());
    for seconds in [0.0, -2.0, f64::NAN] {
        let config = CoreConfig {
            duration_policy: DurationPolicy::Fallback { seconds },
            ..CoreConfig::default()
        };
        let cache = cache(&content, &probe, &config);

        match cache.get_audio_info(5, EDITION, false).await {
            Err(CoreError::DurationUnresolved { url, .. }) => assert_eq!(url, url_for(5, EDITION)),
            other => panic!("expected DurationUnresolved for fallback {seconds}, got {other:?}"),
        }
        assert!(cache.is_empty());
    }
}

#[tokio::test]
async fn out_of_range_keys_are_rejected_without_lookup() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new());
    let cache = cache(&content, &probe, &CoreConfig::default());

    for (global_number, edition_id) in [(0, EDITION), (6237, EDITION), (1, ""), (1, "  ")] {
        let err = cache.get_audio_info(global_number, edition_id, false).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{global_number} {edition_id:?}: {err:?}");
    }
    assert_eq!(content.calls(), 0);
    assert_eq!(cache.stats().misses, 0);

    assert!(cache.get_audio_info(6236, EDITION, false).await.is_ok());
}

#[tokio::test]
async fn provider_error_is_data_unavailable() {
    let content = Arc::new(MockContent::new().broken(11));
    let probe = Arc::new(MockProbe::new());
    let cache = cache(&content, &probe, &CoreConfig::default());

    match cache.get_audio_info(11, EDITION, false).await {
        Err(CoreError::DataUnavailable { origin, message }) => {
            assert_eq!(origin, "audio-url");
            assert!(message.contains("upstream 500"));
        }
        other => panic!("expected DataUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn preload_isolates_failures() {
    let content = Arc::new(MockContent::new().missing(2).broken(4));
    let probe = Arc::new(MockProbe::new().duration(1, EDITION, 1.0).duration(3, EDITION, 1.0));
    let cache = cache(&content, &probe, &CoreConfig::default());

    let report = cache.preload(&[1, 2, 3, 4], EDITION).await;

    assert_eq!(report.resolved, vec![1, 3]);
    let failed: Vec<u32> = report.failed.iter().map(|(g, _)| *g).collect();
    assert_eq!(failed, vec![2, 4]);
    assert!(!report.is_complete());
    assert!(cache.cached(1, EDITION).is_some());
    assert!(cache.cached(3, EDITION).is_some());
}

#[tokio::test]
async fn preload_dedupes_against_concurrent_get() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(8, EDITION, 1.0));
    let cache = cache(&content, &probe, &CoreConfig::default());

    let (report, single) = tokio::join!(
        cache.preload(&[8, 8], EDITION),
        cache.get_audio_info(8, EDITION, false)
    );

    assert!(report.is_complete());
    assert!(single.is_ok());
    assert_eq!(content.calls(), 1);
}

#[tokio::test]
async fn clear_drops_entries_and_blocks_stale_writes() {
    let content = Arc::new(MockContent::new().delay(20, 50));
    let probe = Arc::new(MockProbe::new().duration(20, EDITION, 1.0).duration(21, EDITION, 1.0));
    let cache = cache(&content, &probe, &CoreConfig::default());

    cache.get_audio_info(21, EDITION, false).await.unwrap();
    let in_flight = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_audio_info(20, EDITION, false).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cache.clear();

    assert!(in_flight.await.unwrap().is_ok());
    assert!(cache.is_empty());
    assert!(cache.cached(20, EDITION).is_none());
}

#[tokio::test]
async fn invalidate_removes_single_entry() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new());
    let cache = cache(&content, &probe, &CoreConfig::default());

    cache.preload(&[1, 2], EDITION).await;
    cache.invalidate(1, EDITION);

    assert!(cache.cached(1, EDITION).is_none());
    assert!(cache.cached(2, EDITION).is_some());
}

#[tokio::test]
async fn audio_ready_is_emitted_per_resolution() {
    let content = Arc::new(MockContent::new());
    let probe = Arc::new(MockProbe::new().duration(42, EDITION, 6.0));
    let events = EventBus::new(8);
    let mut rx = events.subscribe();
    let cache = AudioMetadataCache::new(content, probe, events, &CoreConfig::default());

    let _ = tokio::join!(
        cache.get_audio_info(42, EDITION, false),
        cache.get_audio_info(42, EDITION, false)
    );

    match rx.try_recv() {
        Ok(CoreEvent::AudioReady { global_number, edition_id, info }) => {
            assert_eq!(global_number, 42);
            assert_eq!(edition_id, EDITION);
            assert_eq!(info.duration_seconds, 6.0);
        }
        other => panic!("expected AudioReady, got {other:?}"),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn cancelled_preload_returns_cancelled() {
    let content = Arc::new(MockContent::new().delay(1, 500));
    let probe = Arc::new(MockProbe::new());
    let cache = cache(&content, &probe, &CoreConfig::default());
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            token.cancel();
        })
    };
    let outcome = cache.preload_cancellable(&[1], EDITION, &token).await;
    canceller.await.unwrap();

    assert_eq!(outcome.unwrap_err(), CoreError::Cancelled);
    assert!(cache.cached(1, EDITION).is_none());
}
