//! Many workers sharing one conversion cache

use std::sync::Arc;
use std::thread;

use pigment_core::{
    ChannelDepth, ColorProfile, ColorSpace, ConversionCache, ConversionFlags, Layout,
    RenderingIntent,
};
use pigment_tests::init_logging;
use rayon::prelude::*;

const INTENTS: [RenderingIntent; 2] = [RenderingIntent::Perceptual, RenderingIntent::RelativeColorimetric];

fn rgba8(profile: ColorProfile, cache: &Arc<ConversionCache>) -> Arc<ColorSpace> {
    ColorSpace::new_with_cache(Layout::Rgba, ChannelDepth::U8, profile, cache)
}

#[test]
fn test_parallel_lookups_build_each_transform_once() {
    init_logging();
    let cache = Arc::new(ConversionCache::new());
    let srgb = rgba8(ColorProfile::new_srgb(), &cache);
    let p3 = rgba8(ColorProfile::new_display_p3(), &cache);

    let outputs: Vec<[u8; 4]> = (0..2000)
        .into_par_iter()
        .map_init(
            || cache.fast_path_slot(),
            |slot, i| {
                let (src, dst) = if i % 2 == 0 { (&srgb, &p3) } else { (&p3, &srgb) };
                let intent = INTENTS[(i / 2) % INTENTS.len()];
                let converter = cache
                    .cached_converter(slot, src, dst, intent, ConversionFlags::default())
                    .unwrap();
                let mut out = [0u8; 4];
                converter.transform(&[200, 100, 50, 255], &mut out).unwrap();
                out
            },
        )
        .collect();

    // Two directions times two intents
    let stats = cache.stats();
    assert_eq!(stats.constructions, 4);
    assert_eq!(cache.len(), 4);
    assert!(outputs.iter().all(|px| px[3] == 255));

    // Same request, same answer, whichever worker served it
    for (i, px) in outputs.iter().enumerate().skip(4) {
        assert_eq!(*px, outputs[i % 4], "request {i}");
    }
}

#[test]
fn test_handles_outlive_the_call_on_other_threads() {
    let cache = Arc::new(ConversionCache::new());
    let srgb = rgba8(ColorProfile::new_srgb(), &cache);
    let adobe = rgba8(ColorProfile::new_adobe_rgb(), &cache);

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let mut slot = cache.fast_path_slot();
                let mut held = Vec::new();
                for _ in 0..50 {
                    held.push(
                        cache
                            .cached_converter(
                                &mut slot,
                                &srgb,
                                &adobe,
                                RenderingIntent::Perceptual,
                                ConversionFlags::default(),
                            )
                            .unwrap(),
                    );
                }
                assert!(held.iter().all(|h| h.shares_transform_with(&held[0])));
                assert!(slot.hits() >= 49);
            });
        }
    });

    let mut slot = cache.fast_path_slot();
    let handle = cache
        .cached_converter(&mut slot, &srgb, &adobe, RenderingIntent::Perceptual, ConversionFlags::default())
        .unwrap();
    // Every worker's handles have been dropped
    assert_eq!(handle.live_uses(), 1);
    assert_eq!(cache.stats().constructions, 1);
}

#[test]
fn test_destruction_races_with_lookups() {
    init_logging();
    let cache = Arc::new(ConversionCache::new());
    let srgb = rgba8(ColorProfile::new_srgb(), &cache);
    let p3 = rgba8(ColorProfile::new_display_p3(), &cache);
    let churn_profiles = [
        ColorProfile::new_adobe_rgb(),
        ColorProfile::new_bt2020(),
        ColorProfile::new_pro_photo_rgb(),
    ];

    thread::scope(|scope| {
        // Long-lived pair, converted continuously
        for _ in 0..4 {
            scope.spawn(|| {
                let mut slot = cache.fast_path_slot();
                for _ in 0..500 {
                    let converter = cache
                        .cached_converter(&mut slot, &srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
                        .unwrap();
                    let mut out = [0u8; 4];
                    converter.transform(&[10, 20, 30, 255], &mut out).unwrap();
                    assert_eq!(converter.transformation().src_instance(), srgb.instance_id());
                }
            });
        }

        // Short-lived color spaces, each profile owned by one thread
        for profile in &churn_profiles {
            let (cache, srgb) = (&cache, &srgb);
            scope.spawn(move || {
                let mut slot = cache.fast_path_slot();
                for _ in 0..50 {
                    let temp = rgba8(profile.clone(), cache);
                    {
                        let converter = cache
                            .cached_converter(
                                &mut slot,
                                srgb,
                                &temp,
                                RenderingIntent::Perceptual,
                                ConversionFlags::default(),
                            )
                            .unwrap();
                        assert_eq!(converter.transformation().dst_instance(), temp.instance_id());
                    }
                    drop(temp);
                }
            });
        }
    });

    // Only the long-lived pair survives
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default()));
    let stats = cache.stats();
    assert_eq!(stats.purged, 150);
    assert!(stats.invalidations >= 150);
}
