//! Color space destruction and cache invalidation

use std::sync::{Arc, Barrier};
use std::thread;

use pigment_core::{
    ChannelDepth, ColorProfile, ColorSpace, ConversionCache, ConversionFlags, Error, Layout,
    RenderingIntent,
};
use pigment_tests::init_logging;

fn space(layout: Layout, depth: ChannelDepth, profile: ColorProfile, cache: &Arc<ConversionCache>) -> Arc<ColorSpace> {
    ColorSpace::new_with_cache(layout, depth, profile, cache)
}

#[test]
fn test_dropping_a_color_space_purges_its_transforms() {
    init_logging();
    let cache = Arc::new(ConversionCache::new());
    let srgb = space(Layout::Rgb, ChannelDepth::U16, ColorProfile::new_srgb(), &cache);
    let p3 = space(Layout::Rgb, ChannelDepth::U16, ColorProfile::new_display_p3(), &cache);
    let bt2020 = space(Layout::Rgb, ChannelDepth::U16, ColorProfile::new_bt2020(), &cache);

    let mut slot = cache.fast_path_slot();
    for (src, dst) in [(&srgb, &p3), (&p3, &srgb), (&srgb, &bt2020)] {
        let converter = cache
            .cached_converter(&mut slot, src, dst, RenderingIntent::Perceptual, ConversionFlags::default())
            .unwrap();
        let mut out = [0u16; 3];
        converter.transform_u16(&[65535, 32768, 0], &mut out).unwrap();
    }
    assert_eq!(cache.len(), 3);

    let generation = cache.generation();
    drop(p3);
    assert!(cache.generation() > generation);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&srgb, &bt2020, RenderingIntent::Perceptual, ConversionFlags::default()));
    assert_eq!(cache.stats().purged, 2);
}

#[test]
fn test_slot_revalidates_after_invalidation() {
    let cache = Arc::new(ConversionCache::new());
    let srgb = space(Layout::Rgba, ChannelDepth::F32, ColorProfile::new_srgb(), &cache);
    let p3 = space(Layout::Rgba, ChannelDepth::F32, ColorProfile::new_display_p3(), &cache);

    let mut slot = cache.fast_path_slot();
    let request = |slot: &mut _| {
        cache
            .cached_converter(slot, &srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
            .unwrap()
    };

    drop(request(&mut slot));
    drop(request(&mut slot));
    assert_eq!(slot.hits(), 1);

    // An unrelated color space dies; the cached pair stays, the slot goes stale
    drop(space(Layout::Rgba, ChannelDepth::F32, ColorProfile::new_adobe_rgb(), &cache));
    let converter = request(&mut slot);
    assert_eq!(slot.hits(), 1);
    assert_eq!(cache.stats().constructions, 1);
    assert_eq!(cache.stats().slow_path_hits, 1);

    let mut out = [0f32; 4];
    converter.transform_f32(&[1.0, 0.0, 0.0, 0.5], &mut out).unwrap();
    assert!((out[3] - 0.5).abs() < 1e-6);
}

#[test]
fn test_value_equal_replacement_reuses_transform() {
    let cache = Arc::new(ConversionCache::new());
    let srgb = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
    let p3 = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3(), &cache);
    let mut slot = cache.fast_path_slot();

    let first_id = {
        let converter = cache
            .cached_converter(&mut slot, &srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
            .unwrap();
        converter.transformation().dst_instance()
    };
    assert_eq!(first_id, p3.instance_id());

    // Same profile and layout, new instance
    let p3_again = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3(), &cache);
    let converter = cache
        .cached_converter(&mut slot, &srgb, &p3_again, RenderingIntent::Perceptual, ConversionFlags::default())
        .unwrap();
    assert_eq!(converter.transformation().dst_instance(), p3_again.instance_id());
    assert_eq!(cache.stats().constructions, 1);
    drop(converter);

    // The old instance no longer owns the transform
    drop(p3);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().purged, 0);

    drop(p3_again);
    assert!(cache.is_empty());
}

#[test]
fn test_flags_and_intent_are_part_of_the_key() {
    let cache = Arc::new(ConversionCache::new());
    let srgb = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
    let adobe = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_adobe_rgb(), &cache);

    let requests = [
        (RenderingIntent::Perceptual, ConversionFlags::default()),
        (RenderingIntent::Perceptual, ConversionFlags::default().with_bpc()),
        (RenderingIntent::AbsoluteColorimetric, ConversionFlags::default()),
        (RenderingIntent::Perceptual, ConversionFlags::default()),
    ];
    for (intent, flags) in requests {
        let converter = cache.cached_converter_locked(&srgb, &adobe, intent, flags).unwrap();
        assert_eq!(converter.transformation().intent(), intent);
        assert_eq!(converter.transformation().flags(), flags);
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.stats().slow_path_hits, 1);
}

#[test]
fn test_failed_construction_is_reported_and_not_cached() {
    let cache = Arc::new(ConversionCache::new());
    let rgb8 = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
    let rgb16 = space(Layout::Rgb, ChannelDepth::U16, ColorProfile::new_srgb(), &cache);
    let mut slot = cache.fast_path_slot();

    for _ in 0..2 {
        let result = cache.cached_converter(
            &mut slot,
            &rgb8,
            &rgb16,
            RenderingIntent::Perceptual,
            ConversionFlags::default(),
        );
        assert!(matches!(result, Err(Error::UnsupportedConversion { .. })));
    }
    assert!(cache.is_empty());
    assert!(!slot.is_populated());
    assert_eq!(cache.stats().constructions, 0);
}

#[test]
fn test_color_space_outliving_its_cache() {
    let cache = Arc::new(ConversionCache::new());
    let srgb = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
    let p3 = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3(), &cache);
    let handle = cache
        .cached_converter_locked(&srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
        .unwrap();
    drop(handle);
    drop(cache);

    // Nobody to notify any more
    drop(srgb);
    drop(p3);
}

#[test]
fn test_manual_notification_for_unregistered_color_spaces() {
    let cache = ConversionCache::new();
    let srgb = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
    let p3 = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3());

    drop(
        cache
            .cached_converter_locked(&srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
            .unwrap(),
    );
    assert_eq!(cache.len(), 1);

    cache.color_space_is_destroyed(&srgb);
    drop(srgb);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().invalidations, 1);
}

#[test]
fn test_value_equal_instances_on_many_threads_keep_their_bindings() {
    init_logging();
    const WORKERS: usize = 4;
    let cache = Arc::new(ConversionCache::new());
    let p3 = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3(), &cache);
    let all_holding = Barrier::new(WORKERS);
    let all_checked = Barrier::new(WORKERS);

    thread::scope(|scope| {
        for _ in 0..WORKERS {
            scope.spawn(|| {
                let own = space(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
                let mut slot = cache.fast_path_slot();
                let converter = cache
                    .cached_converter(&mut slot, &own, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
                    .unwrap();
                all_holding.wait();

                // Requests for value-equal instances on other threads must
                // not steal this binding
                assert_eq!(converter.transformation().src_instance(), own.instance_id());
                all_checked.wait();

                drop(converter);
                // Would fail the in-use assertion if the entry had been
                // re-pointed under another thread's handle
                drop(own);
            });
        }
    });

    assert_eq!(cache.stats().constructions, WORKERS as u64);
    assert_eq!(cache.stats().purged, WORKERS as u64);
    assert!(cache.is_empty());
}
