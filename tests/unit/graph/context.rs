use super::*;

#[test]
fn derived_contexts_leave_parent_untouched() {
    let base = RenderContext::new(Affine::scale(2.0));
    let child = base
        .with_area_of_interest(Rect::new(0.0, 0.0, 5.0, 5.0))
        .with_transform(Affine::IDENTITY);
    assert_eq!(base.transform(), Affine::scale(2.0));
    assert!(base.area_of_interest().is_none());
    assert_eq!(child.transform(), Affine::IDENTITY);
    assert_eq!(child.area_of_interest(), Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    assert!(child.without_area_of_interest().area_of_interest().is_none());
}

#[test]
fn key_tracks_transform_aoi_and_hints() {
    let a = RenderContext::identity();
    let b = a.with_transform(Affine::translate((1.0, 0.0)));
    let c = a.with_area_of_interest(Rect::new(0.0, 0.0, 1.0, 1.0));
    let d = a.with_hints(RenderHints {
        quality: Quality::Quality,
        ..RenderHints::default()
    });
    assert_ne!(a.key(), b.key());
    assert_ne!(a.key(), c.key());
    assert_ne!(a.key(), d.key());
    assert_eq!(a.key(), RenderContext::identity().key());
}

#[test]
fn key_ignores_memo_and_cache() {
    let a = RenderContext::identity();
    let b = a
        .with_fresh_memo()
        .with_tile_cache(Arc::new(TileCache::new(Default::default())));
    assert_eq!(a.key(), b.key());
}

#[test]
fn override_wins_over_declared_space() {
    let ctx = RenderContext::identity().with_hints(RenderHints {
        color_space_override: Some(ColorSpace::LinearRgb),
        ..RenderHints::default()
    });
    assert_eq!(ctx.op_space(ColorSpace::Srgb), ColorSpace::LinearRgb);
    assert_eq!(
        RenderContext::identity().op_space(ColorSpace::Srgb),
        ColorSpace::Srgb
    );
}
