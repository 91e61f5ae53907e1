use std::sync::atomic::AtomicUsize;
use std::thread;
use std::time::Duration;

use super::*;
use crate::foundation::core::{Affine, Color, PixelRect};
use crate::ops::{Composite, CompositeRule, Flood, GaussianBlur, Offset, PaintLeaf, Pad};
use crate::raster::surface::PaintSource;

fn flood(x0: f64, y0: f64, x1: f64, y1: f64) -> Filter {
    Filter::leaf(
        Flood::new(Rect::new(x0, y0, x1, y1), Color::WHITE)
            .unwrap()
            .into(),
    )
    .unwrap()
}

#[derive(Debug, Default)]
struct Counting {
    calls: AtomicUsize,
}

impl PaintSource for Counting {
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, 4.0, 4.0)
    }

    fn paint(&self, target: &mut Raster, _transform: Affine) -> FilterResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rect = target.rect();
        for y in rect.y..rect.y1() {
            for x in rect.x..rect.x1() {
                target.set_pixel(x, y, [255; 4]);
            }
        }
        Ok(())
    }
}

#[test]
fn mutators_strictly_advance_the_timestamp() {
    let a = flood(0.0, 0.0, 4.0, 4.0);
    let f = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![a]).unwrap();
    let mut last = f.local_timestamp();
    let mut check = |f: &Filter| {
        let now = f.local_timestamp();
        assert!(now > last, "{now} <= {last}");
        last = now;
    };

    f.set_source(0, flood(0.0, 0.0, 2.0, 2.0)).unwrap();
    check(&f);
    f.set_sources(vec![flood(1.0, 1.0, 2.0, 2.0)]).unwrap();
    check(&f);
    f.set_operator(Offset::new(2.0, 2.0).unwrap().into()).unwrap();
    check(&f);
    f.set_property("name", serde_json::json!("shifted"));
    check(&f);
    f.remove_property("name");
    check(&f);
    f.touch();
    check(&f);
}

#[test]
fn upstream_changes_advance_the_effective_timestamp() {
    let leaf = flood(0.0, 0.0, 4.0, 4.0);
    let f = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![leaf.clone()]).unwrap();
    let before = f.timestamp();
    let local = f.local_timestamp();
    leaf.touch();
    assert!(f.timestamp() > before);
    assert_eq!(f.local_timestamp(), local);
}

#[test]
fn bounds_follow_source_replacement() {
    let f = Filter::new(
        Composite::over().into(),
        vec![flood(0.0, 0.0, 4.0, 4.0), flood(2.0, 2.0, 8.0, 6.0)],
    )
    .unwrap();
    assert_eq!(f.bounds(), Rect::new(0.0, 0.0, 8.0, 6.0));
    f.set_source(1, flood(-2.0, 0.0, 1.0, 1.0)).unwrap();
    assert_eq!(f.bounds(), Rect::new(-2.0, 0.0, 4.0, 4.0));
    f.set_operator(Composite::new(CompositeRule::In).unwrap().into()).unwrap();
    assert_eq!(f.bounds(), Rect::new(0.0, 0.0, 1.0, 1.0));
}

#[test]
fn source_index_out_of_range_is_reported() {
    let f = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![flood(0.0, 0.0, 1.0, 1.0)])
        .unwrap();
    let err = f.set_source(1, flood(0.0, 0.0, 1.0, 1.0)).unwrap_err();
    assert!(matches!(
        err,
        FilterError::SourceIndexOutOfRange { index: 1, len: 1 }
    ));
    assert!(f.dirty_region(3, Rect::new(0.0, 0.0, 1.0, 1.0)).is_err());
}

#[test]
fn arity_is_enforced_on_every_change() {
    let blur = GaussianBlur::new(1.0, 1.0).unwrap();
    assert!(Filter::new(blur.into(), vec![]).is_err());
    let f = Filter::new(blur.into(), vec![flood(0.0, 0.0, 1.0, 1.0)]).unwrap();
    let stamp = f.local_timestamp();
    assert!(f.set_sources(vec![]).is_err());
    assert_eq!(f.local_timestamp(), stamp);
    assert_eq!(f.sources().len(), 1);
    assert!(Filter::new(Operator::Deferred, vec![]).is_err());
}

#[test]
fn properties_delegate_to_sources() {
    let leaf = flood(0.0, 0.0, 1.0, 1.0);
    leaf.set_property("label", serde_json::json!("base"));
    let f = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![leaf]).unwrap();
    assert_eq!(f.property("label"), Some(serde_json::json!("base")));
    f.set_property("label", serde_json::json!("top"));
    assert_eq!(f.property("label"), Some(serde_json::json!("top")));
    assert_eq!(f.property_names(), vec!["label".to_owned()]);
    assert_eq!(f.remove_property("label"), Some(serde_json::json!("top")));
    assert_eq!(f.property("label"), Some(serde_json::json!("base")));
    assert_eq!(f.property("missing"), None);
}

#[test]
fn cycles_are_rejected() {
    let leaf = flood(0.0, 0.0, 1.0, 1.0);
    let a = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![leaf]).unwrap();
    let b = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![a.clone()]).unwrap();
    assert!(a.set_source(0, b.clone()).is_err());
    assert!(a.set_sources(vec![a.clone()]).is_err());
    assert_eq!(b.bounds(), Rect::new(2.0, 0.0, 3.0, 1.0));
}

#[test]
fn deferred_blocks_until_bound_from_another_thread() {
    let slot = Filter::deferred();
    let crop = Pad::crop(Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
    let top = Filter::new(crop.into(), vec![slot.clone()]).unwrap();
    assert!(slot.is_deferred());
    assert!(!slot.is_bound());

    let reader = {
        let top = top.clone();
        thread::spawn(move || top.render(&RenderContext::identity()))
    };
    thread::sleep(Duration::from_millis(20));
    let binder = {
        let slot = slot.clone();
        thread::spawn(move || slot.bind_deferred(flood(0.0, 0.0, 4.0, 4.0)))
    };
    assert!(binder.join().unwrap().unwrap());
    let out = reader.join().unwrap().unwrap().unwrap();
    assert_eq!(out.rect(), PixelRect::new(0, 0, 2, 2));
    assert!(slot.is_bound());
    assert_eq!(slot.bounds(), Rect::new(0.0, 0.0, 4.0, 4.0));

    // Single assignment: a second bind changes nothing.
    assert!(!slot.bind_deferred(flood(0.0, 0.0, 9.0, 9.0)).unwrap());
    assert_eq!(slot.bounds(), Rect::new(0.0, 0.0, 4.0, 4.0));
}

#[test]
fn deferred_rejects_cycles_and_plain_nodes() {
    let slot = Filter::deferred();
    let wrapper = Filter::new(Offset::new(1.0, 0.0).unwrap().into(), vec![slot.clone()]).unwrap();
    assert!(slot.bind_deferred(wrapper).is_err());
    assert!(!slot.is_bound());
    assert!(flood(0.0, 0.0, 1.0, 1.0)
        .bind_deferred(flood(0.0, 0.0, 1.0, 1.0))
        .is_err());
}

#[test]
fn shared_source_renders_once_per_call() {
    let painter = Arc::new(Counting::default());
    let shared = Filter::leaf(PaintLeaf::new(painter.clone()).into()).unwrap();
    let f = Filter::new(Composite::over().into(), vec![shared.clone(), shared]).unwrap();

    let ctx = RenderContext::identity().with_fresh_memo();
    let out = f.render(&ctx).unwrap().unwrap();
    assert_eq!(out.pixel(1, 1), [255; 4]);
    assert_eq!(painter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.memo().map(|m| m.hits()), Some(1));

    // A fresh call starts a fresh memo.
    f.render(&RenderContext::identity()).unwrap();
    assert_eq!(painter.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn frozen_graph_renders_identically() {
    let f = Filter::new(
        GaussianBlur::new(1.5, 0.5).unwrap().into(),
        vec![flood(0.0, 0.0, 6.0, 6.0)],
    )
    .unwrap();
    let ctx = RenderContext::new(Affine::rotate(0.3).then_scale(1.5));
    let a = f.render(&ctx).unwrap().unwrap();
    let b = f.render(&ctx).unwrap().unwrap();
    assert_eq!(a.rect(), b.rect());
    assert_eq!(a.data(), b.data());
}
