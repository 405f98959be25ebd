//! Document lifecycle tests against software views.

use proptest::prelude::*;
use voxatlas::*;

const COUNT: UVec3 = UVec3::new(16, 12, 6);

fn blank() -> VoxelBuffer<u8> {
    VoxelBuffer::zeroed(COUNT, 1).unwrap()
}

fn brush(radius: u32) -> Options {
    let mut options = Options::default();
    options.brush.radius = radius;
    options.brush.value = 7.0;
    options
}

fn flat_index(x: u32, y: u32, z: u32) -> usize {
    ((z * COUNT.y + y) * COUNT.x + x) as usize
}

#[test]
fn test_stroke_reaches_every_view() {
    init_logging();
    let mut doc = VolumeDocument::load(&blank(), brush(1)).unwrap();
    let primary = doc.add_cpu_view().unwrap();
    let secondary = doc.add_cpu_view().unwrap();
    doc.render_all().unwrap();

    doc.begin_stroke(ViewAxis::Axial, IVec3::new(3, 3, 2)).unwrap();
    doc.continue_stroke(IVec3::new(10, 3, 2));
    assert!(doc.finish_stroke(IVec3::new(10, 8, 2)).unwrap());

    let outcome = doc.render(primary).unwrap();
    assert!(outcome.points_drawn > 0);
    assert!(!outcome.queue_cleared);
    assert!(!doc.surface().pending_edits().is_empty());

    let outcome = doc.render(secondary).unwrap();
    assert!(outcome.queue_cleared);
    assert!(doc.surface().pending_edits().is_empty());
    assert!(doc.surface().is_cpu_stale());

    let labels = doc.export().unwrap();
    assert!(!doc.surface().is_cpu_stale());
    assert_eq!(labels.data()[flat_index(3, 3, 2)], 7);
    assert_eq!(labels.data()[flat_index(10, 8, 2)], 7);
    assert_eq!(labels.data()[flat_index(3, 3, 1)], 0);
    let stats = doc.surface().consumer_stats(primary).unwrap();
    assert_eq!(stats.read_backs, 1);
}

#[test]
fn test_late_view_gets_full_push() {
    let mut doc = VolumeDocument::load(&blank(), brush(0)).unwrap();
    doc.begin_stroke(ViewAxis::Coronal, IVec3::new(2, 5, 1)).unwrap();
    doc.finish_stroke(IVec3::new(2, 5, 1)).unwrap();

    let view = doc.add_cpu_view().unwrap();
    let outcome = doc.render(view).unwrap();
    assert!(outcome.full_push);
    assert_eq!(doc.voxel(IVec3::new(2, 5, 1)).unwrap().unwrap()[0], 7);
}

#[test]
fn test_undo_and_redo() {
    let mut doc = VolumeDocument::load(&blank(), brush(2)).unwrap();
    let view = doc.add_cpu_view().unwrap();

    doc.begin_stroke(ViewAxis::Sagittal, IVec3::new(4, 6, 3)).unwrap();
    doc.continue_stroke(IVec3::new(4, 2, 1));
    doc.finish_stroke(IVec3::new(4, 2, 1)).unwrap();
    doc.render(view).unwrap();

    let records = doc.take_undo_records();
    assert_eq!(records.len(), 1);
    assert!(doc.undo_records().is_empty());
    let record = &records[0];
    assert_eq!(record.view_axis, ViewAxis::Sagittal);
    assert_eq!(record.slice_number, 4);

    doc.apply_undo(record).unwrap();
    doc.render(view).unwrap();
    assert!(doc.export().unwrap().data().iter().all(|&v| v == 0));

    doc.apply_redo(record).unwrap();
    doc.render(view).unwrap();
    assert_eq!(doc.slice(ViewAxis::Sagittal, 4).unwrap(), record.after);
    assert_eq!(doc.voxel(IVec3::new(4, 6, 3)).unwrap().unwrap()[0], 7);
}

#[test]
fn test_second_begin_is_ignored() {
    let mut doc = VolumeDocument::load(&blank(), brush(0)).unwrap();
    assert!(doc.begin_stroke(ViewAxis::Axial, IVec3::new(1, 1, 0)).unwrap());
    assert!(!doc.begin_stroke(ViewAxis::Axial, IVec3::new(8, 8, 0)).unwrap());
    doc.finish_stroke(IVec3::new(1, 1, 0)).unwrap();
    assert!(!doc.finish_stroke(IVec3::new(1, 1, 0)).unwrap());
    assert!(!doc.continue_stroke(IVec3::new(2, 2, 0)));
    assert_eq!(doc.voxel(IVec3::new(8, 8, 0)).unwrap().unwrap()[0], 0);
}

#[test]
fn test_abort_leaves_volume_untouched() {
    let mut doc = VolumeDocument::load(&blank(), brush(3)).unwrap();
    let view = doc.add_cpu_view().unwrap();
    doc.begin_stroke(ViewAxis::Axial, IVec3::new(8, 6, 5)).unwrap();
    doc.render(view).unwrap();
    doc.continue_stroke(IVec3::new(12, 9, 5));
    assert!(doc.abort_stroke());
    doc.render(view).unwrap();
    assert!(doc.export().unwrap().data().iter().all(|&v| v == 0));
    assert!(doc.undo_records().is_empty());
}

#[test]
fn test_abort_without_undo_converges_all_views() {
    let mut options = brush(2);
    options.brush.track_undo = false;
    let mut doc = VolumeDocument::load(&blank(), options).unwrap();
    let first = doc.add_cpu_view().unwrap();
    let second = doc.add_cpu_view().unwrap();
    doc.render_all().unwrap();

    doc.begin_stroke(ViewAxis::Axial, IVec3::new(8, 6, 2)).unwrap();
    doc.continue_stroke(IVec3::new(11, 8, 2));
    doc.render(first).unwrap();
    assert!(doc.abort_stroke());
    doc.render_all().unwrap();

    let pixels = |index: usize| {
        doc.surface()
            .consumer(index)
            .unwrap()
            .surface()
            .read_pixels()
            .unwrap()
    };
    let first_pixels = pixels(first);
    assert_eq!(first_pixels, pixels(second));
    assert!(first_pixels.iter().all(|&v| v == 0));
    assert!(doc.export().unwrap().data().iter().all(|&v| v == 0));
}

#[test]
fn test_smart_brush_through_document() {
    let mut options = brush(0);
    options.smart_brush = Some(SmartBrushOptions {
        seed_threshold: 20.0,
        neighbor_threshold: 15.0,
    });
    let mut doc = VolumeDocument::load(&blank(), options).unwrap();

    // A bright 3x3x3 block centered on (8, 6, 3).
    let intensity: Vec<f32> = (0..COUNT.element_product())
        .map(|i| {
            let x = i % COUNT.x;
            let y = (i / COUNT.x) % COUNT.y;
            let z = i / (COUNT.x * COUNT.y);
            if (7..=9).contains(&x) && (5..=7).contains(&y) && (2..=4).contains(&z) {
                180.0
            } else {
                20.0
            }
        })
        .collect();
    doc.attach_intensity(&VoxelBuffer::new(COUNT, 1, intensity).unwrap())
        .unwrap();

    doc.begin_stroke(ViewAxis::Coronal, IVec3::new(8, 6, 3)).unwrap();
    doc.finish_stroke(IVec3::new(8, 6, 3)).unwrap();

    // The coronal plane y = 6 holds a 3x3 patch of the block.
    let labels = doc.export().unwrap();
    let painted: Vec<_> = (0..COUNT.z)
        .flat_map(|z| (0..COUNT.x).map(move |x| (x, z)))
        .filter(|&(x, z)| labels.data()[flat_index(x, 6, z)] == 7)
        .collect();
    assert_eq!(painted.len(), 9);
    assert!(painted
        .iter()
        .all(|&(x, z)| (7..=9).contains(&x) && (2..=4).contains(&z)));
    assert_eq!(labels.data()[flat_index(8, 5, 3)], 0);
}

#[test]
fn test_smart_brush_needs_intensity() {
    let mut options = brush(0);
    options.smart_brush = Some(SmartBrushOptions {
        seed_threshold: 100.0,
        neighbor_threshold: 100.0,
    });
    let mut doc = VolumeDocument::load(&blank(), options).unwrap();
    doc.begin_stroke(ViewAxis::Axial, IVec3::new(2, 2, 2)).unwrap();
    doc.finish_stroke(IVec3::new(2, 2, 2)).unwrap();
    let labels = doc.export().unwrap();
    assert_eq!(labels.data().iter().filter(|&&v| v == 7).count(), 1);
}

#[test]
fn test_slice_errors() {
    let mut doc = VolumeDocument::load(&blank(), Options::default()).unwrap();
    assert!(matches!(
        doc.slice(ViewAxis::Axial, 6),
        Err(AtlasError::OutOfRange {
            axis: ViewAxis::Axial,
            index: 6,
            depth: 6
        })
    ));
    assert!(matches!(
        doc.set_slice(ViewAxis::Coronal, 0, Some(&[1, 2, 3])),
        Err(AtlasError::SizeMismatch { expected: 96, actual: 3 })
    ));
    assert!(matches!(
        doc.begin_stroke(ViewAxis::Sagittal, IVec3::new(16, 0, 0)),
        Err(AtlasError::OutOfRange { .. })
    ));
}

#[test]
fn test_options_from_json() {
    let options = Options::from_json(
        r#"{ "brush": { "radius": 0, "value": 3.0, "merge": "Add" }, "slice_cache": false }"#,
    )
    .unwrap();
    let mut doc = VolumeDocument::load(&blank(), options).unwrap();
    assert!(!doc.options().slice_cache);

    for _ in 0..2 {
        doc.begin_stroke(ViewAxis::Axial, IVec3::new(0, 0, 0)).unwrap();
        doc.finish_stroke(IVec3::new(0, 0, 0)).unwrap();
    }
    assert_eq!(doc.voxel(IVec3::ZERO).unwrap().unwrap()[0], 6);
    doc.slice(ViewAxis::Coronal, 0).unwrap();
    assert!(!doc.surface().is_slice_cached(ViewAxis::Coronal, 0));
}

#[test]
fn test_gpu_authoritative_mode() {
    let mut doc = VolumeDocument::load(&blank(), brush(1)).unwrap();
    let view = doc.add_cpu_view().unwrap();
    doc.render(view).unwrap();
    assert!(doc.surface_mut().release_cpu_copy());
    assert!(!doc.surface().has_cpu_copy());

    doc.begin_stroke(ViewAxis::Axial, IVec3::new(5, 5, 0)).unwrap();
    doc.finish_stroke(IVec3::new(5, 5, 0)).unwrap();
    doc.render(view).unwrap();
    assert_eq!(doc.export().unwrap().data()[flat_index(5, 5, 0)], 7);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_export_returns_loaded_volume(
        nx in 1u32..7,
        ny in 1u32..7,
        nz in 1u32..9,
        components in 1u32..=4,
        flip_x in any::<bool>(),
        flip_y in any::<bool>(),
        seed in any::<u16>(),
    ) {
        let count = UVec3::new(nx, ny, nz);
        let len = (count.element_product() * components) as usize;
        let data: Vec<u16> = (0..len).map(|i| (i as u16).wrapping_mul(31).wrapping_add(seed)).collect();
        let sign = |flip: bool| if flip { -1.0 } else { 1.0 };
        let orientation = Mat3::from_diagonal(Vec3::new(sign(flip_x), sign(flip_y), 1.0));
        let buffer = VoxelBuffer::new(count, components, data).unwrap().with_orientation(orientation);

        let mut doc = VolumeDocument::load(&buffer, Options::default()).unwrap();
        let view = doc.add_cpu_view().unwrap();
        doc.render(view).unwrap();
        doc.surface_mut().release_cpu_copy();
        prop_assert_eq!(doc.export().unwrap(), buffer);
    }
}
