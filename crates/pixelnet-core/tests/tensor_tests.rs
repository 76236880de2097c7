// Integration tests for pixelnet-core
//
// Addressing, resizing, shadowing, copies, reductions and serialization of
// Tensor, plus the strict-mode contract checks.

use std::io::Cursor;

use pixelnet_core::{Error, Shape, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn filled(shape: Shape) -> Tensor {
    let data = (0..shape.elements()).map(|i| i as f32).collect();
    Tensor::from_vec(shape, data).unwrap()
}

// Construction

#[test]
fn test_empty_tensor() {
    let t = Tensor::empty();
    assert_eq!(t.shape(), Shape::default());
    assert_eq!(t.elements(), 0);
    assert!(!t.is_shadow());
}

#[test]
fn test_new_uses_legacy_argument_order() {
    // samples, width, height, maps
    let t = Tensor::new(2, 5, 4, 3);
    assert_eq!(t.samples(), 2);
    assert_eq!(t.width(), 5);
    assert_eq!(t.height(), 4);
    assert_eq!(t.maps(), 3);
    assert_eq!(t.elements(), 120);
    assert!(t.data().iter().all(|&v| v == 0.0));
}

#[test]
fn test_from_vec_rejects_wrong_length() {
    let err = Tensor::from_vec(Shape::new(1, 1, 2, 2), vec![1.0; 3]).unwrap_err();
    assert!(matches!(
        err,
        Error::ElementCountMismatch {
            expected: 4,
            got: 3,
            ..
        }
    ));
}

#[test]
fn test_duplicate_is_deep() {
    let a = filled(Shape::new(1, 1, 2, 2));
    let b = a.duplicate(true);
    assert!(!b.shares_storage_with(&a));
    b.set(0, 42.0);
    assert_eq!(a.get(0), 0.0);
    assert_eq!(b.shape(), a.shape());
}

#[test]
fn test_take_leaves_source_empty() {
    let mut a = filled(Shape::new(2, 1, 1, 3));
    let b = a.take();
    assert_eq!(a.elements(), 0);
    assert_eq!(b.elements(), 6);
    assert_eq!(b.get(5), 5.0);
}

// Addressing

#[test]
fn test_offset_is_a_bijection() {
    let shapes = [
        Shape::new(1, 1, 1, 1),
        Shape::new(2, 3, 4, 5),
        Shape::new(3, 1, 7, 2),
        Shape::new(1, 4, 1, 9),
    ];
    for shape in shapes {
        let t = Tensor::with_shape(shape);
        let mut seen = vec![false; shape.elements()];
        for s in 0..shape.samples {
            for m in 0..shape.maps {
                for y in 0..shape.height {
                    for x in 0..shape.width {
                        let off = t.offset(x, y, m, s);
                        assert!(off < shape.elements());
                        assert!(!seen[off], "offset {off} hit twice in {shape}");
                        seen[off] = true;
                    }
                }
            }
        }
        assert!(seen.iter().all(|&v| v));
    }
}

#[test]
fn test_at_and_set_at() {
    let t = Tensor::with_shape(Shape::new(2, 2, 3, 4));
    t.set_at(3, 2, 1, 1, 9.5);
    assert_eq!(t.at(3, 2, 1, 1), 9.5);
    assert_eq!(t.get(t.offset(3, 2, 1, 1)), 9.5);
    assert_eq!(t.get(47), 9.5);
}

#[test]
fn test_bits_round_trip() {
    let t = Tensor::new(3, 1, 1, 1);
    t.set_bits(1, 7);
    assert_eq!(t.bits(1), 7);
    assert_eq!(t.bits(0), 0);
}

// Clear

#[test]
fn test_clear_whole_and_single_sample() {
    let t = Tensor::with_shape(Shape::new(3, 1, 1, 2));
    t.clear(1.5, None);
    assert!(t.data().iter().all(|&v| v == 1.5));
    t.clear(-2.0, Some(1));
    assert_eq!(t.to_vec(), vec![1.5, 1.5, -2.0, -2.0, 1.5, 1.5]);
}

// Resize / reshape

#[test]
fn test_resize_changes_shape_and_count() -> pixelnet_core::Result<()> {
    let mut t = filled(Shape::new(1, 1, 2, 2));
    t.resize(2, 3, 4, 5)?;
    assert_eq!(t.shape(), Shape::new(2, 5, 4, 3));
    assert_eq!(t.elements(), 2 * 5 * 4 * 3);
    assert_eq!(t.data().len(), t.elements());
    Ok(())
}

#[test]
fn test_resize_like() -> pixelnet_core::Result<()> {
    let a = Tensor::with_shape(Shape::new(4, 2, 3, 3));
    let mut b = Tensor::empty();
    b.resize_like(&a)?;
    assert_eq!(b.shape(), a.shape());
    Ok(())
}

#[test]
fn test_reshape_keeps_data_when_counts_match() -> pixelnet_core::Result<()> {
    let mut t = filled(Shape::new(1, 1, 2, 6));
    t.reshape(2, 3, 2, 1)?;
    assert_eq!(t.shape(), Shape::new(2, 1, 2, 3));
    assert_eq!(t.get(11), 11.0);
    Ok(())
}

#[test]
fn test_reshape_fails_without_mutation() {
    let mut t = filled(Shape::new(1, 1, 2, 6));
    let err = t.reshape(2, 3, 3, 1).unwrap_err();
    assert!(matches!(err, Error::ReshapeElementMismatch { src: 12, dst: 18, .. }));
    assert_eq!(t.shape(), Shape::new(1, 1, 2, 6));
    assert_eq!(t.get(11), 11.0);
}

#[test]
fn test_reshape_succeeds_iff_counts_match() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let mut t = Tensor::new(
            rng.gen_range(1..4),
            rng.gen_range(1..4),
            rng.gen_range(1..4),
            rng.gen_range(1..4),
        );
        let before = t.shape();
        let (s, w, h, m) = (
            rng.gen_range(1..5),
            rng.gen_range(1..5),
            rng.gen_range(1..5),
            rng.gen_range(1..5),
        );
        let matches = s * w * h * m == before.elements();
        assert_eq!(t.reshape(s, w, h, m).is_ok(), matches);
        if matches {
            assert_eq!(t.shape(), Shape::from_legacy(s, w, h, m));
        } else {
            assert_eq!(t.shape(), before);
        }
    }
}

// Shadow

#[test]
fn test_shadow_aliases_storage_and_shape() {
    let owner = filled(Shape::new(1, 2, 2, 2));
    let mut alias = Tensor::new(5, 1, 1, 1);
    alias.shadow(&owner);
    assert!(alias.is_shadow());
    assert!(alias.shares_storage_with(&owner));
    assert_eq!(alias.shape(), owner.shape());

    alias.set(3, 100.0);
    assert_eq!(owner.get(3), 100.0);
    owner.set(4, -1.0);
    assert_eq!(alias.get(4), -1.0);
}

#[test]
fn test_shadow_cannot_resize() {
    let owner = filled(Shape::new(1, 1, 2, 2));
    let mut alias = Tensor::empty();
    alias.shadow(&owner);
    let err = alias.resize(2, 2, 2, 1).unwrap_err();
    assert!(matches!(err, Error::ShadowResize { .. }));
    assert_eq!(alias.shape(), owner.shape());
    // Same shape is not a reallocation.
    assert!(alias.resize_like(&owner).is_ok());
}

#[test]
fn test_shadow_survives_owner_drop() {
    let mut alias = Tensor::empty();
    {
        let owner = filled(Shape::new(1, 1, 1, 3));
        alias.shadow(&owner);
    }
    assert_eq!(alias.to_vec(), vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_release() {
    let mut t = filled(Shape::new(1, 1, 1, 4));
    t.release();
    assert_eq!(t.elements(), 0);
    assert!(!t.is_shadow());
}

// Transpose

#[test]
fn test_transpose_every_plane() {
    // Two samples, two maps, 2x3 planes
    let mut t = filled(Shape::new(2, 2, 2, 3));
    t.transpose().unwrap();
    assert_eq!(t.shape(), Shape::new(2, 2, 3, 2));
    // First plane [[0,1,2],[3,4,5]] becomes [[0,3],[1,4],[2,5]]
    assert_eq!(&t.to_vec()[0..6], &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    // Last plane [[18,19,20],[21,22,23]]
    assert_eq!(&t.to_vec()[18..24], &[18.0, 21.0, 19.0, 22.0, 20.0, 23.0]);
}

#[test]
fn test_transpose_twice_is_identity() {
    let shape = Shape::new(3, 2, 4, 5);
    let mut t = filled(shape);
    t.transpose().unwrap();
    t.transpose().unwrap();
    assert_eq!(t.shape(), shape);
    assert_eq!(t.to_vec(), filled(shape).to_vec());
}

#[test]
fn test_shadow_cannot_transpose_rectangular_planes() {
    let owner = filled(Shape::new(1, 1, 2, 3));
    let mut alias = Tensor::empty();
    alias.shadow(&owner);

    let err = alias.transpose().unwrap_err();
    assert!(matches!(err, Error::ShadowResize { .. }));
    assert_eq!(alias.shape(), owner.shape());
    assert_eq!(owner.shape(), Shape::new(1, 1, 2, 3));
    assert_eq!(owner.at(1, 0, 0, 0), 1.0);
    assert_eq!(owner.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_shadow_transposes_square_planes() -> pixelnet_core::Result<()> {
    let owner = filled(Shape::new(1, 1, 2, 2));
    let mut alias = Tensor::empty();
    alias.shadow(&owner);

    alias.transpose()?;
    assert_eq!(alias.shape(), owner.shape());
    assert_eq!(owner.to_vec(), vec![0.0, 2.0, 1.0, 3.0]);
    Ok(())
}

// Copies

#[test]
fn test_copy_sample() -> pixelnet_core::Result<()> {
    let source = filled(Shape::new(3, 2, 1, 2));
    let target = Tensor::with_shape(Shape::new(2, 2, 1, 2));
    Tensor::copy_sample(&source, 2, &target, 0)?;
    assert_eq!(target.to_vec(), vec![8.0, 9.0, 10.0, 11.0, 0.0, 0.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_copy_sample_rejects_without_mutation() {
    let source = filled(Shape::new(2, 1, 2, 2));
    let target = Tensor::with_shape(Shape::new(2, 1, 2, 3));
    target.clear(5.0, None);
    assert!(matches!(
        Tensor::copy_sample(&source, 0, &target, 0),
        Err(Error::IncompatibleCopy { .. })
    ));
    let target = Tensor::with_shape(Shape::new(2, 1, 2, 2));
    target.clear(5.0, None);
    assert!(Tensor::copy_sample(&source, 2, &target, 0).is_err());
    assert!(Tensor::copy_sample(&source, 0, &target, 2).is_err());
    assert!(target.data().iter().all(|&v| v == 5.0));
}

#[test]
fn test_copy_map() -> pixelnet_core::Result<()> {
    let source = filled(Shape::new(2, 3, 1, 2));
    let target = Tensor::with_shape(Shape::new(1, 2, 1, 2));
    // sample 1, map 2 -> offset 1*6 + 2*2 = 10
    Tensor::copy_map(&source, 1, 2, &target, 0, 1)?;
    assert_eq!(target.to_vec(), vec![0.0, 0.0, 10.0, 11.0]);
    Ok(())
}

#[test]
fn test_copy_map_rejects_without_mutation() {
    let source = filled(Shape::new(1, 2, 2, 2));
    let target = Tensor::with_shape(Shape::new(1, 2, 2, 2));
    target.clear(3.0, None);
    assert!(Tensor::copy_map(&source, 0, 2, &target, 0, 0).is_err());
    assert!(Tensor::copy_map(&source, 0, 0, &target, 1, 0).is_err());
    let narrow = Tensor::with_shape(Shape::new(1, 2, 2, 1));
    assert!(Tensor::copy_map(&source, 0, 0, &narrow, 0, 0).is_err());
    assert!(target.data().iter().all(|&v| v == 3.0));
}

#[test]
fn test_copy_within_shadowed_storage() -> pixelnet_core::Result<()> {
    let owner = filled(Shape::new(2, 1, 1, 2));
    let mut alias = Tensor::empty();
    alias.shadow(&owner);
    Tensor::copy_sample(&owner, 1, &alias, 0)?;
    assert_eq!(owner.to_vec(), vec![2.0, 3.0, 2.0, 3.0]);
    Ok(())
}

// Reductions

#[test]
fn test_maximum_is_local_to_sample() {
    let t = Tensor::from_vec(
        Shape::new(2, 3, 1, 1),
        vec![0.1, 0.7, 0.2, 0.9, 0.05, 0.05],
    )
    .unwrap();
    assert_eq!(t.maximum(0), 1);
    assert_eq!(t.maximum(1), 0);
}

#[test]
fn test_maximum_ties_pick_first() {
    let t = Tensor::from_vec(Shape::new(1, 4, 1, 1), vec![0.2, 0.5, 0.5, 0.1]).unwrap();
    assert_eq!(t.maximum(0), 1);
}

#[test]
fn test_maximum_dominates_random_samples() {
    let mut rng = StdRng::seed_from_u64(11);
    let shape = Shape::new(5, 4, 2, 3);
    let data = (0..shape.elements())
        .map(|_| rng.gen_range(-10..10) as f32)
        .collect();
    let t = Tensor::from_vec(shape, data).unwrap();
    let values = t.to_vec();
    let len = shape.sample_size();
    for s in 0..shape.samples {
        let local = &values[s * len..(s + 1) * len];
        let best = t.maximum(s);
        assert!(best < len);
        assert!(local.iter().all(|&v| v <= local[best]));
        assert!(local[..best].iter().all(|&v| v < local[best]));
    }
}

#[test]
fn test_abs_maximum() {
    let t = Tensor::from_vec(Shape::new(2, 1, 1, 3), vec![1.0, -4.0, 2.0, 4.0, 0.0, -3.0]).unwrap();
    assert_eq!(t.abs_maximum(), 1);
}

// Serialization

#[test]
fn test_serialize_round_trip() -> pixelnet_core::Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let shape = Shape::new(3, 2, 4, 5);
    let data = (0..shape.elements()).map(|_| rng.gen::<f32>() * 200.0 - 100.0).collect();
    let original = Tensor::from_vec(shape, data)?;

    let mut buf = Vec::new();
    original.serialize(&mut buf, false)?;

    let mut restored = Tensor::new(1, 1, 1, 1);
    restored.deserialize(&mut Cursor::new(buf))?;
    assert_eq!(restored.shape(), shape);
    assert_eq!(restored.to_vec(), original.to_vec());
    Ok(())
}

#[test]
fn test_deserialize_truncated_stream_leaves_tensor_untouched() {
    let original = filled(Shape::new(1, 1, 2, 2));
    let mut buf = Vec::new();
    original.serialize(&mut buf, false).unwrap();
    buf.truncate(buf.len() - 2);

    let mut target = filled(Shape::new(1, 1, 1, 3));
    let err = target.deserialize(&mut Cursor::new(buf)).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(target.shape(), Shape::new(1, 1, 1, 3));
    assert_eq!(target.to_vec(), vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_display() {
    let t = Tensor::new(2, 4, 3, 1);
    assert_eq!(t.to_string(), "(s: 2, m: 1, h: 3, w: 4)");
}

// Strict mode

#[cfg(all(debug_assertions, not(feature = "unchecked")))]
mod strict {
    use super::*;

    #[test]
    #[should_panic(expected = "Out of bounds access")]
    fn test_offset_out_of_range_is_fatal() {
        let t = Tensor::new(1, 4, 4, 1);
        let _ = t.offset(0, 4, 0, 0);
    }

    #[test]
    #[should_panic(expected = "null pointer Tensor")]
    fn test_access_to_unallocated_tensor_is_fatal() {
        let t = Tensor::empty();
        let _ = t.get(0);
    }

    #[test]
    #[should_panic(expected = "Maximum of an empty sample")]
    fn test_maximum_of_empty_sample_is_fatal() {
        let t = Tensor::with_shape(Shape::new(2, 0, 3, 3));
        let _ = t.maximum(1);
    }

    #[test]
    #[should_panic(expected = "Maximum of an empty tensor")]
    fn test_abs_maximum_of_empty_tensor_is_fatal() {
        let _ = Tensor::empty().abs_maximum();
    }

    #[test]
    #[should_panic(expected = "Unintentional copy")]
    fn test_unintentional_copy_is_fatal() {
        let t = Tensor::new(1, 1, 1, 1);
        let _ = t.duplicate(false);
    }
}

// Accelerator residency

#[cfg(feature = "accelerator")]
mod accelerator {
    use super::*;
    use pixelnet_core::Residency;

    #[test]
    fn test_transfer_round_trip() {
        let t = filled(Shape::new(1, 1, 1, 4));
        assert_eq!(t.residency(), Residency::Host);
        t.move_to_gpu(false);
        assert_eq!(t.residency(), Residency::Device);
        assert_eq!(&*t.device_data(), &[0.0, 1.0, 2.0, 3.0]);

        t.device_data_mut()[2] = 20.0;
        t.move_to_cpu(false);
        assert_eq!(t.residency(), Residency::Host);
        assert_eq!(t.to_vec(), vec![0.0, 1.0, 20.0, 3.0]);
    }

    #[test]
    fn test_no_copy_only_flips_residency() {
        let t = filled(Shape::new(1, 1, 1, 2));
        t.move_to_gpu(false);
        t.device_data_mut()[0] = 9.0;
        t.move_to_cpu(true);
        assert_eq!(t.residency(), Residency::Host);
        assert_eq!(t.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_shadow_shares_residency() {
        let owner = filled(Shape::new(1, 1, 1, 2));
        let mut alias = Tensor::empty();
        alias.shadow(&owner);
        owner.move_to_gpu(false);
        assert_eq!(alias.residency(), Residency::Device);
    }

    #[test]
    fn test_resize_returns_to_host() -> pixelnet_core::Result<()> {
        let mut t = filled(Shape::new(1, 1, 1, 2));
        t.move_to_gpu(false);
        t.resize(1, 3, 1, 1)?;
        assert_eq!(t.residency(), Residency::Host);
        Ok(())
    }

    #[cfg(all(debug_assertions, not(feature = "unchecked")))]
    #[test]
    #[should_panic(expected = "device copy is authoritative")]
    fn test_host_access_while_on_device_is_fatal() {
        let t = filled(Shape::new(1, 1, 1, 2));
        t.move_to_gpu(false);
        let _ = t.get(0);
    }
}
