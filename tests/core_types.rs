use dpmatch::{
    Anchor, Component, DeformationCost, DpmError, FeatureMap, Filter, ImageView, Model,
    OwnedImage, Projection,
};

fn root(sx: usize, sy: usize, nf: usize) -> Filter {
    Filter::new(sx, sy, nf, vec![0.25; sx * sy * nf]).unwrap()
}

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0u8; 4];

    let err = ImageView::from_slice(&data, 0, 1, 1).err().unwrap();
    assert_eq!(
        err,
        DpmError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );

    let err = ImageView::from_slice(&data, 1, 0, 1).err().unwrap();
    assert_eq!(
        err,
        DpmError::InvalidDimensions {
            width: 1,
            height: 0,
        }
    );
}

#[test]
fn image_view_rejects_invalid_stride() {
    let data = [0u8; 8];

    let err = ImageView::new(&data, 4, 1, 1, 3).err().unwrap();
    assert_eq!(
        err,
        DpmError::InvalidStride {
            row_len: 4,
            stride: 3,
        }
    );
}

#[test]
fn image_view_rejects_small_buffer() {
    let data = [0u8; 3];

    let err = ImageView::new(&data, 2, 2, 1, 2).err().unwrap();
    assert_eq!(err, DpmError::BufferTooSmall { needed: 4, got: 3 });
}

#[test]
fn image_view_honours_stride_and_channels() {
    let data = [1u8, 2, 3, 4, 5, 6, 99, 7, 8, 9, 10, 11, 12, 99];
    let view = ImageView::new(&data, 2, 2, 3, 7).unwrap();
    assert_eq!(view.row(1).unwrap(), &[7, 8, 9, 10, 11, 12]);
    assert_eq!(view.pixel(1, 0).unwrap(), &[4, 5, 6]);
    assert!(view.pixel(2, 0).is_none());
}

#[test]
fn owned_image_requires_exact_length() {
    assert!(OwnedImage::new(vec![0; 12], 2, 2, 3).is_ok());
    assert_eq!(
        OwnedImage::new(vec![0; 13], 2, 2, 3).err().unwrap(),
        DpmError::InvalidDimensions {
            width: 2,
            height: 2,
        }
    );
    assert!(matches!(
        OwnedImage::new(vec![0; 4], 2, 2, 0),
        Err(DpmError::InvalidInput(_))
    ));
}

#[test]
fn feature_map_validates_buffer_length() {
    assert!(matches!(
        FeatureMap::from_vec(2, 2, 3, vec![0.0; 11]),
        Err(DpmError::InvalidInput(_))
    ));
    let map = FeatureMap::from_vec(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(map.cell(1, 0).unwrap(), &[3.0, 4.0]);
    assert!(map.cell(0, 1).is_none());
}

#[test]
fn filter_rejects_wrong_weight_count_and_non_finite_weights() {
    assert!(matches!(
        Filter::new(2, 2, 3, vec![0.0; 11]),
        Err(DpmError::InvalidModel { .. })
    ));
    let mut weights = vec![0.0; 12];
    weights[5] = f32::NAN;
    assert!(matches!(
        Filter::new(2, 2, 3, weights),
        Err(DpmError::InvalidModel { .. })
    ));
}

#[test]
fn model_rejects_structural_violations() {
    let projection = Projection::truncating(4, 2).unwrap();

    let err = Model::new(vec![], 0.0, projection.clone()).unwrap_err();
    assert!(matches!(err, DpmError::InvalidModel { .. }));

    let err = Model::new(
        vec![Component::new(root(2, 2, 4), vec![], 0.0)],
        f32::NAN,
        projection.clone(),
    )
    .unwrap_err();
    assert!(matches!(err, DpmError::InvalidModel { .. }));

    let mixed = Component::new(root(2, 2, 4), vec![], 0.0);
    let other = Component::new(root(2, 2, 5), vec![], 0.0);
    assert!(Model::new(vec![mixed, other], 0.0, projection.clone()).is_err());

    let wide_projection = Projection::truncating(6, 2).unwrap();
    assert!(Model::new(
        vec![Component::new(root(2, 2, 4), vec![], 0.0)],
        0.0,
        wide_projection
    )
    .is_err());

    let bad_part = Filter::part(
        1,
        1,
        4,
        vec![0.0; 4],
        DeformationCost([0.0, f32::INFINITY, 0.0, 0.0]),
        Anchor {
            x: 0,
            y: 0,
            level_offset: 1,
        },
    )
    .unwrap();
    assert!(Model::new(
        vec![Component::new(root(2, 2, 4), vec![bad_part], 0.0)],
        0.0,
        projection
    )
    .is_err());
}

#[test]
fn model_accepts_infinite_thresholds() {
    let projection = Projection::truncating(4, 2).unwrap();
    let model = Model::new(
        vec![Component::new(root(2, 2, 4), vec![], 0.5)],
        f32::NEG_INFINITY,
        projection,
    )
    .unwrap();
    assert_eq!(model.score_threshold(), f32::NEG_INFINITY);
    let raised = model.with_score_threshold(f32::INFINITY).unwrap();
    assert_eq!(raised.score_threshold(), f32::INFINITY);
    assert!(model.with_score_threshold(f32::NAN).is_err());
}

#[test]
fn projection_rejects_wrong_coefficient_count() {
    assert!(matches!(
        Projection::new(3, 2, vec![0.0; 5]),
        Err(DpmError::InvalidModel { .. })
    ));
    let identity = Projection::truncating(3, 3).unwrap();
    assert_eq!(
        identity.coeffs(),
        &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    );
}
