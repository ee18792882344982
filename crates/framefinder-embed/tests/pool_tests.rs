use candle_core::{Device, Tensor};
use framefinder_embed::{l2_normalize, l2_normalize_vec};

#[test]
fn l2_normalize_rows() {
    let dev = Device::Cpu;
    let feats = Tensor::from_slice(&[3.0f32, 4.0, 0.0, 0.0,
                                     1.0, 2.0, 3.0, 4.0], (2, 4), &dev).unwrap();
    let out = l2_normalize(&feats).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let expected0 = [0.6f32, 0.8, 0.0, 0.0];
    for (a, b) in v[0].iter().cloned().zip(expected0) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
    let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected1 = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v[1].iter().cloned().zip(expected1) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn l2_normalize_vec_leaves_zero_vector() {
    let mut v = vec![0.0f32; 4];
    l2_normalize_vec(&mut v);
    assert!(v.iter().all(|x| *x == 0.0));
    let mut w = vec![2.0f32, 0.0];
    l2_normalize_vec(&mut w);
    assert_eq!(w, vec![1.0, 0.0]);
}
