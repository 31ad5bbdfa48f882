//! Perspective-n-Point pose recovery.
//!
//! A normalized direct linear transform over the 2D-3D correspondences seeds
//! a Gauss-Newton refinement of pixel reprojection error. The rotation stays
//! on SO(3) throughout: the linear estimate is projected via SVD and the
//! refinement updates through the axis-angle exponential map.

use crate::camera::CameraIntrinsics;
use crate::types::{Point2, Point3};
use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Rotation3, Vector3};
use thiserror::Error;

/// The linear initialization needs a 12-unknown homogeneous system of full
/// rank, which takes six correspondences.
pub const MIN_CORRESPONDENCES: usize = 6;

const GAUSS_NEWTON_MAX_ITERS: usize = 20;
const GAUSS_NEWTON_STEP_TOL: f64 = 1e-10;
const MIN_DEPTH: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum PnpError {
    #[error("need at least {MIN_CORRESPONDENCES} point correspondences, got {0}")]
    TooFewCorrespondences(usize),
    #[error("model and image point counts differ: {model} vs {image}")]
    MismatchedCounts { model: usize, image: usize },
    #[error("degenerate correspondence geometry: {0}")]
    Degenerate(&'static str),
}

/// Recovered camera-relative pose.
#[derive(Debug, Clone)]
pub struct PnpSolution {
    /// Rotation mapping model coordinates into the camera frame.
    /// Orthonormal with determinant +1.
    pub rotation: [[f64; 3]; 3],
    /// Translation in model units, camera frame.
    pub translation: Point3,
    /// Root-mean-square reprojection error in pixels.
    pub reproj_rmse: f64,
    /// Refinement iterations spent.
    pub iterations: usize,
}

/// Solve for the pose explaining the observed projections.
///
/// `model` are 3D points in model coordinates, `image` their observed pixel
/// positions under `intrinsics` (zero distortion). The result is a local
/// minimizer of the summed squared reprojection error.
pub fn solve(
    model: &[Point3],
    image: &[Point2],
    intrinsics: &CameraIntrinsics,
) -> Result<PnpSolution, PnpError> {
    if model.len() != image.len() {
        return Err(PnpError::MismatchedCounts {
            model: model.len(),
            image: image.len(),
        });
    }
    if model.len() < MIN_CORRESPONDENCES {
        return Err(PnpError::TooFewCorrespondences(model.len()));
    }

    let (mut rotation, mut translation) = dlt_init(model, image, intrinsics)?;

    // Cheirality: the observed face sits in front of the camera.
    let mean_depth: f64 = model
        .iter()
        .map(|p| (rotation * Vector3::new(p.x, p.y, p.z) + translation).z)
        .sum::<f64>()
        / model.len() as f64;
    if mean_depth <= 0.0 {
        return Err(PnpError::Degenerate("points behind camera after linear solve"));
    }

    let n = model.len();
    let mut iterations = 0;
    for iter in 0..GAUSS_NEWTON_MAX_ITERS {
        let mut jac = DMatrix::<f64>::zeros(2 * n, 6);
        let mut res = DVector::<f64>::zeros(2 * n);

        for (i, (pm, pi)) in model.iter().zip(image.iter()).enumerate() {
            let w = rotation * Vector3::new(pm.x, pm.y, pm.z);
            let p = w + translation;
            if p.z < MIN_DEPTH {
                return Err(PnpError::Degenerate("vanishing depth during refinement"));
            }
            let inv_z = 1.0 / p.z;

            res[2 * i] = intrinsics.fx * p.x * inv_z + intrinsics.cx - pi.x;
            res[2 * i + 1] = intrinsics.fy * p.y * inv_z + intrinsics.cy - pi.y;

            // d(u,v)/dp for the pinhole projection
            let du_dp = Vector3::new(intrinsics.fx * inv_z, 0.0, -intrinsics.fx * p.x * inv_z * inv_z);
            let dv_dp = Vector3::new(0.0, intrinsics.fy * inv_z, -intrinsics.fy * p.y * inv_z * inv_z);

            // Left-multiplicative rotation perturbation: dp/ddelta = -[w]x,
            // dp/dt = I.
            let dp_ddelta = -skew(&w);
            for col in 0..3 {
                jac[(2 * i, col)] = du_dp.dot(&dp_ddelta.column(col).into_owned());
                jac[(2 * i + 1, col)] = dv_dp.dot(&dp_ddelta.column(col).into_owned());
                jac[(2 * i, 3 + col)] = du_dp[col];
                jac[(2 * i + 1, 3 + col)] = dv_dp[col];
            }
        }

        let jtj = jac.tr_mul(&jac);
        let neg_jtr = -jac.tr_mul(&res);
        let delta = jtj
            .cholesky()
            .ok_or(PnpError::Degenerate("singular normal equations"))?
            .solve(&neg_jtr);

        let axis = Vector3::new(delta[0], delta[1], delta[2]);
        rotation = Rotation3::from_scaled_axis(axis) * rotation;
        translation += Vector3::new(delta[3], delta[4], delta[5]);
        iterations = iter + 1;

        if delta.norm() < GAUSS_NEWTON_STEP_TOL {
            break;
        }
    }

    let mut sum_sq = 0.0;
    for (pm, pi) in model.iter().zip(image.iter()) {
        let p = rotation * Vector3::new(pm.x, pm.y, pm.z) + translation;
        if p.z < MIN_DEPTH {
            return Err(PnpError::Degenerate("vanishing depth after refinement"));
        }
        let du = intrinsics.fx * p.x / p.z + intrinsics.cx - pi.x;
        let dv = intrinsics.fy * p.y / p.z + intrinsics.cy - pi.y;
        sum_sq += du * du + dv * dv;
    }
    let reproj_rmse = (sum_sq / n as f64).sqrt();

    tracing::debug!(iterations, reproj_rmse, "pnp solve refined");

    let m = rotation.matrix();
    Ok(PnpSolution {
        rotation: [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ],
        translation: Point3::new(translation.x, translation.y, translation.z),
        reproj_rmse,
        iterations,
    })
}

/// Direct linear estimate of the pose.
///
/// Conditions the 3D points (centroid at the origin, mean distance √3),
/// solves the homogeneous system for the 3×4 camera matrix via SVD, and
/// projects its rotation block onto SO(3).
fn dlt_init(
    model: &[Point3],
    image: &[Point2],
    intrinsics: &CameraIntrinsics,
) -> Result<(Rotation3<f64>, Vector3<f64>), PnpError> {
    let n = model.len();
    let n_real = n as f64;

    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut cz = 0.0;
    for p in model {
        cx += p.x;
        cy += p.y;
        cz += p.z;
    }
    cx /= n_real;
    cy /= n_real;
    cz /= n_real;

    let mut mean_dist = 0.0;
    for p in model {
        let dx = p.x - cx;
        let dy = p.y - cy;
        let dz = p.z - cz;
        mean_dist += (dx * dx + dy * dy + dz * dz).sqrt();
    }
    mean_dist /= n_real;
    if mean_dist <= f64::EPSILON {
        return Err(PnpError::Degenerate("coincident model points"));
    }

    let scale = 3.0_f64.sqrt() / mean_dist;
    let t_model = Matrix4::new(
        scale, 0.0, 0.0, -scale * cx, //
        0.0, scale, 0.0, -scale * cy, //
        0.0, 0.0, scale, -scale * cz, //
        0.0, 0.0, 0.0, 1.0,
    );

    // 2n x 12 homogeneous system for P = [R | t] in normalized coordinates.
    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (pm, pi)) in model.iter().zip(image.iter()).enumerate() {
        let x = (pm.x - cx) * scale;
        let y = (pm.y - cy) * scale;
        let z = (pm.z - cz) * scale;
        let (u, v) = intrinsics.normalize(*pi);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;

        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    // Null vector = right singular vector of the smallest singular value.
    let svd = a.svd(true, true);
    let v_t = svd.v_t.ok_or(PnpError::Degenerate("svd failed on dlt system"))?;
    let row = v_t.row(v_t.nrows() - 1);
    let p_norm = Matrix3x4::from_fn(|r, c| row[(0, 4 * r + c)]);

    // Undo the 3D conditioning: P = P_norm * T_model.
    let p_mtx = p_norm * t_model;

    let m = p_mtx.fixed_view::<3, 3>(0, 0).into_owned();
    let mut s = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if s <= f64::EPSILON {
        return Err(PnpError::Degenerate("vanishing rotation block"));
    }
    if m.determinant() < 0.0 {
        s = -s;
    }
    let r_approx = m / s;

    // Nearest proper rotation.
    let svd = r_approx.svd(true, true);
    let u = svd.u.ok_or(PnpError::Degenerate("svd failed on rotation block"))?;
    let v_t = svd.v_t.ok_or(PnpError::Degenerate("svd failed on rotation block"))?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t = p_mtx.column(3).into_owned() / s;

    Ok((Rotation3::from_matrix_unchecked(r_orth), t))
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_model::REFERENCE_POINTS;

    fn project(r: &Rotation3<f64>, t: &Vector3<f64>, k: &CameraIntrinsics, p: Point3) -> Point2 {
        let c = r * Vector3::new(p.x, p.y, p.z) + t;
        Point2::new(k.fx * c.x / c.z + k.cx, k.fy * c.y / c.z + k.cy)
    }

    /// Frontal-face base orientation: model y up, image y down.
    fn frontal() -> Rotation3<f64> {
        Rotation3::from_matrix_unchecked(Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, -1.0, 0.0, //
            0.0, 0.0, -1.0,
        ))
    }

    fn rotation_angle_between(a: &[[f64; 3]; 3], b: &Rotation3<f64>) -> f64 {
        let ma = Matrix3::from_fn(|r, c| a[r][c]);
        let diff = ma.transpose() * b.matrix();
        let cos_theta = ((diff.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
        cos_theta.acos()
    }

    #[test]
    fn test_recovers_synthetic_pose() {
        let k = CameraIntrinsics::for_image(640, 480);
        let r_gt = Rotation3::from_scaled_axis(Vector3::new(0.1, -0.05, 0.2)) * frontal();
        let t_gt = Vector3::new(30.0, -40.0, 1100.0);

        let image: Vec<Point2> = REFERENCE_POINTS
            .iter()
            .map(|&p| project(&r_gt, &t_gt, &k, p))
            .collect();

        let sol = solve(&REFERENCE_POINTS, &image, &k).unwrap();

        let ang = rotation_angle_between(&sol.rotation, &r_gt);
        assert!(ang < 1e-5, "rotation error too large: {ang}");
        let dt = ((sol.translation.x - t_gt.x).powi(2)
            + (sol.translation.y - t_gt.y).powi(2)
            + (sol.translation.z - t_gt.z).powi(2))
        .sqrt();
        assert!(dt < 1e-2, "translation error too large: {dt}");
        assert!(sol.reproj_rmse < 1e-6, "rmse too large: {}", sol.reproj_rmse);
    }

    #[test]
    fn test_recovers_frontal_pose() {
        let k = CameraIntrinsics::for_image(640, 480);
        let r_gt = frontal();
        let t_gt = Vector3::new(0.0, 0.0, 1000.0);

        let image: Vec<Point2> = REFERENCE_POINTS
            .iter()
            .map(|&p| project(&r_gt, &t_gt, &k, p))
            .collect();

        let sol = solve(&REFERENCE_POINTS, &image, &k).unwrap();

        assert!((sol.rotation[0][0] - 1.0).abs() < 1e-6);
        assert!((sol.rotation[1][1] + 1.0).abs() < 1e-6);
        assert!((sol.rotation[2][2] + 1.0).abs() < 1e-6);
        assert!(sol.translation.x.abs() < 1e-3);
        assert!(sol.translation.y.abs() < 1e-3);
        assert!((sol.translation.z - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_returned_rotation_is_proper() {
        let k = CameraIntrinsics::for_image(640, 480);
        let r_gt = Rotation3::from_scaled_axis(Vector3::new(-0.03, 0.12, 0.07)) * frontal();
        let t_gt = Vector3::new(-15.0, 25.0, 900.0);
        let image: Vec<Point2> = REFERENCE_POINTS
            .iter()
            .map(|&p| project(&r_gt, &t_gt, &k, p))
            .collect();

        let sol = solve(&REFERENCE_POINTS, &image, &k).unwrap();
        let m = Matrix3::from_fn(|r, c| sol.rotation[r][c]);
        assert!((m.determinant() - 1.0).abs() < 1e-9);
        let should_be_identity = m.transpose() * m;
        for r in 0..3 {
            for c in 0..3 {
                let expect = if r == c { 1.0 } else { 0.0 };
                assert!((should_be_identity[(r, c)] - expect).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_too_few_correspondences() {
        let k = CameraIntrinsics::for_image(640, 480);
        let model = &REFERENCE_POINTS[..5];
        let image = vec![Point2::new(0.0, 0.0); 5];
        assert!(matches!(
            solve(model, &image, &k),
            Err(PnpError::TooFewCorrespondences(5))
        ));
    }

    #[test]
    fn test_mismatched_counts() {
        let k = CameraIntrinsics::for_image(640, 480);
        let image = vec![Point2::new(0.0, 0.0); 5];
        assert!(matches!(
            solve(&REFERENCE_POINTS, &image, &k),
            Err(PnpError::MismatchedCounts { model: 6, image: 5 })
        ));
    }

    #[test]
    fn test_coincident_points_degenerate() {
        let k = CameraIntrinsics::for_image(640, 480);
        let model = [Point3::new(1.0, 2.0, 3.0); 6];
        let image = [Point2::new(320.0, 240.0); 6];
        assert!(matches!(
            solve(&model, &image, &k),
            Err(PnpError::Degenerate(_))
        ));
    }
}
