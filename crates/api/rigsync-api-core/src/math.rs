//! Vector and quaternion helpers over plain arrays.
//! - component-wise vec3 arithmetic
//! - quaternion (x, y, z, w) product, inverse and vector rotation
//! - quaternion slerp (shortest-arc)
//! - cubic Bézier for positions

pub const QUAT_IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const VEC3_ZERO: [f32; 3] = [0.0, 0.0, 0.0];
pub const VEC3_ONE: [f32; 3] = [1.0, 1.0, 1.0];

/// Linear interpolation for f32, exact at `t = 0` and `t = 1`.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[inline]
pub fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn add3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale3(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Component-wise product.
#[inline]
pub fn mul3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
}

/// Component-wise quotient; a zero divisor yields zero for that component.
#[inline]
pub fn div3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    let d = |x: f32, y: f32| if y == 0.0 { 0.0 } else { x / y };
    [d(a[0], b[0]), d(a[1], b[1]), d(a[2], b[2])]
}

#[inline]
pub fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn length3(a: [f32; 3]) -> f32 {
    dot3(a, a).sqrt()
}

#[inline]
pub fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    length3(sub3(a, b))
}

/// Normalize a vector; returns `None` for a zero-length input.
pub fn normalize3(a: [f32; 3]) -> Option<[f32; 3]> {
    let len = length3(a);
    if len > 0.0 && len.is_finite() {
        Some(scale3(a, 1.0 / len))
    } else {
        None
    }
}

/// Cubic Bézier through `a`, tangents `ta`/`tb`, ending at `b`.
pub fn bezier3(a: [f32; 3], ta: [f32; 3], tb: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    let u = 1.0 - t;
    let c0 = u * u * u;
    let c1 = 3.0 * u * u * t;
    let c2 = 3.0 * u * t * t;
    let c3 = t * t * t;
    let mut out = [0.0f32; 3];
    for i in 0..3 {
        out[i] = c0 * a[i] + c1 * ta[i] + c2 * tb[i] + c3 * b[i];
    }
    out
}

#[inline]
pub fn quat_dot(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize a quaternion represented as [x,y,z,w]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let mag = quat_dot(q, q).sqrt();
    if mag == 0.0 || !mag.is_finite() {
        QUAT_IDENTITY
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

/// Hamilton product `a * b` (apply `b` first, then `a`).
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Inverse of a (not necessarily unit) quaternion.
pub fn quat_inverse(q: [f32; 4]) -> [f32; 4] {
    let n = quat_dot(q, q);
    if n == 0.0 {
        return QUAT_IDENTITY;
    }
    let c = quat_conjugate(q);
    [c[0] / n, c[1] / n, c[2] / n, c[3] / n]
}

/// Rotate vector `v` by unit quaternion `q`.
pub fn quat_rotate(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let u = [q[0], q[1], q[2]];
    let w = q[3];
    let t = scale3(cross3(u, v), 2.0);
    add3(add3(v, scale3(t, w)), cross3(u, t))
}

/// Rotation of `angle` radians around `axis`.
pub fn quat_from_axis_angle(axis: [f32; 3], angle: f32) -> [f32; 4] {
    let Some(n) = normalize3(axis) else {
        return QUAT_IDENTITY;
    };
    let (s, c) = (angle * 0.5).sin_cos();
    [n[0] * s, n[1] * s, n[2] * s, c]
}

/// Slerp between two unit quaternions q1, q2
pub fn slerp(q1: [f32; 4], q2: [f32; 4], t: f32) -> [f32; 4] {
    let qa = normalize_quat(q1);
    let mut qb = normalize_quat(q2);

    let mut dot = quat_dot(qa, qb);

    // If the dot product is negative, slerp won't take the short path.
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // Endpoints are returned as-is so t=0/t=1 are exact.
    if t <= 0.0 {
        return qa;
    }
    if t >= 1.0 {
        return qb;
    }

    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        let res = [
            lerp_f32(qa[0], qb[0], t),
            lerp_f32(qa[1], qb[1], t),
            lerp_f32(qa[2], qb[2], t),
            lerp_f32(qa[3], qb[3], t),
        ];
        return normalize_quat(res);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta = theta.sin();
    let sin_theta_0 = theta_0.sin();

    let s0 = ((theta_0 - theta).sin()) / sin_theta_0;
    let s1 = sin_theta / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

/// Two quaternions describe the same rotation (q and -q are equivalent).
pub fn quat_approx_eq(a: [f32; 4], b: [f32; 4], eps: f32) -> bool {
    let a = normalize_quat(a);
    let b = normalize_quat(b);
    (quat_dot(a, b).abs() - 1.0).abs() <= eps
}

pub fn vec3_approx_eq(a: [f32; 3], b: [f32; 3], eps: f32) -> bool {
    (0..3).all(|i| (a[i] - b[i]).abs() <= eps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn rotate_quarter_turn_about_y() {
        let q = quat_from_axis_angle([0.0, 1.0, 0.0], FRAC_PI_2);
        let v = quat_rotate(q, [1.0, 0.0, 0.0]);
        assert!(vec3_approx_eq(v, [0.0, 0.0, -1.0], 1e-5), "{v:?}");
    }

    #[test]
    fn mul_then_inverse_is_identity() {
        let q = quat_from_axis_angle([1.0, 2.0, 3.0], 0.7);
        let r = quat_mul(q, quat_inverse(q));
        assert!(quat_approx_eq(r, QUAT_IDENTITY, 1e-6));
    }

    #[test]
    fn slerp_endpoints_and_midpoint() {
        let a = QUAT_IDENTITY;
        let b = quat_from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        assert_eq!(slerp(a, b, 0.0), a);
        assert!(quat_approx_eq(slerp(a, b, 1.0), b, 1e-6));
        let mid = slerp(a, b, 0.5);
        let expected = quat_from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2 * 0.5);
        assert!(quat_approx_eq(mid, expected, 1e-5));
    }

    #[test]
    fn bezier_endpoints() {
        let a = [0.0, 0.0, 0.0];
        let b = [4.0, 0.0, 0.0];
        let ta = [1.0, 2.0, 0.0];
        let tb = [3.0, 2.0, 0.0];
        assert_eq!(bezier3(a, ta, tb, b, 0.0), a);
        assert_eq!(bezier3(a, ta, tb, b, 1.0), b);
        assert!(vec3_approx_eq(bezier3(a, ta, tb, b, 0.5), [2.0, 1.5, 0.0], 1e-6));
    }

    #[test]
    fn div_by_zero_component_is_zero() {
        assert_eq!(div3([1.0, 2.0, 3.0], [1.0, 0.0, 2.0]), [1.0, 0.0, 1.5]);
        assert!(normalize3(VEC3_ZERO).is_none());
    }
}
