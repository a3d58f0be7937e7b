//! 显示矩阵.
//!
//! 对标 FFmpeg 的 `av_display_rotation_set` / `av_display_rotation_get`.
//! 矩阵为 3x3 行主序, 前两列为 16.16 定点数, 第三列为 2.30 定点数,
//! 与 MP4 `tkhd` box 中的 matrix 字段布局一致.

use std::f64::consts::PI;
use std::fmt;

/// 16.16 定点数的 1.0
const FIXED_16_16_ONE: f64 = 65536.0;
/// 2.30 定点数的 1.0
const FIXED_2_30_ONE: i32 = 1 << 30;

/// 3x3 显示矩阵
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayMatrix(pub [i32; 9]);

impl DisplayMatrix {
    /// 单位矩阵 (不旋转)
    pub const IDENTITY: Self = Self([65536, 0, 0, 0, 65536, 0, 0, 0, FIXED_2_30_ONE]);

    /// 按逆时针角度 (度) 构造纯旋转矩阵
    ///
    /// 定点转换为截断, 与 `av_display_rotation_set` 的结果逐位一致.
    /// 例如 90 度得到 `[0, 65536, 0, -65536, 0, 0, 0, 0, 1<<30]`.
    pub fn from_rotation(degrees: f64) -> Self {
        if !degrees.is_finite() {
            log::warn!(target: "recmux", "旋转角度无效: {degrees}, 使用单位矩阵");
            return Self::IDENTITY;
        }
        let radians = -degrees * PI / 180.0;
        let c = radians.cos();
        let s = radians.sin();

        let mut m = [0i32; 9];
        m[0] = to_fixed(c);
        m[1] = to_fixed(-s);
        m[3] = to_fixed(s);
        m[4] = to_fixed(c);
        m[8] = FIXED_2_30_ONE;
        Self(m)
    }

    /// 矩阵表示的逆时针旋转角度 (度), 范围 (-180, 180]
    pub fn rotation(&self) -> f64 {
        let sin = f64::from(self.0[1]) / FIXED_16_16_ONE;
        let cos = f64::from(self.0[0]) / FIXED_16_16_ONE;
        let deg = sin.atan2(cos) * 180.0 / PI;
        if deg <= -180.0 { deg + 360.0 } else { deg }
    }

    /// 是否为单位矩阵
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// 按大端序输出 36 字节, 可直接写入 `tkhd`
    pub fn to_be_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        for (chunk, v) in out.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&v.to_be_bytes());
        }
        out
    }
}

impl Default for DisplayMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for DisplayMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rotation of {:.2} degrees", self.rotation())
    }
}

fn to_fixed(x: f64) -> i32 {
    (x * FIXED_16_16_ONE) as i32
}
