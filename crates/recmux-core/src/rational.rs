//! 有理数类型与时间基重缩放.
//!
//! 对标 FFmpeg 的 `AVRational` / `av_rescale_rnd` / `av_rescale_q`.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// 用于表示时间基 (time_base) 和帧率.
/// 例如: 时间基 1/44100 表示每个 tick 为一个音频采样, 1/1_000_000 表示微秒.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    ///
    /// # 参数
    /// - `num`: 分子
    /// - `den`: 分母 (不应为 0)
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 零值
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 常用时间基: 微秒 (1/1_000_000), 外部输入时间戳使用此时间基
    pub const MICRO: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 对有理数进行约分
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g == 0 {
            return self;
        }
        let g = g as i32;
        // 保证分母为正
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }

    /// 求倒数
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}

/// 重缩放的舍入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// 向零舍入
    Zero,
    /// 远离零舍入
    Inf,
    /// 向负无穷舍入
    Down,
    /// 向正无穷舍入
    Up,
    /// 四舍五入, 恰好一半时远离零
    NearInf,
}

/// 计算 `a * b / c`, 使用指定舍入方式
///
/// 中间结果以 i128 精确计算, 不会溢出也不会累积误差.
/// `c == 0` 时返回 [`crate::timestamp::NOPTS_VALUE`]; 结果超出 i64 时饱和.
pub fn rescale_rnd(a: i64, b: i64, c: i64, rnd: Rounding) -> i64 {
    if c == 0 {
        return crate::timestamp::NOPTS_VALUE;
    }
    let mut n = i128::from(a) * i128::from(b);
    let mut c = i128::from(c);
    if c < 0 {
        n = -n;
        c = -c;
    }

    let q = match rnd {
        Rounding::Zero => n / c,
        Rounding::Down => n.div_euclid(c),
        Rounding::Up => -((-n).div_euclid(c)),
        Rounding::Inf => {
            if n >= 0 {
                (n + c - 1) / c
            } else {
                -((-n + c - 1) / c)
            }
        }
        Rounding::NearInf => {
            let half = c / 2;
            if n >= 0 {
                (n + half) / c
            } else {
                -((-n + half) / c)
            }
        }
    };

    q.clamp(i128::from(i64::MIN + 1), i128::from(i64::MAX)) as i64
}

/// 将时间戳 `a` 从时间基 `bq` 重缩放到时间基 `cq`
///
/// 四舍五入, 恰好一半时远离零 (同 `av_rescale_q`).
/// 对同一对时间基, 输入单调不减时输出也单调不减.
pub fn rescale_q(a: i64, bq: Rational, cq: Rational) -> i64 {
    let b = i64::from(bq.num) * i64::from(cq.den);
    let c = i64::from(cq.num) * i64::from(bq.den);
    rescale_rnd(a, b, c, Rounding::NearInf)
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
